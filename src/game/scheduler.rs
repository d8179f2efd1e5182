//! Coarse timer wheel for world effects
//!
//! Time is cut into fixed-width buckets derived from the (wall-offset) tick
//! timestamp. Nodes share the bucket boundaries without talking to each
//! other, so a producer that decides purely from the bucket number makes the
//! same decision everywhere.

use crate::game::physics_queue::{PhysicsAction, PhysicsQueue};

/// The bucket a producer is being asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerWindow {
    /// `start / granularity`
    pub bucket: u64,
    /// How far into the bucket the tick that entered it ran
    pub offset: u64,
    pub start: u64,
    /// Exclusive
    pub end: u64,
}

pub type Producer = Box<dyn FnMut(&SchedulerWindow) -> Option<PhysicsAction> + Send>;

pub struct EventScheduler {
    granularity: u64,
    current: Option<u64>,
    producers: Vec<(&'static str, Producer)>,
}

impl EventScheduler {
    pub fn new(granularity_ms: u64) -> Self {
        Self {
            granularity: granularity_ms.max(1),
            current: None,
            producers: Vec::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, producer: Producer) {
        tracing::debug!("Registered scheduled producer '{}'", name);
        self.producers.push((name, producer));
    }

    pub fn current_bucket(&self) -> Option<u64> {
        self.current
    }

    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    /// Run producers if `now` entered a new bucket. Returns the number of
    /// actions queued.
    pub fn update(&mut self, now: u64, queue: &mut PhysicsQueue) -> usize {
        let bucket = now / self.granularity;
        if self.current.is_some_and(|current| bucket <= current) {
            return 0;
        }
        if let Some(previous) = self.current {
            if bucket > previous + 1 {
                tracing::debug!("Scheduler skipped {} bucket(s)", bucket - previous - 1);
            }
        }
        self.current = Some(bucket);

        let start = bucket * self.granularity;
        let window = SchedulerWindow {
            bucket,
            offset: now - start,
            start,
            end: start + self.granularity,
        };
        let mut queued = 0;
        for (name, producer) in self.producers.iter_mut() {
            if let Some(action) = producer(&window) {
                tracing::debug!("Producer '{}' scheduled an action in bucket {}", name, bucket);
                queue.push(action);
                queued += 1;
            }
        }
        queued
    }
}
