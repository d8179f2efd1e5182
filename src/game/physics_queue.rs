//! Deferred physics work
//!
//! Multi-tick effects (shockwaves) are closures that run once per tick
//! against the ship collection. An action returning `true` wants another
//! tick and is re-queued; `false` finishes it.

use std::collections::VecDeque;

use crate::game::context::GameContext;
use crate::game::ships::Ships;

pub type PhysicsAction = Box<dyn FnMut(&mut Ships, &mut GameContext, u64) -> bool + Send>;

/// Double-buffered action queue
///
/// `seal` fixes the batch for the current tick; anything pushed afterwards,
/// including re-queued actions, waits for the next one.
#[derive(Default)]
pub struct PhysicsQueue {
    ready: VecDeque<PhysicsAction>,
    incoming: VecDeque<PhysicsAction>,
}

impl PhysicsQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: PhysicsAction) {
        self.incoming.push_back(action);
    }

    /// Start of tick: everything queued so far becomes this tick's batch
    pub fn seal(&mut self) {
        self.ready.append(&mut self.incoming);
    }

    /// Invoke this tick's batch once each. Returns how many ran.
    pub fn run(&mut self, ships: &mut Ships, ctx: &mut GameContext, now: u64) -> usize {
        let batch = std::mem::take(&mut self.ready);
        let count = batch.len();
        for mut action in batch {
            if action(ships, ctx, now) {
                self.incoming.push_back(action);
            }
        }
        count
    }

    /// Actions waiting for a future tick or the current one
    pub fn len(&self) -> usize {
        self.ready.len() + self.incoming.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.incoming.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::game::context::test_support::context;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>, runs: usize) -> PhysicsAction {
        let counter = Arc::clone(counter);
        let mut left = runs;
        Box::new(move |_: &mut Ships, _: &mut GameContext, _: u64| {
            counter.fetch_add(1, Ordering::SeqCst);
            left -= 1;
            left > 0
        })
    }

    #[test]
    fn test_only_sealed_actions_run() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let mut queue = PhysicsQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));

        queue.push(counting(&counter, 1));
        // Not sealed yet
        assert_eq!(queue.run(&mut ships, &mut ctx, 0), 0);

        queue.seal();
        queue.push(counting(&counter, 1));
        assert_eq!(queue.run(&mut ships, &mut ctx, 0), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_repeating_action_runs_once_per_tick() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let mut queue = PhysicsQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        queue.push(counting(&counter, 3));

        for tick in 0..5u64 {
            queue.seal();
            queue.run(&mut ships, &mut ctx, tick * 50);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(queue.is_empty());
    }
}
