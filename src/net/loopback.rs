//! In-process broker
//!
//! Stands in for the external pub/sub broker when nodes share a process
//! (single-node runs and tests). Every published event is encoded into a wire
//! record once and delivered to every subscriber, including the publisher,
//! which the apply path treats as a harmless echo.

use crate::game::events::DomainEvent;
use crate::game::inbox::InboxSender;
use crate::net::protocol::{WireError, WireRecord};

#[derive(Default)]
pub struct LoopbackBroker {
    subscribers: Vec<InboxSender>,
    published: u64,
}

impl LoopbackBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, inbox: InboxSender) {
        self.subscribers.push(inbox);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Records published since startup
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Deliver `events` in order. Subscribers whose game loop has stopped are
    /// dropped. Returns the number of records published.
    pub fn publish(&mut self, events: &[DomainEvent]) -> Result<usize, WireError> {
        if events.is_empty() {
            return Ok(0);
        }
        let records = events
            .iter()
            .map(WireRecord::from_event)
            .collect::<Result<Vec<_>, _>>()?;

        self.subscribers.retain(|subscriber| {
            for record in &records {
                if subscriber.wire(record.clone()).is_err() {
                    tracing::warn!("Dropping disconnected broker subscriber");
                    return false;
                }
            }
            true
        });
        self.published += records.len() as u64;
        Ok(records.len())
    }
}
