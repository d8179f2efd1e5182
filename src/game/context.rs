//! Per-game shared context
//!
//! Everything entity code needs besides the entities themselves: the current
//! tick time, configuration, the immutable barrier field, the respawn policy
//! and the outbox collecting emitted events.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::SimConfig;
use crate::game::barrier::BarrierField;
use crate::game::events::DomainEvent;
use crate::game::id::EntityId;
use crate::game::respawn::RespawnPolicy;
use crate::net::protocol::{Outgoing, ServerMessage};

/// Sink for everything a tick produces
///
/// Emitted domain events go two ways: onto the replication list for the
/// broker, and onto a local queue the game applies before the next command.
#[derive(Debug, Default)]
pub struct Outbox {
    replicate: Vec<DomainEvent>,
    local: VecDeque<DomainEvent>,
    client: Vec<Outgoing>,
    snapshot_requests: Vec<EntityId>,
}

impl Outbox {
    pub fn emit(&mut self, event: DomainEvent) {
        self.replicate.push(event.clone());
        self.local.push_back(event);
    }

    pub fn send(&mut self, outgoing: Outgoing) {
        self.client.push(outgoing);
    }

    pub fn broadcast(&mut self, message: ServerMessage) {
        self.send(Outgoing::broadcast(message));
    }

    pub fn directed(&mut self, to: EntityId, message: ServerMessage) {
        self.send(Outgoing::directed(to, message));
    }

    /// Ask for a world snapshot to be sent to `ship`
    pub fn request_snapshot(&mut self, ship: EntityId) {
        self.snapshot_requests.push(ship);
    }

    /// Next emitted event not yet applied locally
    pub fn next_local(&mut self) -> Option<DomainEvent> {
        self.local.pop_front()
    }

    pub fn take_snapshot_requests(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.snapshot_requests)
    }

    pub fn take_replicated(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.replicate)
    }

    pub fn take_client(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.client)
    }

    pub fn replicated(&self) -> &[DomainEvent] {
        &self.replicate
    }

    pub fn client(&self) -> &[Outgoing] {
        &self.client
    }
}

pub struct GameContext {
    pub config: SimConfig,
    /// Current tick timestamp (ms)
    pub now: u64,
    pub barriers: Arc<BarrierField>,
    pub respawn: Box<dyn RespawnPolicy>,
    pub outbox: Outbox,
}

impl GameContext {
    pub fn new(config: SimConfig, barriers: Arc<BarrierField>, respawn: Box<dyn RespawnPolicy>) -> Self {
        Self {
            config,
            now: 0,
            barriers,
            respawn,
            outbox: Outbox::default(),
        }
    }

    #[inline]
    pub fn emit(&mut self, event: DomainEvent) {
        self.outbox.emit(event);
    }
}
