//! Game composition root
//!
//! Owns every collection and runs the fixed-timestep tick. All mutation
//! happens on the thread calling `tick`; other threads talk to the game
//! through the inbox and read the player directory.

use std::sync::Arc;

use crate::config::SimConfig;
use crate::game::barrier::BarrierField;
use crate::game::bolt::Bolts;
use crate::game::context::GameContext;
use crate::game::events::DomainEvent;
use crate::game::id::EntityId;
use crate::game::inbox::{Inbox, InboxError, InboxItem, InboxSender};
use crate::game::performance::PerformanceMonitor;
use crate::game::physics_queue::PhysicsQueue;
use crate::game::replication::HandlerTable;
use crate::game::respawn::{self, RespawnPolicy};
use crate::game::scheduler::EventScheduler;
use crate::game::scoreboard::Scoreboard;
use crate::game::ship::{CommandError, Ship};
use crate::game::ships::{PlayerDirectory, Ships};
use crate::game::shockwave::hazard_producer;
use crate::net::protocol::{
    BarrierSnapshot, ClientMessage, Command, Outgoing, ServerMessage, WireError, WireRecord, WorldSnapshot,
};

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Inbox(#[from] InboxError),
    #[error("node is over its tick budget")]
    Overloaded,
}

/// Entity collections, grouped so apply handlers can borrow them together
pub struct Entities {
    pub ships: Ships,
    pub bolts: Bolts,
    pub scoreboard: Scoreboard,
}

impl Entities {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            ships: Ships::new(),
            bolts: Bolts::new(),
            scoreboard: Scoreboard::new(config.scoreboard_size, config.scoreboard_flush_ms),
        }
    }
}

/// Everything a tick produced
#[derive(Debug, Default)]
pub struct TickOutput {
    pub timestamp: u64,
    /// For the broker, in emission order
    pub domain: Vec<DomainEvent>,
    /// For connected clients
    pub client: Vec<Outgoing>,
}

impl TickOutput {
    pub fn is_empty(&self) -> bool {
        self.domain.is_empty() && self.client.is_empty()
    }
}

fn hosted<'a>(ships: &'a Ships, id: &EntityId) -> Result<&'a Ship, CommandError> {
    match ships.get(id) {
        Some(ship) if ship.is_local() => Ok(ship),
        Some(_) => Err(CommandError::NotLocal(*id)),
        None => Err(CommandError::UnknownShip(*id)),
    }
}

fn hosted_mut<'a>(ships: &'a mut Ships, id: &EntityId) -> Result<&'a mut Ship, CommandError> {
    match ships.get_mut(id) {
        Some(ship) if ship.is_local() => Ok(ship),
        Some(_) => Err(CommandError::NotLocal(*id)),
        None => Err(CommandError::UnknownShip(*id)),
    }
}

pub struct Game {
    entities: Entities,
    ctx: GameContext,
    handlers: HandlerTable,
    physics: PhysicsQueue,
    scheduler: EventScheduler,
    inbox: Inbox,
    directory: PlayerDirectory,
    performance: PerformanceMonitor,
    tick_count: u64,
}

impl Game {
    /// Generate the barrier field from the world seed and use the configured
    /// respawn policy
    pub fn new(config: SimConfig) -> Self {
        let barriers = Arc::new(BarrierField::generate(&config));
        let respawn = respawn::from_mode(config.respawn);
        Self::with_parts(config, barriers, respawn)
    }

    pub fn with_parts(config: SimConfig, barriers: Arc<BarrierField>, respawn: Box<dyn RespawnPolicy>) -> Self {
        let mut scheduler = EventScheduler::new(config.scheduler_granularity_ms);
        scheduler.register("hazards", hazard_producer(&config));
        Self {
            entities: Entities::new(&config),
            performance: PerformanceMonitor::new(config.tick_period_ms),
            handlers: HandlerTable::new(),
            physics: PhysicsQueue::new(),
            scheduler,
            inbox: Inbox::new(),
            directory: PlayerDirectory::new(),
            tick_count: 0,
            ctx: GameContext::new(config, barriers, respawn),
        }
    }

    /// Handle for producers on other threads
    pub fn inbox(&self) -> InboxSender {
        self.inbox.sender()
    }

    pub fn directory(&self) -> PlayerDirectory {
        self.directory.clone()
    }

    pub fn config(&self) -> &SimConfig {
        &self.ctx.config
    }

    pub fn now(&self) -> u64 {
        self.ctx.now
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn ships(&self) -> &Ships {
        &self.entities.ships
    }

    pub fn bolts(&self) -> &Bolts {
        &self.entities.bolts
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.entities.scoreboard
    }

    pub fn barriers(&self) -> &BarrierField {
        &self.ctx.barriers
    }

    pub fn performance(&self) -> &PerformanceMonitor {
        &self.performance
    }

    /// Host `ship` on this node. False if the id already left the game.
    pub fn connect(&mut self, ship: EntityId) -> bool {
        self.entities.ships.connect(ship, self.ctx.now, &self.ctx.config)
    }

    pub fn handle_command(&mut self, message: ClientMessage) -> Result<(), GameError> {
        let id = message.ship;
        let ships = &mut self.entities.ships;
        let ctx = &mut self.ctx;
        match message.command {
            Command::Join { name, variant } => {
                if !ships.get(&id).is_some_and(|s| s.is_local()) {
                    if !self.performance.can_accept_ships() {
                        ctx.outbox.directed(
                            id,
                            ServerMessage::Rejected {
                                reason: "server is at capacity".to_string(),
                            },
                        );
                        return Err(GameError::Overloaded);
                    }
                    if !ships.connect(id, ctx.now, &ctx.config) {
                        return Err(CommandError::UnknownShip(id).into());
                    }
                }
                if let Err(e) = hosted(ships, &id)?.join(&name, variant, ctx) {
                    ctx.outbox.directed(id, ServerMessage::Rejected { reason: e.to_string() });
                    return Err(e.into());
                }
            }
            Command::Spawn => {
                hosted(ships, &id)?.spawn(ctx);
            }
            Command::Move { dx, dy, angle } => {
                if dx.is_finite() && dy.is_finite() && angle.map_or(true, f64::is_finite) {
                    hosted_mut(ships, &id)?.move_by(dx, dy, angle, ctx);
                } else {
                    tracing::warn!("Ignoring non-finite move from {}", id);
                }
            }
            Command::Fire => {
                hosted(ships, &id)?.fire(ctx);
            }
            Command::Leave => {
                hosted(ships, &id)?;
                Ships::emit_departure(id, ctx);
            }
        }
        self.settle();
        Ok(())
    }

    /// Apply an event delivered by the broker. Returns whether it changed
    /// anything.
    pub fn apply_remote(&mut self, event: DomainEvent) -> bool {
        let applied = self.handlers.apply(&mut self.entities, &mut self.ctx, &event);
        self.settle();
        applied
    }

    pub fn apply_wire(&mut self, record: WireRecord) -> Result<bool, GameError> {
        let event = record.into_event()?;
        Ok(self.apply_remote(event))
    }

    fn handle_item(&mut self, item: InboxItem) -> Result<(), GameError> {
        match item {
            InboxItem::Command(message) => self.handle_command(message),
            InboxItem::Replicated(event) => {
                self.apply_remote(event);
                Ok(())
            }
            InboxItem::Wire(record) => self.apply_wire(record).map(|_| ()),
        }
    }

    /// Apply this node's own emissions until none are left, then answer
    /// snapshot requests against the settled state
    fn settle(&mut self) {
        while let Some(event) = self.ctx.outbox.next_local() {
            self.handlers.apply(&mut self.entities, &mut self.ctx, &event);
        }
        let requests = self.ctx.outbox.take_snapshot_requests();
        if requests.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for ship in requests {
            self.ctx.outbox.directed(ship, ServerMessage::Snapshot(snapshot.clone()));
        }
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            timestamp: self.ctx.now,
            ships: self
                .entities
                .ships
                .iter()
                .filter(|s| s.is_joined() || s.is_spawned())
                .map(Ship::snapshot)
                .collect(),
            bolts: self.entities.bolts.snapshots(),
            ranking: self.entities.scoreboard.ranking().to_vec(),
            barriers: self
                .ctx
                .barriers
                .iter()
                .map(|b| BarrierSnapshot {
                    x1: b.start().x(),
                    y1: b.start().y(),
                    x2: b.end().x(),
                    y2: b.end().y(),
                })
                .collect(),
        }
    }

    /// Run one fixed update at `now` (ms)
    pub fn tick(&mut self, now: u64) -> TickOutput {
        self.performance.tick_start();
        self.ctx.now = now.max(self.ctx.now);
        let now = self.ctx.now;
        self.physics.seal();

        for item in self.inbox.drain() {
            if let Err(e) = self.handle_item(item) {
                tracing::warn!("Dropped inbox item: {}", e);
            }
        }

        self.entities.ships.fixed_update(&mut self.ctx);
        self.entities.ships.expunge_stalled(&mut self.ctx);
        self.settle();

        self.entities.bolts.update(&self.entities.ships, &mut self.ctx);
        self.settle();

        self.entities.scoreboard.update(&mut self.ctx);

        self.scheduler.update(now, &mut self.physics);
        self.physics.run(&mut self.entities.ships, &mut self.ctx, now);
        self.settle();

        self.entities.bolts.sweep(&mut self.entities.ships, &mut self.ctx);

        let scoreboard = &self.entities.scoreboard;
        self.entities
            .ships
            .publish(&self.directory, |id| scoreboard.score(id).unwrap_or(0));

        self.tick_count += 1;
        let entity_count = self.entities.ships.len() + self.entities.bolts.len();
        if let Some(duration) = self.performance.tick_end(entity_count) {
            if duration.as_millis() as u64 > self.ctx.config.tick_period_ms {
                tracing::warn!("Tick {} took {:?}, over budget", self.tick_count, duration);
            }
        }

        TickOutput {
            timestamp: now,
            domain: self.ctx.outbox.take_replicated(),
            client: self.ctx.outbox.take_client(),
        }
    }
}
