//! Ship collection, ship spatial index and the shared player directory

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::config::SimConfig;
use crate::game::constants::{net::DEPARTED_CAPACITY, spatial::SHIP_GRID_CELL_SIZE};
use crate::game::context::GameContext;
use crate::game::events::{ActionKind, DomainEvent, PlayerAction, ShipJoined};
use crate::game::id::EntityId;
use crate::game::ship::Ship;
use crate::game::spatial::{Candidates, SpatialGrid};
use crate::net::protocol::{ServerMessage, ShipMotion};
use crate::util::tombstones::Tombstones;

/// Public view of a joined player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSummary {
    pub id: EntityId,
    pub name: String,
    pub variant: u8,
    pub spawned: bool,
    pub score: i64,
}

/// Read-mostly player list for other threads
///
/// Republished by the simulation thread at the end of every tick, so readers
/// see a snapshot at most one tick old and never wait on the simulation.
#[derive(Debug, Clone, Default)]
pub struct PlayerDirectory {
    inner: Arc<RwLock<HashMap<EntityId, PlayerSummary>>>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &EntityId) -> Option<PlayerSummary> {
        self.inner.read().get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.inner.read().len()
    }

    pub fn snapshot(&self) -> Vec<PlayerSummary> {
        self.inner.read().values().cloned().collect()
    }

    pub(crate) fn publish(&self, players: HashMap<EntityId, PlayerSummary>) {
        *self.inner.write() = players;
    }
}

pub struct Ships {
    ships: HashMap<EntityId, Ship>,
    departed: Tombstones<EntityId>,
    grid: SpatialGrid<EntityId>,
    last_expunge_check: u64,
}

impl Default for Ships {
    fn default() -> Self {
        Self::new()
    }
}

impl Ships {
    pub fn new() -> Self {
        Self {
            ships: HashMap::new(),
            departed: Tombstones::new(DEPARTED_CAPACITY),
            grid: SpatialGrid::new(SHIP_GRID_CELL_SIZE),
            last_expunge_check: 0,
        }
    }

    /// Register a ship whose client is connected to this node.
    /// Returns false for ids that already left.
    pub fn connect(&mut self, id: EntityId, now: u64, config: &SimConfig) -> bool {
        if self.departed.contains(&id) {
            return false;
        }
        self.ships
            .entry(id)
            .or_insert_with(|| Ship::new(id, true, now, config))
            .set_local(true);
        true
    }

    pub fn get(&self, id: &EntityId) -> Option<&Ship> {
        self.ships.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut Ship> {
        self.ships.get_mut(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.ships.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ship> {
        self.ships.values()
    }

    pub fn local_count(&self) -> usize {
        self.ships.values().filter(|s| s.is_local()).count()
    }

    pub fn is_departed(&self, id: &EntityId) -> bool {
        self.departed.contains(id)
    }

    /// Spawned ships near the box, as of the last `fixed_update`
    pub fn search(&self, x1: f64, y1: f64, x2: f64, y2: f64, margin: f64) -> Candidates<EntityId> {
        self.grid.search(x1, y1, x2, y2, margin)
    }

    pub fn grid_stats(&self) -> crate::game::spatial::SpatialGridStats {
        self.grid.stats()
    }

    /// Advance local ships and rebuild the spatial index
    pub fn fixed_update(&mut self, ctx: &mut GameContext) {
        for ship in self.ships.values_mut() {
            ship.fixed_update(ctx);
        }

        self.grid.clear();
        for ship in self.ships.values().filter(|s| s.is_spawned()) {
            let at = ship.motion().position_at(ctx.now);
            self.grid.insert_point(ship.id(), at.x(), at.y());
        }
    }

    /// Emit "left" for local ships idle past the stall timeout.
    /// Checked at most once per expunge interval.
    pub fn expunge_stalled(&mut self, ctx: &mut GameContext) -> usize {
        if ctx.now < self.last_expunge_check + ctx.config.expunge_check_interval_ms {
            return 0;
        }
        self.last_expunge_check = ctx.now;

        let timeout = ctx.config.stall_timeout_ms;
        let stalled: Vec<EntityId> = self
            .ships
            .values()
            .filter(|s| s.is_local() && s.is_stalled(ctx.now, timeout))
            .map(|s| s.id())
            .collect();
        for id in &stalled {
            tracing::info!("Expunging stalled ship {}", id);
            Self::emit_departure(*id, ctx);
        }
        stalled.len()
    }

    /// "left" plus removal from the scoreboard
    pub fn emit_departure(id: EntityId, ctx: &mut GameContext) {
        ctx.emit(DomainEvent::left(id, ctx.now));
        ctx.emit(DomainEvent::score_removed(id, ctx.now));
    }

    pub fn publish(&self, directory: &PlayerDirectory, score_of: impl Fn(&EntityId) -> i64) {
        let players = self
            .ships
            .values()
            .filter_map(|ship| {
                ship.name().map(|name| {
                    (
                        ship.id(),
                        PlayerSummary {
                            id: ship.id(),
                            name: name.to_string(),
                            variant: ship.variant(),
                            spawned: ship.is_spawned(),
                            score: score_of(&ship.id()),
                        },
                    )
                })
            })
            .collect();
        directory.publish(players);
    }

    // ------------------------------------------------------------------
    // Apply path
    // ------------------------------------------------------------------

    pub(crate) fn apply_joined(&mut self, id: EntityId, joined: &ShipJoined, timestamp: u64, ctx: &mut GameContext) -> bool {
        if self.departed.contains(&id) {
            return false;
        }
        let ship = self
            .ships
            .entry(id)
            .or_insert_with(|| Ship::new(id, false, timestamp, &ctx.config));
        if !ship.apply_joined(&joined.name, joined.variant, timestamp) {
            return false;
        }
        ctx.outbox.broadcast(ServerMessage::ShipJoined {
            id,
            name: joined.name.clone(),
            variant: joined.variant,
        });
        if ship.is_local() {
            ctx.outbox.request_snapshot(id);
        }
        true
    }

    pub(crate) fn apply_left(&mut self, id: EntityId, ctx: &mut GameContext) -> bool {
        if !self.departed.insert(id) {
            return false;
        }
        let known = self.ships.remove(&id).is_some();
        if known {
            ctx.outbox.broadcast(ServerMessage::ShipLeft { id });
        }
        known
    }

    pub(crate) fn apply_action(&mut self, id: EntityId, action: &PlayerAction, ctx: &mut GameContext) -> bool {
        if self.departed.contains(&id) {
            return false;
        }
        let ship = self
            .ships
            .entry(id)
            .or_insert_with(|| Ship::new(id, false, action.timestamp, &ctx.config));
        if !ship.apply_action(action) {
            return false;
        }
        let motion = ShipMotion::from(action);
        match action.kind {
            ActionKind::Moved => ctx.outbox.broadcast(ServerMessage::ShipMoved { id, motion }),
            ActionKind::Spawned => {
                ctx.outbox.broadcast(ServerMessage::ShipSpawned { id, motion });
                // A move that overtook this spawn was folded in
                if ship.motion().timestamp() > action.timestamp {
                    let motion = ship.current_motion();
                    ctx.outbox.broadcast(ServerMessage::ShipMoved { id, motion });
                }
            }
            ActionKind::Destroyed => {
                ctx.outbox.broadcast(ServerMessage::ShipDestroyed { id, by: action.by });
                if ship.is_local() {
                    ctx.emit(DomainEvent::score_reset(id, action.timestamp));
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::context::test_support::context;

    fn action(kind: ActionKind, x: f64, y: f64, timestamp: u64) -> PlayerAction {
        PlayerAction {
            kind,
            x,
            y,
            angle: 0.0,
            thrust_angle: 0.0,
            velocity: 0.0,
            timestamp,
            by: None,
        }
    }

    fn joined(name: &str) -> ShipJoined {
        ShipJoined {
            name: name.to_string(),
            variant: 2,
        }
    }

    #[test]
    fn test_remote_join_creates_ship() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let id = EntityId::generate();

        assert!(ships.apply_joined(id, &joined("remote"), 10, &mut ctx));
        assert!(!ships.apply_joined(id, &joined("remote"), 10, &mut ctx));
        let ship = ships.get(&id).unwrap();
        assert!(!ship.is_local());
        assert_eq!(ship.name(), Some("remote"));
        // Remote joins do not trigger a snapshot
        assert!(ctx.outbox.take_snapshot_requests().is_empty());
        assert_eq!(ctx.outbox.take_client().len(), 1);
    }

    #[test]
    fn test_local_join_requests_snapshot() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let id = EntityId::generate();
        ships.connect(id, 0, &ctx.config);
        ships.apply_joined(id, &joined("local"), 1, &mut ctx);
        assert_eq!(ctx.outbox.take_snapshot_requests(), vec![id]);
    }

    #[test]
    fn test_left_is_terminal() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let id = EntityId::generate();
        ships.apply_joined(id, &joined("gone"), 10, &mut ctx);

        assert!(ships.apply_left(id, &mut ctx));
        assert!(!ships.apply_left(id, &mut ctx));
        assert!(!ships.contains(&id));

        // Late events do not resurrect it
        assert!(!ships.apply_joined(id, &joined("gone"), 5, &mut ctx));
        assert!(!ships.apply_action(id, &action(ActionKind::Spawned, 0.5, 0.5, 20), &mut ctx));
        assert!(!ships.contains(&id));
        assert!(!ships.connect(id, 30, &ctx.config));
    }

    #[test]
    fn test_moved_replay_is_idempotent_and_last_write_wins() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let id = EntityId::generate();
        ships.apply_action(id, &action(ActionKind::Spawned, 0.5, 0.5, 10), &mut ctx);
        ctx.outbox.take_client();

        let early = action(ActionKind::Moved, 0.1, 0.1, 100);
        let late = action(ActionKind::Moved, 0.9, 0.2, 200);

        assert!(ships.apply_action(id, &late, &mut ctx));
        assert!(!ships.apply_action(id, &late, &mut ctx));
        assert!(!ships.apply_action(id, &early, &mut ctx));
        assert_eq!(ctx.outbox.take_client().len(), 1);

        let position = ships.get(&id).unwrap().motion().position();
        assert_eq!(position, crate::util::vec2::Vector2::cartesian(0.9, 0.2));
    }

    #[test]
    fn test_move_overtaking_its_spawn_is_kept() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let id = EntityId::generate();

        assert!(!ships.apply_action(id, &action(ActionKind::Moved, 0.9, 0.2, 200), &mut ctx));
        assert!(ships.apply_action(id, &action(ActionKind::Spawned, 0.5, 0.5, 100), &mut ctx));

        let ship = ships.get(&id).unwrap();
        assert!(ship.is_spawned());
        assert_eq!(ship.motion().timestamp(), 200);
        assert_eq!(ship.motion().position(), crate::util::vec2::Vector2::cartesian(0.9, 0.2));
        let messages = ctx.outbox.take_client();
        assert!(messages
            .iter()
            .any(|m| matches!(&m.message, ServerMessage::ShipMoved { id: moved, .. } if *moved == id)));

        // The same move replayed after the spawn is a no-op
        assert!(!ships.apply_action(id, &action(ActionKind::Moved, 0.9, 0.2, 200), &mut ctx));
    }

    #[test]
    fn test_move_older_than_destruction_is_not_kept() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let id = EntityId::generate();
        ships.apply_action(id, &action(ActionKind::Spawned, 0.5, 0.5, 10), &mut ctx);
        ships.apply_action(id, &action(ActionKind::Destroyed, 0.5, 0.5, 100), &mut ctx);

        assert!(!ships.apply_action(id, &action(ActionKind::Moved, 0.9, 0.2, 50), &mut ctx));
        assert!(ships.apply_action(id, &action(ActionKind::Spawned, 0.3, 0.3, 150), &mut ctx));
        let ship = ships.get(&id).unwrap();
        assert_eq!(ship.motion().position(), crate::util::vec2::Vector2::cartesian(0.3, 0.3));
        assert_eq!(ship.motion().timestamp(), 150);
    }

    #[test]
    fn test_local_destruction_resets_score() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let id = EntityId::generate();
        ships.connect(id, 0, &ctx.config);
        ships.apply_action(id, &action(ActionKind::Spawned, 0.5, 0.5, 10), &mut ctx);
        ships.apply_action(id, &action(ActionKind::Destroyed, 0.5, 0.5, 20), &mut ctx);

        let events = ctx.outbox.take_replicated();
        assert_eq!(events, vec![DomainEvent::score_reset(id, 20)]);
        assert!(!ships.get(&id).unwrap().is_spawned());
    }

    #[test]
    fn test_grid_tracks_spawned_ships() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let spawned = EntityId::generate();
        let idle = EntityId::generate();
        ships.apply_action(spawned, &action(ActionKind::Spawned, 0.2, 0.2, 0), &mut ctx);
        ships.apply_joined(idle, &joined("idle"), 0, &mut ctx);

        ctx.now = 50;
        ships.fixed_update(&mut ctx);
        assert_eq!(ships.search(0.0, 0.0, 1.0, 1.0, 0.0).as_slice(), &[spawned]);
        assert!(ships.search(0.6, 0.6, 0.9, 0.9, 0.0).is_empty());
    }

    #[test]
    fn test_expunge_only_local_stalled() {
        let mut config = SimConfig::default();
        config.stall_timeout_ms = 1_000;
        config.expunge_check_interval_ms = 500;
        let mut ctx = context(config);
        let mut ships = Ships::new();
        let local = EntityId::generate();
        let remote = EntityId::generate();
        ships.connect(local, 0, &ctx.config);
        ships.apply_joined(remote, &joined("remote"), 0, &mut ctx);

        ctx.now = 600;
        assert_eq!(ships.expunge_stalled(&mut ctx), 0);
        ctx.now = 1_200;
        assert_eq!(ships.expunge_stalled(&mut ctx), 1);
        // Within the check interval nothing is re-examined
        ctx.now = 1_300;
        assert_eq!(ships.expunge_stalled(&mut ctx), 0);

        let events = ctx.outbox.take_replicated();
        assert_eq!(
            events,
            vec![DomainEvent::left(local, 1_200), DomainEvent::score_removed(local, 1_200)]
        );
    }

    #[test]
    fn test_directory_lists_joined_players() {
        let mut ctx = context(SimConfig::default());
        let mut ships = Ships::new();
        let named = EntityId::generate();
        let anonymous = EntityId::generate();
        ships.apply_joined(named, &joined("named"), 0, &mut ctx);
        ships.connect(anonymous, 0, &ctx.config);

        let directory = PlayerDirectory::new();
        ships.publish(&directory, |_| 7);
        assert_eq!(directory.count(), 1);
        let summary = directory.get(&named).unwrap();
        assert_eq!(summary.name, "named");
        assert_eq!(summary.score, 7);
        assert!(directory.get(&anonymous).is_none());

        let reader = directory.clone();
        let handle = std::thread::spawn(move || reader.count());
        assert_eq!(handle.join().unwrap(), 1);
    }
}
