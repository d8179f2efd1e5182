//! Projectiles
//!
//! Every node materializes every bolt from its "fired" event and flies it
//! locally. Only the node hosting the owner decides how a bolt ends: it runs
//! the hit checks and emits "exhausted". Other nodes retire bolts that leave
//! the world or outlive their TTL without telling anyone.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::game::arena::{SlotArena, SlotKey};
use crate::game::collision::swept_hit;
use crate::game::constants::bolt::TOMBSTONE_CAPACITY;
use crate::game::context::GameContext;
use crate::game::events::{BoltExhausted, BoltFired, DomainEvent};
use crate::game::id::EntityId;
use crate::game::position::{BoundaryPolicy, MotionParams, PositionVector};
use crate::game::ship::Ship;
use crate::game::ships::Ships;
use crate::net::protocol::{BoltSnapshot, ServerMessage};
use crate::util::tombstones::Tombstones;
use crate::util::vec2::Vector2;

#[derive(Debug, Clone)]
pub struct Bolt {
    id: EntityId,
    owner: EntityId,
    motion: PositionVector,
    fired: BoltFired,
    exhausted: bool,
    /// Counted against the owner's live total
    counted: bool,
}

impl Bolt {
    fn new(id: EntityId, fired: &BoltFired, min_resolution: f64) -> Self {
        let params = MotionParams {
            boundary: BoundaryPolicy::Ignore,
            max_speed: None,
            dampening: 0.0,
            min_resolution,
        };
        Self {
            id,
            owner: fired.owner,
            motion: PositionVector::new(
                Vector2::cartesian(fired.x, fired.y),
                Vector2::polar(fired.angle, fired.speed),
                fired.start_ts,
                params,
            ),
            fired: *fired,
            exhausted: false,
            counted: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn motion(&self) -> &PositionVector {
        &self.motion
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn expires_at(&self) -> u64 {
        self.fired.start_ts.saturating_add(self.fired.ttl_ms)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at()
    }

    pub fn snapshot(&self) -> BoltSnapshot {
        BoltSnapshot {
            id: self.id,
            owner: self.owner,
            x: self.fired.x,
            y: self.fired.y,
            angle: self.fired.angle,
            speed: self.fired.speed,
            start_ts: self.fired.start_ts,
            ttl_ms: self.fired.ttl_ms,
        }
    }
}

fn ammo(ship: &Ship, ctx: &mut GameContext) {
    let available = ctx.config.max_live_bolts.saturating_sub(ship.live_bolts());
    ctx.outbox.directed(ship.id(), ServerMessage::Ammo { available });
}

pub struct Bolts {
    arena: SlotArena<Bolt>,
    index: FxHashMap<EntityId, SlotKey>,
    /// Exhausted or swept ids, so late "fired" replays stay dead
    retired: Tombstones<EntityId>,
}

impl Default for Bolts {
    fn default() -> Self {
        Self::new()
    }
}

impl Bolts {
    pub fn new() -> Self {
        Self {
            arena: SlotArena::with_capacity(256),
            index: FxHashMap::default(),
            retired: Tombstones::new(TOMBSTONE_CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<&Bolt> {
        self.index.get(id).and_then(|key| self.arena.get(*key))
    }

    pub fn is_retired(&self, id: &EntityId) -> bool {
        self.retired.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bolt> {
        self.arena.iter().map(|(_, bolt)| bolt)
    }

    /// Bolts still in flight, for world snapshots
    pub fn snapshots(&self) -> Vec<BoltSnapshot> {
        self.iter().filter(|b| !b.exhausted).map(Bolt::snapshot).collect()
    }

    // ------------------------------------------------------------------
    // Apply path
    // ------------------------------------------------------------------

    pub(crate) fn apply_fired(&mut self, id: EntityId, fired: &BoltFired, ships: &mut Ships, ctx: &mut GameContext) -> bool {
        if self.index.contains_key(&id) || self.retired.contains(&id) {
            return false;
        }
        let expired = ctx.now >= fired.start_ts.saturating_add(fired.ttl_ms);
        let cap = ctx.config.max_live_bolts;
        if !expired {
            if let Some(owner) = ships.get(&fired.owner) {
                if owner.live_bolts() >= cap {
                    tracing::debug!("Dropping bolt {}: owner {} at capacity", id, fired.owner);
                    return false;
                }
            }
        }

        let mut bolt = Bolt::new(id, fired, ctx.config.min_resolution);
        if expired {
            // Arrived too late to fly; retired by the end-of-tick sweep
            bolt.exhausted = true;
        } else {
            bolt.motion.update(ctx.now);
        }

        let owner = ships.get_mut(&fired.owner);
        if let Some(owner) = owner {
            owner.bolt_materialized();
            bolt.counted = true;
            if owner.is_local() {
                ammo(owner, ctx);
                if expired {
                    ctx.emit(DomainEvent::exhausted(
                        id,
                        BoltExhausted {
                            owner: fired.owner,
                            hit: None,
                        },
                        ctx.now,
                    ));
                }
            }
        }
        if !expired {
            ctx.outbox.broadcast(ServerMessage::BoltFired(bolt.snapshot()));
        }

        let key = self.arena.insert(bolt);
        self.index.insert(id, key);
        true
    }

    pub(crate) fn apply_exhausted(&mut self, id: EntityId, exhausted: &BoltExhausted, ctx: &mut GameContext) -> bool {
        if !self.retired.insert(id) {
            return false;
        }
        if let Some(bolt) = self.index.get(&id).and_then(|key| self.arena.get_mut(*key)) {
            bolt.exhausted = true;
        }
        ctx.outbox.broadcast(ServerMessage::BoltExhausted {
            id,
            owner: exhausted.owner,
        });
        true
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Fly every live bolt to `ctx.now`; authoritative bolts also check for
    /// hits against the ship index.
    pub fn update(&mut self, ships: &Ships, ctx: &mut GameContext) {
        let now = ctx.now;
        let radius = ctx.config.bolt_collision_radius;
        let window = ctx.config.tick_period_ms;
        let margin = radius + ctx.config.ship_travel_per_tick();
        // Destruction lands at the next settle; until then a downed ship is
        // still flagged spawned and must not be destroyed twice
        let mut downed: FxHashSet<EntityId> = FxHashSet::default();

        for (_, bolt) in self.arena.iter_mut() {
            if bolt.exhausted {
                continue;
            }
            bolt.motion.update(now);
            let authoritative = ships.get(&bolt.owner).is_some_and(|s| s.is_local());

            if bolt.motion.is_out_of_bounds() || bolt.is_expired(now) {
                bolt.exhausted = true;
                if authoritative {
                    ctx.emit(DomainEvent::exhausted(
                        bolt.id,
                        BoltExhausted {
                            owner: bolt.owner,
                            hit: None,
                        },
                        now,
                    ));
                }
                continue;
            }
            if !authoritative {
                continue;
            }

            let from = bolt.motion.previous_position();
            let to = bolt.motion.position();
            for candidate in ships.search(from.x(), from.y(), to.x(), to.y(), margin) {
                if candidate == bolt.owner {
                    continue;
                }
                let Some(target) = ships.get(&candidate) else {
                    continue;
                };
                if !target.is_spawned()
                    || downed.contains(&candidate)
                    || !swept_hit(&bolt.motion, target.motion(), radius, window)
                {
                    continue;
                }
                bolt.exhausted = true;
                ctx.emit(DomainEvent::exhausted(
                    bolt.id,
                    BoltExhausted {
                        owner: bolt.owner,
                        hit: Some(candidate),
                    },
                    now,
                ));
                target.destroy(bolt.owner, ctx);
                downed.insert(candidate);
                tracing::debug!("Bolt {} from {} hit {}", bolt.id, bolt.owner, candidate);
                break;
            }
        }
    }

    /// Drop exhausted bolts and hand the ammo back to their owners.
    /// Returns how many were removed.
    pub fn sweep(&mut self, ships: &mut Ships, ctx: &mut GameContext) -> usize {
        let done: SmallVec<[(SlotKey, EntityId); 16]> = self
            .arena
            .iter()
            .filter(|(_, bolt)| bolt.exhausted)
            .map(|(key, bolt)| (key, bolt.id))
            .collect();

        for &(key, id) in &done {
            let Some(bolt) = self.arena.remove(key) else {
                continue;
            };
            self.index.remove(&id);
            // Retired locally without an "exhausted" event
            if self.retired.insert(id) {
                ctx.outbox.broadcast(ServerMessage::BoltExhausted { id, owner: bolt.owner });
            }
            if !bolt.counted {
                continue;
            }
            if let Some(owner) = ships.get_mut(&bolt.owner) {
                owner.bolt_removed();
                if owner.is_local() {
                    ammo(owner, ctx);
                }
            }
        }
        done.len()
    }
}
