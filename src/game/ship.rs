//! Ship state machine
//!
//! Commands (`join`, `spawn`, `move_by`, `fire`, `destroy`) only emit domain
//! events; the `apply_*` methods are the single place state changes, and run
//! for events from this node and from every other node alike.
//!
//! A ship is *local* when its client is connected to this node. Only local
//! ships are advanced, bounced off barriers and broadcast by dead reckoning;
//! remote ships hold the last replicated sample.

use crate::config::SimConfig;
use crate::game::constants::ship::VARIANT_COUNT;
use crate::game::context::GameContext;
use crate::game::events::{ActionKind, BoltFired, DomainEvent, PlayerAction};
use crate::game::id::EntityId;
use crate::game::position::{BoundaryPolicy, MotionParams, PositionVector};
use crate::net::protocol::{ShipMotion, ShipSnapshot};
use crate::util::vec2::{angle_delta, Vector2};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown ship {0}")]
    UnknownShip(EntityId),
    #[error("ship {0} is not hosted on this node")]
    NotLocal(EntityId),
    #[error("display name is empty")]
    EmptyName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipPhase {
    /// Connected, no name yet
    Unjoined,
    /// Named, never spawned
    Joined,
    Spawned,
    /// Named, destroyed and waiting to respawn
    Destroyed,
}

/// Trim, drop control characters and cap the length. `None` if nothing is left.
pub fn sanitize_name(raw: &str, max_len: usize) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(max_len)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Turn from `current` towards `target` by at most `max_rotation` radians
pub fn limit_rotation(current: f64, target: f64, max_rotation: f64) -> f64 {
    let step = angle_delta(current, target).clamp(-max_rotation, max_rotation);
    angle_delta(0.0, current + step)
}

pub fn ship_motion_params(config: &SimConfig) -> MotionParams {
    MotionParams {
        boundary: BoundaryPolicy::Bounce,
        max_speed: Some(config.ship_max_speed),
        dampening: config.ship_dampening,
        min_resolution: config.min_resolution,
    }
}

#[derive(Debug, Clone)]
pub struct Ship {
    id: EntityId,
    name: Option<String>,
    variant: u8,
    spawned: bool,
    ever_spawned: bool,
    /// Heading
    angle: f64,
    motion: PositionVector,
    live_bolts: u32,
    local: bool,
    join_ts: u64,
    /// Last spawned/destroyed applied
    lifecycle_ts: Option<u64>,
    last_move_ts: u64,
    /// Newest move that arrived ahead of the spawn it belongs to
    pending_move: Option<PlayerAction>,
    /// When the ship last stopped being spawned (or was created)
    idle_since: u64,
    /// Local state changed since the last "moved" was emitted
    dirty: bool,
}

impl Ship {
    pub fn new(id: EntityId, local: bool, now: u64, config: &SimConfig) -> Self {
        Self {
            id,
            name: None,
            variant: 0,
            spawned: false,
            ever_spawned: false,
            angle: 0.0,
            motion: PositionVector::new(Vector2::ZERO, Vector2::ZERO, now, ship_motion_params(config)),
            live_bolts: 0,
            local,
            join_ts: 0,
            lifecycle_ts: None,
            last_move_ts: 0,
            pending_move: None,
            idle_since: now,
            dirty: false,
        }
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn variant(&self) -> u8 {
        self.variant
    }

    #[inline]
    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    pub fn is_joined(&self) -> bool {
        self.name.is_some()
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    #[inline]
    pub fn motion(&self) -> &PositionVector {
        &self.motion
    }

    pub fn live_bolts(&self) -> u32 {
        self.live_bolts
    }

    pub fn phase(&self) -> ShipPhase {
        if self.spawned {
            ShipPhase::Spawned
        } else if self.name.is_none() {
            ShipPhase::Unjoined
        } else if self.ever_spawned {
            ShipPhase::Destroyed
        } else {
            ShipPhase::Joined
        }
    }

    /// Not spawned for longer than `timeout_ms`
    pub fn is_stalled(&self, now: u64, timeout_ms: u64) -> bool {
        !self.spawned && now.saturating_sub(self.idle_since) > timeout_ms
    }

    pub(crate) fn set_local(&mut self, local: bool) {
        self.local = local;
    }

    pub fn snapshot(&self) -> ShipSnapshot {
        ShipSnapshot {
            id: self.id,
            name: self.name.clone(),
            variant: self.variant,
            spawned: self.spawned,
            motion: self.current_motion(),
        }
    }

    pub fn current_motion(&self) -> ShipMotion {
        let velocity = self.motion.velocity();
        let position = self.motion.position();
        ShipMotion {
            x: position.x(),
            y: position.y(),
            angle: self.angle,
            thrust_angle: velocity.angle(),
            velocity: velocity.magnitude(),
            timestamp: self.motion.timestamp(),
        }
    }

    fn action(&self, kind: ActionKind, position: Vector2, timestamp: u64, by: Option<EntityId>) -> PlayerAction {
        let velocity = self.motion.velocity();
        PlayerAction {
            kind,
            x: position.x(),
            y: position.y(),
            angle: self.angle,
            thrust_angle: velocity.angle(),
            velocity: velocity.magnitude(),
            timestamp,
            by,
        }
    }

    // ------------------------------------------------------------------
    // Command path
    // ------------------------------------------------------------------

    pub fn join(&self, name: &str, variant: u8, ctx: &mut GameContext) -> Result<(), CommandError> {
        let name = sanitize_name(name, ctx.config.max_name_len).ok_or(CommandError::EmptyName)?;
        ctx.emit(DomainEvent::joined(self.id, name, variant % VARIANT_COUNT, ctx.now));
        Ok(())
    }

    /// Returns whether a "spawned" event was emitted
    pub fn spawn(&self, ctx: &mut GameContext) -> bool {
        if self.spawned || self.name.is_none() {
            return false;
        }
        let at = ctx.respawn.next_position();
        ctx.emit(DomainEvent::action(
            self.id,
            PlayerAction {
                kind: ActionKind::Spawned,
                x: at.x(),
                y: at.y(),
                angle: self.angle,
                thrust_angle: 0.0,
                velocity: 0.0,
                timestamp: ctx.now,
                by: None,
            },
        ));
        true
    }

    /// Apply a thrust impulse and heading request. The "moved" event goes out
    /// from the next `fixed_update`, so a tick emits at most one per ship.
    pub fn move_by(&mut self, dx: f64, dy: f64, angle: Option<f64>, ctx: &mut GameContext) -> bool {
        if !self.spawned {
            return false;
        }
        let before = self.motion.timestamp();
        let mut changed = self.motion.move_by(dx, dy, ctx.now);
        if self.motion.timestamp() != before && self.motion.has_moved() {
            self.collide_barriers(ctx);
        }
        if let Some(target) = angle {
            let limited = limit_rotation(self.angle, target, ctx.config.ship_max_rotation);
            if limited != self.angle {
                self.angle = limited;
                changed = true;
            }
        }
        if changed {
            self.dirty = true;
        }
        changed
    }

    /// Emit a "fired" event for a new bolt; `None` while unspawned or out of ammo
    pub fn fire(&self, ctx: &mut GameContext) -> Option<EntityId> {
        if !self.spawned || self.live_bolts >= ctx.config.max_live_bolts {
            return None;
        }
        let config = &ctx.config;
        let heading = Vector2::from_angle(self.angle);
        let nose = self.motion.position() + heading * (config.ship_length / 2.0);

        let ship_velocity = self.motion.velocity();
        let sign = if ship_velocity.dot(heading) < 0.0 { -1.0 } else { 1.0 };
        let velocity = Vector2::polar(self.angle, config.bolt_speed)
            + ship_velocity.reject_from(heading) * config.bolt_rejection_coef
            + ship_velocity.project_onto(heading) * (config.bolt_projection_coef * sign);

        let speed = velocity.magnitude();
        if speed <= 0.0 {
            return None;
        }
        let max_range = speed * config.bolt_max_ttl_ms as f64 / 1000.0;
        let free = ctx.barriers.raycast(nose, velocity.angle(), max_range);
        let ttl_ms = if free >= max_range {
            config.bolt_max_ttl_ms
        } else {
            ((free / speed) * 1000.0) as u64
        };

        let bolt = EntityId::generate();
        ctx.emit(DomainEvent::fired(
            bolt,
            BoltFired {
                owner: self.id,
                x: nose.x(),
                y: nose.y(),
                angle: velocity.angle(),
                speed,
                start_ts: ctx.now,
                ttl_ms,
            },
        ));
        Some(bolt)
    }

    /// Emit the destruction of this ship by `by` and the attacker's reward
    pub fn destroy(&self, by: EntityId, ctx: &mut GameContext) -> bool {
        if !self.spawned {
            return false;
        }
        let at = self.motion.position_at(ctx.now);
        ctx.emit(DomainEvent::action(
            self.id,
            self.action(ActionKind::Destroyed, at, ctx.now, Some(by)),
        ));
        ctx.emit(DomainEvent::score_increased(by, 1, self.id, ctx.now));
        true
    }

    /// Advance a local ship and broadcast its dead-reckoned state
    pub fn fixed_update(&mut self, ctx: &mut GameContext) {
        if !self.spawned || !self.local {
            return;
        }
        let before = self.motion.timestamp();
        if self.motion.update(ctx.now) {
            self.dirty = true;
        }
        if self.motion.timestamp() != before && self.motion.has_moved() {
            self.collide_barriers(ctx);
        }
        // A spawn applied this tick already carries the state for `now`
        if self.dirty && Some(ctx.now) > self.lifecycle_ts {
            let at = self.motion.position();
            ctx.emit(DomainEvent::action(
                self.id,
                self.action(ActionKind::Moved, at, self.motion.timestamp(), None),
            ));
            self.dirty = false;
        }
    }

    /// External impulse (shockwave)
    pub fn nudge(&mut self, impulse: Vector2) {
        if self.spawned && self.local {
            self.motion.nudge(impulse);
            self.dirty = true;
        }
    }

    fn collide_barriers(&mut self, ctx: &GameContext) {
        let from = self.motion.previous_position();
        let to = self.motion.position();
        let travel = to - from;
        if travel.magnitude_sq() == 0.0 {
            return;
        }
        let reach = to + travel.normalize() * (ctx.config.ship_length * ctx.config.ship_sweep_lengths);
        if let Some(hit) = ctx.barriers.first_hit(from, reach) {
            self.motion.reflect(
                hit.point,
                hit.normal,
                ctx.config.ship_body_radius,
                ctx.config.ship_restitution,
            );
            self.dirty = true;
            tracing::trace!("Ship {} bounced off barrier {}", self.id, hit.index);
        }
    }

    // ------------------------------------------------------------------
    // Apply path
    // ------------------------------------------------------------------

    pub(crate) fn apply_joined(&mut self, name: &str, variant: u8, timestamp: u64) -> bool {
        if timestamp < self.join_ts {
            return false;
        }
        if self.name.as_deref() == Some(name) && self.variant == variant {
            return false;
        }
        self.name = Some(name.to_string());
        self.variant = variant;
        self.join_ts = timestamp;
        if !self.spawned {
            self.idle_since = self.idle_since.max(timestamp);
        }
        true
    }

    pub(crate) fn apply_action(&mut self, action: &PlayerAction) -> bool {
        let ts = action.timestamp;
        match action.kind {
            ActionKind::Moved => {
                if Some(ts) <= self.lifecycle_ts || ts <= self.last_move_ts {
                    return false;
                }
                if !self.spawned {
                    // Held until a spawn older than it lands
                    if self.pending_move.map_or(true, |p| ts > p.timestamp) {
                        self.pending_move = Some(*action);
                    }
                    return false;
                }
                self.last_move_ts = ts;
                self.angle = action.angle;
                self.motion.moved(action.x, action.y, action.thrust_angle, action.velocity, ts);
                true
            }
            ActionKind::Spawned => {
                if Some(ts) <= self.lifecycle_ts {
                    return false;
                }
                self.lifecycle_ts = Some(ts);
                self.spawned = true;
                self.ever_spawned = true;
                self.angle = action.angle;
                self.motion.reset(
                    Vector2::cartesian(action.x, action.y),
                    Vector2::polar(action.thrust_angle, action.velocity),
                    ts,
                );
                self.last_move_ts = ts;
                if let Some(pending) = self.pending_move.take() {
                    if pending.timestamp > ts {
                        self.last_move_ts = pending.timestamp;
                        self.angle = pending.angle;
                        self.motion.moved(
                            pending.x,
                            pending.y,
                            pending.thrust_angle,
                            pending.velocity,
                            pending.timestamp,
                        );
                    }
                }
                self.dirty = false;
                true
            }
            ActionKind::Destroyed => {
                if Some(ts) <= self.lifecycle_ts {
                    return false;
                }
                self.lifecycle_ts = Some(ts);
                if self.pending_move.is_some_and(|p| p.timestamp <= ts) {
                    self.pending_move = None;
                }
                self.spawned = false;
                self.ever_spawned = true;
                self.idle_since = ts;
                self.dirty = false;
                true
            }
        }
    }

    pub(crate) fn bolt_materialized(&mut self) {
        self.live_bolts += 1;
    }

    pub(crate) fn bolt_removed(&mut self) {
        self.live_bolts = self.live_bolts.saturating_sub(1);
    }
}
