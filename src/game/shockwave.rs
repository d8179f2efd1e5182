//! Shockwave hazard
//!
//! An expanding ring that pushes ships outward as its front passes them. The
//! radius follows `distance * (1 - (elapsed / duration - 1)^2)`: it grows to
//! `distance` at `duration`, then recedes until `duration * padding`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SimConfig;
use crate::game::constants::ship::RESPAWN_MARGIN;
use crate::game::context::GameContext;
use crate::game::physics_queue::PhysicsAction;
use crate::game::scheduler::{Producer, SchedulerWindow};
use crate::game::ships::Ships;
use crate::net::protocol::ServerMessage;
use crate::util::vec2::Vector2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShockwaveParams {
    pub distance: f64,
    pub duration_ms: u64,
    pub padding: f64,
    pub impulse: f64,
}

impl ShockwaveParams {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            distance: config.shockwave_distance,
            duration_ms: config.shockwave_duration_ms.max(1),
            padding: config.shockwave_padding,
            impulse: config.shockwave_impulse,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Shockwave {
    center: Vector2,
    start_ts: u64,
    params: ShockwaveParams,
    /// Radius at the previous step; the front sweeps [last, current]
    last_radius: f64,
    announced: bool,
}

impl Shockwave {
    pub fn new(center: Vector2, start_ts: u64, params: ShockwaveParams) -> Self {
        Self {
            center,
            start_ts,
            params,
            last_radius: 0.0,
            announced: false,
        }
    }

    pub fn center(&self) -> Vector2 {
        self.center
    }

    pub fn radius_at(&self, now: u64) -> f64 {
        let elapsed = now.saturating_sub(self.start_ts) as f64;
        let progress = elapsed / self.params.duration_ms as f64 - 1.0;
        (self.params.distance * (1.0 - progress * progress)).max(0.0)
    }

    pub fn is_finished(&self, now: u64) -> bool {
        now.saturating_sub(self.start_ts) as f64 > self.params.duration_ms as f64 * self.params.padding
    }

    /// One tick of the wave. Returns whether it wants another.
    pub fn step(&mut self, ships: &mut Ships, ctx: &mut GameContext, now: u64) -> bool {
        if !self.announced {
            self.announced = true;
            ctx.outbox.broadcast(ServerMessage::Shockwave {
                x: self.center.x(),
                y: self.center.y(),
                distance: self.params.distance,
                duration_ms: self.params.duration_ms,
                start_ts: self.start_ts,
            });
        }
        if self.is_finished(now) {
            tracing::debug!("Shockwave at ({:.3}, {:.3}) finished", self.center.x(), self.center.y());
            return false;
        }

        let radius = self.radius_at(now);
        let inner = self.last_radius.min(radius);
        let outer = self.last_radius.max(radius);
        self.last_radius = radius;
        if outer <= inner {
            return true;
        }

        let (cx, cy) = self.center.to_cartesian();
        for id in ships.search(cx - outer, cy - outer, cx + outer, cy + outer, 0.0) {
            let Some(ship) = ships.get_mut(&id) else {
                continue;
            };
            if !ship.is_local() || !ship.is_spawned() {
                continue;
            }
            let offset = ship.motion().position() - self.center;
            let distance = offset.magnitude();
            if distance < inner || distance > outer {
                continue;
            }
            let direction = if distance > 0.0 {
                offset.normalize()
            } else {
                Vector2::from_angle(0.0)
            };
            ship.nudge(direction * self.params.impulse);
        }
        true
    }

    pub fn into_action(mut self) -> PhysicsAction {
        Box::new(move |ships: &mut Ships, ctx: &mut GameContext, now: u64| self.step(ships, ctx, now))
    }
}

/// Scheduled producer spawning a shockwave every `hazard_period_buckets`.
/// Placement is seeded by `world_seed ^ bucket`, so every node picks the
/// same spot.
pub fn hazard_producer(config: &SimConfig) -> Producer {
    let period = config.hazard_period_buckets.max(1);
    let seed = config.world_seed;
    let params = ShockwaveParams::from_config(config);
    Box::new(move |window: &SchedulerWindow| {
        if window.bucket % period != 0 {
            return None;
        }
        let mut rng = StdRng::seed_from_u64(seed ^ window.bucket);
        let center = Vector2::cartesian(
            rng.gen_range(RESPAWN_MARGIN..=1.0 - RESPAWN_MARGIN),
            rng.gen_range(RESPAWN_MARGIN..=1.0 - RESPAWN_MARGIN),
        );
        tracing::info!(
            "Shockwave at ({:.3}, {:.3}) for bucket {}",
            center.x(),
            center.y(),
            window.bucket
        );
        Some(Shockwave::new(center, window.start, params).into_action())
    })
}
