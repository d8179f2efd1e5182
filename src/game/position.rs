//! Dead-reckoning position/velocity tracker
//!
//! Each ship and projectile owns exactly one `PositionVector`. It is advanced
//! by the owner's fixed update and overwritten by replicated "moved"/"spawned"
//! events, always last-write-wins by timestamp: any input carrying a timestamp
//! that is not strictly newer than the current one is ignored.

use serde::{Deserialize, Serialize};

use crate::util::vec2::Vector2;

/// Below this cosine a reflection is treated as grazing and the ship is pushed
/// straight out along the normal instead of along its new heading.
const GRAZING_COS: f64 = 0.2;

/// What happens when a position leaves the [0, 1] world square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryPolicy {
    /// Leave the position where it is (callers detect out-of-bounds themselves)
    Ignore,
    /// Pin to the edge
    Clamp,
    /// Mirror the offending axis back inside and invert that velocity axis
    Bounce,
}

/// Static motion parameters, fixed per entity kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    pub boundary: BoundaryPolicy,
    pub max_speed: Option<f64>,
    /// Exponential decay per millisecond; values >= 0 mean no dampening
    pub dampening: f64,
    /// Per-axis movement below this is discarded
    pub min_resolution: f64,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            boundary: BoundaryPolicy::Ignore,
            max_speed: None,
            dampening: 0.0,
            min_resolution: crate::game::constants::tick::MIN_RESOLUTION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionVector {
    position: Vector2,
    previous_position: Vector2,
    velocity: Vector2,
    previous_velocity: Vector2,
    timestamp: u64,
    previous_timestamp: u64,
    params: MotionParams,
}

impl PositionVector {
    pub fn new(position: Vector2, velocity: Vector2, timestamp: u64, params: MotionParams) -> Self {
        Self {
            position,
            previous_position: position,
            velocity,
            previous_velocity: velocity,
            timestamp,
            previous_timestamp: timestamp,
            params,
        }
    }

    #[inline]
    pub fn position(&self) -> Vector2 {
        self.position
    }

    #[inline]
    pub fn previous_position(&self) -> Vector2 {
        self.previous_position
    }

    #[inline]
    pub fn velocity(&self) -> Vector2 {
        self.velocity
    }

    #[inline]
    pub fn previous_velocity(&self) -> Vector2 {
        self.previous_velocity
    }

    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[inline]
    pub fn previous_timestamp(&self) -> u64 {
        self.previous_timestamp
    }

    pub fn params(&self) -> &MotionParams {
        &self.params
    }

    /// Whether the position moved during the last advance
    pub fn has_moved(&self) -> bool {
        self.position != self.previous_position
    }

    pub fn is_out_of_bounds(&self) -> bool {
        let (x, y) = self.position.to_cartesian();
        !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y)
    }

    /// Extrapolate the current sample to `timestamp` (which may lie in the past)
    pub fn position_at(&self, timestamp: u64) -> Vector2 {
        let dt = (timestamp as f64 - self.timestamp as f64) / 1000.0;
        self.position + self.velocity * dt
    }

    /// Advance to `timestamp`. Returns whether position or velocity changed.
    pub fn update(&mut self, timestamp: u64) -> bool {
        if timestamp <= self.timestamp {
            return false;
        }
        let dt_ms = (timestamp - self.timestamp) as f64;
        let min_res = self.params.min_resolution;

        let mut velocity = self.velocity;
        if self.params.dampening < 0.0 && velocity.magnitude() > 0.0 {
            let magnitude = velocity.magnitude() * (self.params.dampening * dt_ms).exp();
            velocity = if magnitude < min_res {
                Vector2::ZERO
            } else {
                velocity.with_magnitude(magnitude)
            };
        }

        let dt = dt_ms / 1000.0;
        let mut dx = velocity.x() * dt;
        let mut dy = velocity.y() * dt;
        if dx.abs() < min_res {
            dx = 0.0;
        }
        if dy.abs() < min_res {
            dy = 0.0;
        }

        let moved = if dx == 0.0 && dy == 0.0 {
            self.position
        } else {
            Vector2::cartesian(self.position.x() + dx, self.position.y() + dy)
        };
        let (position, velocity) = self.apply_boundary(moved, velocity);

        self.previous_position = self.position;
        self.previous_velocity = self.velocity;
        self.previous_timestamp = self.timestamp;
        self.position = position;
        self.velocity = velocity;
        self.timestamp = timestamp;

        self.position != self.previous_position || self.velocity != self.previous_velocity
    }

    /// Add a player impulse to the velocity (clamped to max speed) and advance.
    /// Returns whether position or velocity changed.
    pub fn move_by(&mut self, dx: f64, dy: f64, timestamp: u64) -> bool {
        let before = self.velocity;
        self.velocity = self.limit_speed(self.velocity + Vector2::cartesian(dx, dy));
        let advanced = self.update(timestamp);
        advanced || self.velocity != before
    }

    /// Add an external impulse without advancing time
    pub fn nudge(&mut self, impulse: Vector2) {
        self.velocity = self.limit_speed(self.velocity + impulse);
    }

    /// Replication entry point: take absolute state if `timestamp` is newer.
    pub fn moved(&mut self, x: f64, y: f64, angle: f64, magnitude: f64, timestamp: u64) -> bool {
        if timestamp <= self.timestamp {
            return false;
        }
        self.previous_position = self.position;
        self.previous_velocity = self.velocity;
        self.previous_timestamp = self.timestamp;
        self.position = Vector2::cartesian(x, y);
        self.velocity = Vector2::polar(angle, magnitude);
        self.timestamp = timestamp;
        true
    }

    /// Teleport, discarding history (respawn)
    pub fn reset(&mut self, position: Vector2, velocity: Vector2, timestamp: u64) {
        self.position = position;
        self.previous_position = position;
        self.velocity = velocity;
        self.previous_velocity = velocity;
        self.timestamp = timestamp;
        self.previous_timestamp = timestamp;
    }

    /// Bounce off a barrier hit at `point` with surface `normal`.
    ///
    /// The velocity is mirrored across the normal and scaled by `dampen`; the
    /// position is moved to `body_radius` clear of the barrier line, travelling
    /// along the new heading.
    pub fn reflect(&mut self, point: Vector2, normal: Vector2, body_radius: f64, dampen: f64) {
        let mut n = normal.normalize();
        let approach = self.velocity.dot(n);
        let facing_away = if approach == 0.0 {
            (self.previous_position - point).dot(n) < 0.0
        } else {
            approach > 0.0
        };
        if facing_away {
            n = -n;
        }

        let reflected = self.velocity.reflect(n) * dampen;
        let heading = reflected.normalize();
        let along = heading.dot(n);
        let snapped = if along > GRAZING_COS {
            point + heading * (body_radius / along)
        } else {
            point + n * body_radius
        };

        let (position, velocity) = self.apply_boundary(snapped, reflected);
        self.position = position;
        self.velocity = velocity;
    }

    fn limit_speed(&self, velocity: Vector2) -> Vector2 {
        match self.params.max_speed {
            Some(max) => velocity.clamp_magnitude(max),
            None => velocity,
        }
    }

    fn apply_boundary(&self, position: Vector2, velocity: Vector2) -> (Vector2, Vector2) {
        match self.params.boundary {
            BoundaryPolicy::Ignore => (position, velocity),
            BoundaryPolicy::Clamp => {
                let (x, y) = (position.x().clamp(0.0, 1.0), position.y().clamp(0.0, 1.0));
                if x == position.x() && y == position.y() {
                    (position, velocity)
                } else {
                    (Vector2::cartesian(x, y), velocity)
                }
            }
            BoundaryPolicy::Bounce => {
                let (x, vx) = bounce_axis(position.x(), velocity.x());
                let (y, vy) = bounce_axis(position.y(), velocity.y());
                if x == position.x() && y == position.y() {
                    (position, velocity)
                } else {
                    (Vector2::cartesian(x, y), Vector2::cartesian(vx, vy))
                }
            }
        }
    }
}

fn bounce_axis(p: f64, v: f64) -> (f64, f64) {
    if p < 0.0 {
        ((-p).min(1.0), v.abs())
    } else if p > 1.0 {
        ((2.0 - p).max(0.0), -v.abs())
    } else {
        (p, v)
    }
}
