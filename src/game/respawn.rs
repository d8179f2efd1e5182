//! Where ships (re)appear

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::RespawnMode;
use crate::game::constants::ship::RESPAWN_MARGIN;
use crate::util::vec2::Vector2;

pub trait RespawnPolicy: Send {
    fn next_position(&mut self) -> Vector2;
}

/// Always the same point
#[derive(Debug, Clone, Copy)]
pub struct FixedRespawn {
    point: Vector2,
}

impl FixedRespawn {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            point: Vector2::cartesian(x, y),
        }
    }
}

impl RespawnPolicy for FixedRespawn {
    fn next_position(&mut self) -> Vector2 {
        self.point
    }
}

/// Uniform over the world square minus an edge margin
pub struct RandomRespawn {
    rng: StdRng,
    margin: f64,
}

impl RandomRespawn {
    pub fn new(rng: StdRng) -> Self {
        Self {
            rng,
            margin: RESPAWN_MARGIN,
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl RespawnPolicy for RandomRespawn {
    fn next_position(&mut self) -> Vector2 {
        Vector2::cartesian(
            self.rng.gen_range(self.margin..=1.0 - self.margin),
            self.rng.gen_range(self.margin..=1.0 - self.margin),
        )
    }
}

pub fn from_mode(mode: RespawnMode) -> Box<dyn RespawnPolicy> {
    match mode {
        RespawnMode::Random => Box::new(RandomRespawn::from_entropy()),
        RespawnMode::Fixed { x, y } => Box::new(FixedRespawn::new(x, y)),
    }
}
