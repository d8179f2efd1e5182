use std::str::FromStr;

use crate::game::constants::{barrier, bolt, net, schedule, scoreboard, ship, tick};

/// Where ships reappear after being destroyed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RespawnMode {
    /// Uniformly random point away from the world edge
    Random,
    /// Always the same point
    Fixed { x: f64, y: f64 },
}

impl FromStr for RespawnMode {
    type Err = String;

    /// Accepts `random` or `fixed:x,y`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("random") {
            return Ok(RespawnMode::Random);
        }
        let coords = s
            .strip_prefix("fixed:")
            .ok_or_else(|| format!("unknown respawn policy '{}'", s))?;
        let (x, y) = coords
            .split_once(',')
            .ok_or_else(|| format!("expected fixed:x,y, got '{}'", s))?;
        let x: f64 = x.trim().parse().map_err(|_| format!("bad x in '{}'", s))?;
        let y: f64 = y.trim().parse().map_err(|_| format!("bad y in '{}'", s))?;
        Ok(RespawnMode::Fixed { x, y })
    }
}

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Fixed update period in milliseconds
    pub tick_period_ms: u64,
    /// Seed for obstacle generation and hazard placement (must match on every node)
    pub world_seed: u64,
    /// Per-axis movement threshold below which motion is discarded
    pub min_resolution: f64,

    pub ship_body_radius: f64,
    pub ship_length: f64,
    pub ship_sweep_lengths: f64,
    pub ship_max_speed: f64,
    pub ship_dampening: f64,
    pub ship_max_rotation: f64,
    pub ship_restitution: f64,
    pub max_name_len: usize,
    pub stall_timeout_ms: u64,
    pub expunge_check_interval_ms: u64,
    pub respawn: RespawnMode,

    pub bolt_speed: f64,
    pub bolt_max_ttl_ms: u64,
    pub max_live_bolts: u32,
    pub bolt_collision_radius: f64,
    pub bolt_rejection_coef: f64,
    pub bolt_projection_coef: f64,

    pub barrier_segment_length: f64,
    pub barrier_chains: usize,
    pub barrier_chain_length: usize,
    pub barrier_max_turn: f64,

    pub scoreboard_size: usize,
    pub scoreboard_flush_ms: u64,

    pub scheduler_granularity_ms: u64,
    pub hazard_period_buckets: u64,
    pub shockwave_distance: f64,
    pub shockwave_duration_ms: u64,
    pub shockwave_padding: f64,
    pub shockwave_impulse: f64,

    pub client_batch_size: usize,
    pub client_batch_timeout_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: tick::PERIOD_MS,
            world_seed: 0x5eed_b017,
            min_resolution: tick::MIN_RESOLUTION,

            ship_body_radius: ship::BODY_RADIUS,
            ship_length: ship::LENGTH,
            ship_sweep_lengths: ship::SWEEP_LENGTHS,
            ship_max_speed: ship::MAX_SPEED,
            ship_dampening: ship::DAMPENING,
            ship_max_rotation: ship::MAX_ROTATION_PER_TICK,
            ship_restitution: ship::RESTITUTION,
            max_name_len: ship::MAX_NAME_LEN,
            stall_timeout_ms: ship::STALL_TIMEOUT_MS,
            expunge_check_interval_ms: ship::EXPUNGE_CHECK_INTERVAL_MS,
            respawn: RespawnMode::Random,

            bolt_speed: bolt::SPEED,
            bolt_max_ttl_ms: bolt::MAX_TTL_MS,
            max_live_bolts: bolt::MAX_LIVE_PER_SHIP,
            bolt_collision_radius: bolt::COLLISION_RADIUS,
            bolt_rejection_coef: bolt::REJECTION_COEF,
            bolt_projection_coef: bolt::PROJECTION_COEF,

            barrier_segment_length: barrier::SEGMENT_LENGTH,
            barrier_chains: barrier::CHAIN_COUNT,
            barrier_chain_length: barrier::CHAIN_LENGTH,
            barrier_max_turn: barrier::MAX_TURN,

            scoreboard_size: scoreboard::TOP_N,
            scoreboard_flush_ms: scoreboard::FLUSH_INTERVAL_MS,

            scheduler_granularity_ms: schedule::GRANULARITY_MS,
            hazard_period_buckets: schedule::HAZARD_PERIOD_BUCKETS,
            shockwave_distance: schedule::SHOCKWAVE_DISTANCE,
            shockwave_duration_ms: schedule::SHOCKWAVE_DURATION_MS,
            shockwave_padding: schedule::SHOCKWAVE_PADDING,
            shockwave_impulse: schedule::SHOCKWAVE_IMPULSE,

            client_batch_size: net::CLIENT_BATCH_SIZE,
            client_batch_timeout_ms: net::CLIENT_BATCH_TIMEOUT_MS,
        }
    }
}

/// Parse an env var, warning and keeping the current value when it is malformed
/// or rejected by `accept`.
fn env_override<T: FromStr>(name: &str, target: &mut T, accept: impl Fn(&T) -> bool) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(parsed) if accept(&parsed) => *target = parsed,
        Ok(_) => tracing::warn!("{} '{}' out of range, using default", name, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
    }
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        env_override("TICK_PERIOD_MS", &mut config.tick_period_ms, |v| {
            (5..=1000).contains(v)
        });
        env_override("WORLD_SEED", &mut config.world_seed, |_| true);
        env_override("MAX_LIVE_BOLTS", &mut config.max_live_bolts, |v| *v > 0);
        env_override("STALL_TIMEOUT_MS", &mut config.stall_timeout_ms, |v| *v > 0);
        env_override("SCOREBOARD_SIZE", &mut config.scoreboard_size, |v| {
            (1..=1000).contains(v)
        });
        env_override("SCOREBOARD_FLUSH_MS", &mut config.scoreboard_flush_ms, |v| *v > 0);
        env_override(
            "SCHEDULER_GRANULARITY_MS",
            &mut config.scheduler_granularity_ms,
            |v| *v > 0,
        );
        env_override("CLIENT_BATCH_SIZE", &mut config.client_batch_size, |v| *v > 0);
        env_override(
            "CLIENT_BATCH_TIMEOUT_MS",
            &mut config.client_batch_timeout_ms,
            |_| true,
        );

        if let Ok(policy) = std::env::var("RESPAWN_POLICY") {
            match policy.parse::<RespawnMode>() {
                Ok(mode) => config.respawn = mode,
                Err(e) => tracing::warn!("Invalid RESPAWN_POLICY: {}, using default", e),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_period_ms == 0 {
            return Err("tick_period_ms cannot be 0".to_string());
        }
        if self.scheduler_granularity_ms < self.tick_period_ms {
            return Err("scheduler_granularity_ms must be at least one tick".to_string());
        }
        if self.max_live_bolts == 0 {
            return Err("max_live_bolts must be at least 1".to_string());
        }
        if self.scoreboard_size == 0 {
            return Err("scoreboard_size must be at least 1".to_string());
        }
        if !(self.ship_max_speed > 0.0) || !(self.bolt_speed > 0.0) {
            return Err("speeds must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.ship_restitution) {
            return Err("ship_restitution must be within [0, 1]".to_string());
        }
        if self.client_batch_size == 0 {
            return Err("client_batch_size must be at least 1".to_string());
        }
        if let RespawnMode::Fixed { x, y } = self.respawn {
            if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                return Err("fixed respawn point must lie inside the world".to_string());
            }
        }
        Ok(())
    }

    /// Longest distance a ship can travel in one tick, used as a search margin
    pub fn ship_travel_per_tick(&self) -> f64 {
        self.ship_max_speed * self.tick_period_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.tick_period_ms, 50);
        assert_eq!(config.scoreboard_size, 10);
        assert_eq!(config.respawn, RespawnMode::Random);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = SimConfig::load_or_default();
        assert!(config.tick_period_ms > 0);
    }

    #[test]
    fn test_parse_respawn_mode() {
        assert_eq!("random".parse::<RespawnMode>(), Ok(RespawnMode::Random));
        assert_eq!(
            "fixed:0.25, 0.75".parse::<RespawnMode>(),
            Ok(RespawnMode::Fixed { x: 0.25, y: 0.75 })
        );
        assert!("fixed:0.25".parse::<RespawnMode>().is_err());
        assert!("corner".parse::<RespawnMode>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SimConfig::default();
        config.scheduler_granularity_ms = 10;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.respawn = RespawnMode::Fixed { x: 2.0, y: 0.5 };
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.max_live_bolts = 0;
        assert!(config.validate().is_err());
    }
}
