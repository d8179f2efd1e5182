//! Default tuning values. Every runtime knob lives in `SimConfig`, which is
//! built from these.
//!
//! World coordinates span [0, 1] on both axes, timestamps are milliseconds
//! and speeds are world units per second.

/// Simulation cadence
pub mod tick {
    /// Fixed update period in milliseconds
    pub const PERIOD_MS: u64 = 50;
    /// Movement below this on an axis is discarded (prevents numerical creep)
    pub const MIN_RESOLUTION: f64 = 1e-7;
}

/// Ship handling
pub mod ship {
    /// Collision body radius
    pub const BODY_RADIUS: f64 = 0.012;
    /// Nose-to-tail length, used to extend the obstacle sweep
    pub const LENGTH: f64 = 0.024;
    /// Multiples of ship length the obstacle sweep extends ahead of the ship
    pub const SWEEP_LENGTHS: f64 = 1.5;
    /// Top speed
    pub const MAX_SPEED: f64 = 0.35;
    /// Exponential decay per millisecond (negative = drag)
    pub const DAMPENING: f64 = -0.0015;
    /// Largest heading change a single move may apply (radians)
    pub const MAX_ROTATION_PER_TICK: f64 = 0.35;
    /// Velocity kept after bouncing off a barrier
    pub const RESTITUTION: f64 = 0.6;
    /// Display name length limit (characters)
    pub const MAX_NAME_LEN: usize = 24;
    /// Number of visual variants clients know about
    pub const VARIANT_COUNT: u8 = 8;
    /// Unspawned/unjoined ships older than this are expunged
    pub const STALL_TIMEOUT_MS: u64 = 30_000;
    /// How often the stall check runs
    pub const EXPUNGE_CHECK_INTERVAL_MS: u64 = 1_000;
    /// Keep respawns away from the world edge
    pub const RESPAWN_MARGIN: f64 = 0.05;
}

/// Projectile handling
pub mod bolt {
    /// Muzzle speed before ship inertia is blended in
    pub const SPEED: f64 = 0.5;
    /// Upper bound on lifetime
    pub const MAX_TTL_MS: u64 = 3_000;
    /// Live projectiles a single ship may have
    pub const MAX_LIVE_PER_SHIP: u32 = 5;
    /// Hit distance between projectile and ship centers
    pub const COLLISION_RADIUS: f64 = 0.012;
    /// Share of the ship's sideways velocity carried into the projectile
    pub const REJECTION_COEF: f64 = 0.5;
    /// Share of the ship's forward velocity carried into the projectile
    pub const PROJECTION_COEF: f64 = 0.9;
    /// Recently exhausted ids remembered for duplicate suppression
    pub const TOMBSTONE_CAPACITY: usize = 4096;
}

/// Obstacle generation
pub mod barrier {
    pub const SEGMENT_LENGTH: f64 = 0.05;
    pub const CHAIN_COUNT: usize = 10;
    pub const CHAIN_LENGTH: usize = 6;
    /// Largest bend between consecutive segments of a chain (radians)
    pub const MAX_TURN: f64 = 0.6;
    /// Chains start at least this far from the world edge
    pub const EDGE_MARGIN: f64 = 0.1;
    /// Spatial index cell size
    pub const GRID_CELL_SIZE: f64 = 0.1;
}

/// Ship spatial index
pub mod spatial {
    pub const SHIP_GRID_CELL_SIZE: f64 = 0.05;
}

/// Leaderboard
pub mod scoreboard {
    pub const TOP_N: usize = 10;
    pub const FLUSH_INTERVAL_MS: u64 = 1_000;
}

/// Timer wheel and world hazards
pub mod schedule {
    /// Width of one scheduling bucket
    pub const GRANULARITY_MS: u64 = 250;
    /// A shockwave spawns every this many buckets (30 s at 250 ms)
    pub const HAZARD_PERIOD_BUCKETS: u64 = 120;
    /// Shockwave peak radius
    pub const SHOCKWAVE_DISTANCE: f64 = 0.2;
    /// Time to reach peak radius
    pub const SHOCKWAVE_DURATION_MS: u64 = 1_500;
    /// Wave keeps running until duration * padding
    pub const SHOCKWAVE_PADDING: f64 = 1.25;
    /// Outward velocity impulse applied when the front passes a ship
    pub const SHOCKWAVE_IMPULSE: f64 = 0.15;
}

/// Client fan-out
pub mod net {
    pub const CLIENT_BATCH_SIZE: usize = 64;
    pub const CLIENT_BATCH_TIMEOUT_MS: u64 = 25;
    /// Departed ship ids remembered for duplicate suppression
    pub const DEPARTED_CAPACITY: usize = 1024;
}
