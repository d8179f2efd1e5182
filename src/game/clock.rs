//! Simulation clock
//!
//! Monotonic `Instant` progression anchored once to wall-clock time at
//! startup. Nodes share the wall-clock anchor (NTP-level agreement), which is
//! what lets the scheduler place recurring world events in the same bucket on
//! every node, while the monotonic part keeps the tick timeline from jumping
//! backwards if the system clock is adjusted.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy)]
pub struct GameClock {
    origin: Instant,
    wall_offset_ms: u64,
}

impl GameClock {
    /// Anchor to the current wall-clock time
    pub fn start() -> Self {
        let wall_offset_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::with_offset(wall_offset_ms)
    }

    /// Anchor to an explicit epoch offset
    pub fn with_offset(wall_offset_ms: u64) -> Self {
        Self {
            origin: Instant::now(),
            wall_offset_ms,
        }
    }

    /// Milliseconds since the UNIX epoch, never decreasing
    pub fn now_ms(&self) -> u64 {
        self.wall_offset_ms + self.origin.elapsed().as_millis() as u64
    }

    pub fn wall_offset_ms(&self) -> u64 {
        self.wall_offset_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_monotonic_from_offset() {
        let clock = GameClock::with_offset(1_000);
        let a = clock.now_ms();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.now_ms();
        assert!(a >= 1_000);
        assert!(b >= a);
    }

    #[test]
    fn test_start_uses_wall_clock() {
        let clock = GameClock::start();
        // anything after 2020-01-01
        assert!(clock.wall_offset_ms() > 1_577_836_800_000);
    }
}
