//! Tick budget monitoring
//!
//! Tracks how long each simulation tick takes against the fixed period and
//! provides signals for:
//! - Admission control (refuse new ships while the node is overloaded)
//! - Session diagnostics (periodic status lines, over-budget warnings)

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples needed before the status moves off its initial value
const MIN_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceStatus {
    /// Plenty of headroom
    Excellent,
    /// Normal operation
    Good,
    /// Close to the budget, stop admitting ships
    Warning,
    /// At or over the budget
    Critical,
}

impl PerformanceStatus {
    pub fn can_accept_ships(&self) -> bool {
        matches!(self, PerformanceStatus::Excellent | PerformanceStatus::Good)
    }

    pub fn is_over_budget(&self) -> bool {
        matches!(self, PerformanceStatus::Critical)
    }
}

pub struct PerformanceMonitor {
    /// Most recent tick costs, oldest first
    window: VecDeque<Duration>,
    /// Sum of `window`
    window_total: Duration,
    max_samples: usize,
    budget: Duration,
    /// Fractions of the budget separating the status levels
    excellent_threshold: f32,
    warning_threshold: f32,
    critical_threshold: f32,
    status: PerformanceStatus,
    tick_start: Option<Instant>,
    last_entity_count: usize,
    over_budget_ticks: u64,
}

impl PerformanceMonitor {
    pub fn new(tick_period_ms: u64) -> Self {
        let budget = Duration::from_millis(tick_period_ms.max(1));
        // ~5 seconds of history
        let max_samples = (5_000 / tick_period_ms.max(1)).clamp(20, 600) as usize;
        Self {
            window: VecDeque::with_capacity(max_samples),
            window_total: Duration::ZERO,
            max_samples,
            budget,
            excellent_threshold: 0.3,
            warning_threshold: 0.7,
            critical_threshold: 1.0,
            status: PerformanceStatus::Excellent,
            tick_start: None,
            last_entity_count: 0,
            over_budget_ticks: 0,
        }
    }

    pub fn tick_start(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// Record the tick begun by `tick_start`; returns its duration
    pub fn tick_end(&mut self, entity_count: usize) -> Option<Duration> {
        let duration = self.tick_start.take()?.elapsed();
        self.record_tick(duration);
        self.last_entity_count = entity_count;
        Some(duration)
    }

    fn record_tick(&mut self, duration: Duration) {
        if duration > self.budget {
            self.over_budget_ticks += 1;
        }
        self.window.push_back(duration);
        self.window_total += duration;
        if self.window.len() > self.max_samples {
            if let Some(oldest) = self.window.pop_front() {
                self.window_total -= oldest;
            }
        }
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        if self.window.len() < MIN_SAMPLES {
            return;
        }
        let ratio = self.budget_usage_percent() / 100.0;
        self.status = if ratio < self.excellent_threshold {
            PerformanceStatus::Excellent
        } else if ratio < self.warning_threshold {
            PerformanceStatus::Good
        } else if ratio < self.critical_threshold {
            PerformanceStatus::Warning
        } else {
            PerformanceStatus::Critical
        };
    }

    pub fn average_tick_duration(&self) -> Duration {
        match self.window.len() {
            0 => Duration::ZERO,
            n => self.window_total / n as u32,
        }
    }

    pub fn p95_tick_duration(&self) -> Duration {
        let mut samples: Vec<Duration> = self.window.iter().copied().collect();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        let rank = (samples.len() * 95 / 100).min(samples.len() - 1);
        *samples.select_nth_unstable(rank).1
    }

    pub fn status(&self) -> PerformanceStatus {
        self.status
    }

    /// Average tick cost as a percentage of the period (may exceed 100)
    pub fn budget_usage_percent(&self) -> f32 {
        self.average_tick_duration().as_secs_f32() / self.budget.as_secs_f32() * 100.0
    }

    pub fn can_accept_ships(&self) -> bool {
        self.status.can_accept_ships()
    }

    /// Ticks that ran longer than the period since startup
    pub fn over_budget_ticks(&self) -> u64 {
        self.over_budget_ticks
    }

    pub fn last_entity_count(&self) -> usize {
        self.last_entity_count
    }

    pub fn status_message(&self) -> String {
        format!(
            "{:?} - {:.1}% budget (p95 {:?}), {} entities",
            self.status,
            self.budget_usage_percent(),
            self.p95_tick_duration(),
            self.last_entity_count
        )
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(crate::game::constants::tick::PERIOD_MS)
    }
}
