//! Window Configuration and Sliding-Window State
//!
//! A window permits at most `max_requests` admissions within any trailing
//! span of `interval_secs`. State is a log of admission instants on the
//! monotonic clock; backwards wall-clock adjustments cannot widen capacity.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// A single rate limit window loaded from configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WindowConfig {
    /// Length of the trailing interval, in seconds
    pub interval_secs: f64,

    /// Maximum admissions within any trailing interval
    pub max_requests: u32,
}

impl WindowConfig {
    /// Create a new window configuration
    pub fn new(interval_secs: f64, max_requests: u32) -> Self {
        Self {
            interval_secs,
            max_requests,
        }
    }

    /// Check that the window values are usable.
    ///
    /// Called once at configuration load; invalid windows never reach the
    /// limiter.
    pub fn validate(&self) -> Result<(), String> {
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(format!("interval must be positive, got {}", self.interval_secs));
        }
        if self.max_requests == 0 {
            return Err("max_requests must be > 0".to_string());
        }
        Ok(())
    }

    /// The interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }
}

/// Runtime state for one window: the admission log
#[derive(Debug)]
pub(crate) struct WindowState {
    interval: Duration,
    max_requests: usize,
    /// Admission instants, oldest first
    log: VecDeque<Instant>,
}

impl WindowState {
    pub(crate) fn new(config: &WindowConfig) -> Self {
        Self {
            interval: config.interval(),
            max_requests: config.max_requests as usize,
            log: VecDeque::with_capacity(config.max_requests.min(4096) as usize),
        }
    }

    /// Drop admissions that have aged out of the trailing interval
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.log.front() {
            if now.duration_since(oldest) >= self.interval {
                self.log.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether a request is admissible on this window right now
    pub(crate) fn has_capacity(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.log.len() < self.max_requests
    }

    /// Record an admission. Caller must have checked capacity under the same
    /// critical section.
    pub(crate) fn record(&mut self, now: Instant) {
        self.log.push_back(now);
    }

    /// How long until the oldest admission ages out and frees a slot.
    ///
    /// Only meaningful when the window is full; returns zero for a window
    /// with capacity.
    pub(crate) fn next_release(&self, now: Instant) -> Duration {
        match self.log.front() {
            Some(&oldest) => (oldest + self.interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    #[cfg(test)]
    pub(crate) fn admitted(&self) -> usize {
        self.log.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_config_validate() {
        assert!(WindowConfig::new(10.0, 5).validate().is_ok());
        assert!(WindowConfig::new(0.0, 5).validate().is_err());
        assert!(WindowConfig::new(-3.0, 5).validate().is_err());
        assert!(WindowConfig::new(10.0, 0).validate().is_err());
        assert!(WindowConfig::new(f64::NAN, 5).validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_capacity_and_prune() {
        let config = WindowConfig::new(10.0, 2);
        let mut state = WindowState::new(&config);

        let now = Instant::now();
        assert!(state.has_capacity(now));
        state.record(now);
        assert!(state.has_capacity(now));
        state.record(now);
        assert!(!state.has_capacity(now));

        // One interval later both admissions have aged out
        tokio::time::advance(Duration::from_secs(10)).await;
        let later = Instant::now();
        assert!(state.has_capacity(later));
        assert_eq!(state.admitted(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_release_tracks_oldest() {
        let config = WindowConfig::new(10.0, 1);
        let mut state = WindowState::new(&config);

        let now = Instant::now();
        state.record(now);

        tokio::time::advance(Duration::from_secs(4)).await;
        let release = state.next_release(Instant::now());
        assert_eq!(release, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sliding_window_no_boundary_burst() {
        // Admissions in any trailing interval never exceed the maximum,
        // including spans straddling the points where old admissions expire.
        let config = WindowConfig::new(10.0, 3);
        let mut state = WindowState::new(&config);

        for _ in 0..3 {
            let now = Instant::now();
            assert!(state.has_capacity(now));
            state.record(now);
            tokio::time::advance(Duration::from_secs(3)).await;
        }

        // t = 9s: the first admission (t = 0) has not aged out yet
        assert!(!state.has_capacity(Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        // t = 10s: the first admission ages out, one slot frees
        assert!(state.has_capacity(Instant::now()));
        assert_eq!(state.admitted(), 2);
    }
}
