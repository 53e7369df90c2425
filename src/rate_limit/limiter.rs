//! Composite Rate Limiter
//!
//! Admits a call only when every window of the application class and of the
//! call's method class simultaneously has capacity. Admission decisions and
//! log recording happen while all affected window locks are held, taken in a
//! fixed global order (application windows first, then method windows in
//! declaration order), so two racing callers can never both observe the last
//! slot and overshoot a limit.
//!
//! Callers with no capacity suspend until the earliest full window frees a
//! slot and then re-check; nothing is reserved while waiting, so withdrawing
//! from a wait needs no bookkeeping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::RateLimitsConfig;
use crate::error::{Error, Result};
use crate::metrics;

use super::window::{WindowConfig, WindowState};

/// Windows plus cooldown state for one call class
struct ClassState {
    name: String,
    windows: Vec<Mutex<WindowState>>,
    /// Admissions are suspended until this instant after an upstream 429
    cooldown_until: Mutex<Option<Instant>>,
}

impl ClassState {
    fn new(name: &str, configs: &[WindowConfig]) -> Result<Self> {
        if configs.is_empty() {
            return Err(Error::Configuration(format!(
                "call class '{}' has no rate limit windows",
                name
            )));
        }
        for config in configs {
            config.validate().map_err(|e| {
                Error::Configuration(format!("call class '{}': {}", name, e))
            })?;
        }
        Ok(Self {
            name: name.to_string(),
            windows: configs
                .iter()
                .map(|c| Mutex::new(WindowState::new(c)))
                .collect(),
            cooldown_until: Mutex::new(None),
        })
    }

    fn cooldown_remaining(&self, now: Instant) -> Duration {
        match *self.cooldown_until.lock().unwrap() {
            Some(until) if until > now => until - now,
            _ => Duration::ZERO,
        }
    }

    fn extend_cooldown(&self, until: Instant) {
        let mut cooldown = self.cooldown_until.lock().unwrap();
        match *cooldown {
            Some(existing) if existing >= until => {}
            _ => *cooldown = Some(until),
        }
    }
}

/// Composite rate limiter for one upstream API key.
///
/// Every call names a method; the call is gated by all application windows
/// plus all windows of that method, if the method has any configured.
pub struct RateLimiter {
    application: ClassState,
    methods: HashMap<String, ClassState>,
}

impl RateLimiter {
    /// Build a limiter from validated configuration.
    ///
    /// Returns `Error::Configuration` for empty window sets or unusable
    /// window values; this is the only failure the limiter can ever produce.
    pub fn new(config: &RateLimitsConfig) -> Result<Self> {
        let application = ClassState::new("application", &config.application)?;
        let mut methods = HashMap::new();
        for (name, windows) in &config.method {
            methods.insert(name.clone(), ClassState::new(name, windows)?);
        }
        Ok(Self {
            application,
            methods,
        })
    }

    /// Suspend until the call is admitted on every relevant window.
    ///
    /// Never fails and never drops a request. A method with no configured
    /// windows is gated by the application class alone. Cancelling the
    /// returned future while waiting has no effect on other callers.
    pub async fn acquire(&self, method: &str) {
        let started = Instant::now();

        loop {
            // An upstream-reported cooldown takes precedence over local
            // window capacity.
            let now = Instant::now();
            let mut cooldown = self.application.cooldown_remaining(now);
            if let Some(class) = self.methods.get(method) {
                cooldown = cooldown.max(class.cooldown_remaining(now));
            }
            if cooldown > Duration::ZERO {
                debug!(method, wait_secs = cooldown.as_secs_f64(), "waiting out upstream cooldown");
                sleep(cooldown).await;
                continue;
            }

            match self.try_admit(method) {
                Ok(()) => {
                    let waited = started.elapsed();
                    if waited > Duration::ZERO {
                        debug!(method, waited_secs = waited.as_secs_f64(), "admitted after wait");
                    }
                    metrics::RATE_LIMIT_WAIT_SECONDS
                        .with_label_values(&[method])
                        .observe(waited.as_secs_f64());
                    return;
                }
                Err(wait) => {
                    // Capacity may be consumed by a racing caller while we
                    // sleep; the loop re-checks from scratch.
                    sleep(wait).await;
                }
            }
        }
    }

    /// Single atomic admission attempt across all affected windows.
    ///
    /// On success the admission is recorded in every window. On failure
    /// returns how long until the earliest full window frees a slot.
    fn try_admit(&self, method: &str) -> std::result::Result<(), Duration> {
        // Fixed global lock order: application windows, then method windows.
        let mut guards = Vec::with_capacity(self.application.windows.len() + 2);
        for window in &self.application.windows {
            guards.push(window.lock().unwrap());
        }
        if let Some(class) = self.methods.get(method) {
            for window in &class.windows {
                guards.push(window.lock().unwrap());
            }
        }

        let now = Instant::now();
        let mut earliest_release: Option<Duration> = None;
        for guard in guards.iter_mut() {
            if !guard.has_capacity(now) {
                let release = guard.next_release(now);
                earliest_release = Some(match earliest_release {
                    Some(current) => current.min(release),
                    None => release,
                });
            }
        }

        match earliest_release {
            None => {
                for guard in guards.iter_mut() {
                    guard.record(now);
                }
                Ok(())
            }
            // A full window with an empty log cannot happen; guard against a
            // zero sleep spinning regardless.
            Some(release) => Err(release.max(Duration::from_millis(1))),
        }
    }

    /// Apply a cooldown after the upstream reported its own rate limit.
    ///
    /// Suspends further admissions for the method's class and the application
    /// class until `retry_after` has passed. The local windows stay untouched;
    /// they are a predictive guard, not a record of what the upstream saw.
    pub fn apply_cooldown(&self, method: &str, retry_after: Duration) {
        let until = Instant::now() + retry_after;
        warn!(
            method,
            retry_after_secs = retry_after.as_secs_f64(),
            "upstream rate limit hit, applying cooldown"
        );
        self.application.extend_cooldown(until);
        if let Some(class) = self.methods.get(method) {
            class.extend_cooldown(until);
        }
        metrics::UPSTREAM_COOLDOWNS_TOTAL
            .with_label_values(&[method])
            .inc();
    }

    /// Names of all configured method classes
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.values().map(|c| c.name.as_str()).collect()
    }
}
