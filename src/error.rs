//! Error Types
//!
//! Domain errors shared by the rate limiter, response cache, highscore store,
//! and the gateway facade. Errors are `Clone` because a single-flight fetch
//! failure is fanned out to every caller waiting on the same cache key.

use std::sync::Arc;
use std::time::Duration;

/// Errors surfaced by the gateway core
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid configuration. Fatal at startup, never produced at runtime.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The upstream API rejected or failed the request (non-rate-limit).
    /// Not retried automatically; retry policy belongs to the caller.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The upstream API reported its own rate limit (429-class).
    /// The local limiter applies a cooldown before the next acquire.
    #[error("upstream rate limit exceeded")]
    UpstreamRateLimited {
        /// Back-off interval reported by the upstream, if any
        retry_after: Option<Duration>,
    },

    /// The requested entity does not exist upstream (404-class).
    /// An expected outcome for lookups by name, never logged as an error.
    #[error("not found upstream")]
    NotFound,

    /// Reading or writing the highscore snapshot failed.
    /// Logged and retried on the next save tick, never fatal.
    #[error("persistence error: {0}")]
    Persistence(#[from] Arc<std::io::Error>),

    /// A malformed payload came back from the upstream API.
    #[error("unexpected upstream payload: {0}")]
    Decode(String),
}

impl Error {
    /// Wrap an I/O error for persistence failures
    pub fn persistence(err: std::io::Error) -> Self {
        Error::Persistence(Arc::new(err))
    }

    /// Whether this error is the upstream's own rate-limit signal
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::UpstreamRateLimited { .. })
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
