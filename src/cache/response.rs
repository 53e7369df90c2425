//! Single-Flight Response Cache
//!
//! One slot per cache key. A slot is either a stored value with its fetch
//! time, or a handle to a fetch already in flight that late arrivals can
//! attach to. TTLs are supplied by the caller per request (they come from
//! per-method configuration, not from the entry), expiry is evaluated lazily
//! on read, and a periodic sweep drops entries whose own TTL has passed so
//! keys that are never re-requested do not pin memory.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::Result;
use crate::metrics;

type FetchResult = Result<Value>;
type SlotMap = Arc<Mutex<HashMap<String, Slot>>>;

/// One cache slot
enum Slot {
    /// A completed fetch
    Ready {
        value: Value,
        stored_at: Instant,
        /// TTL the fetching caller supplied; used by the sweep
        ttl: Duration,
    },
    /// A fetch in flight; waiters attach to the receiver
    InFlight(watch::Receiver<Option<FetchResult>>),
}

/// Keyed response cache with single-flight fetch de-duplication
pub struct ResponseCache {
    slots: SlotMap,
}

impl ResponseCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve `key`, fetching on a miss.
    ///
    /// A live entry (younger than `ttl`) is returned with no upstream call.
    /// On a miss, the first caller spawns `fetch` as a task and every caller
    /// for the key awaits its outcome; a failed fetch is propagated to all of
    /// them and nothing is stored, so the next caller retries fresh.
    ///
    /// `method` is only a label for logging and metrics.
    pub async fn get<F, Fut>(&self, method: &str, key: &str, ttl: Duration, fetch: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let mut rx = {
            let mut slots = self.slots.lock().unwrap();
            match slots.get(key) {
                Some(Slot::Ready {
                    value, stored_at, ..
                }) if stored_at.elapsed() < ttl => {
                    trace!(method, key, "cache hit");
                    metrics::CACHE_HITS_TOTAL.with_label_values(&[method]).inc();
                    return Ok(value.clone());
                }
                Some(Slot::InFlight(rx)) => {
                    trace!(method, key, "joining in-flight fetch");
                    rx.clone()
                }
                _ => {
                    // Miss, or a stale entry about to be replaced.
                    debug!(method, key, "cache miss, fetching");
                    metrics::CACHE_MISSES_TOTAL
                        .with_label_values(&[method])
                        .inc();
                    let (tx, rx) = watch::channel(None);
                    slots.insert(key.to_string(), Slot::InFlight(rx.clone()));
                    spawn_fetch(Arc::clone(&self.slots), key.to_string(), ttl, tx, fetch());
                    rx
                }
            }
        };

        // The fetch task always publishes before dropping the sender, so the
        // channel cannot close without a value.
        let outcome = rx.wait_for(|outcome| outcome.is_some()).await;
        match outcome {
            Ok(outcome) => (*outcome).clone().unwrap(),
            Err(_) => unreachable!("single-flight fetch task dropped without publishing"),
        }
    }

    /// Drop stored entries whose own TTL has passed.
    ///
    /// In-flight fetches are left alone. Returns how many entries were
    /// removed.
    pub fn sweep_expired(&self) -> usize {
        let mut slots = self.slots.lock().unwrap();
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Ready { stored_at, ttl, .. } => stored_at.elapsed() < *ttl,
            Slot::InFlight(_) => true,
        });
        let removed = before - slots.len();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    /// Number of slots currently held (stored or in flight)
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Whether the cache holds no slots at all
    pub fn is_empty(&self) -> bool {
        self.slots.lock().unwrap().is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a fetch to completion independent of the initiating caller.
///
/// The task owns a handle to the slot map alone, so it keeps running even if
/// every caller that was waiting on it has been cancelled.
fn spawn_fetch(
    slots: SlotMap,
    key: String,
    ttl: Duration,
    tx: watch::Sender<Option<FetchResult>>,
    fut: impl Future<Output = FetchResult> + Send + 'static,
) {
    tokio::spawn(async move {
        let result = fut.await;
        {
            let mut slots = slots.lock().unwrap();
            match &result {
                Ok(value) => {
                    slots.insert(
                        key,
                        Slot::Ready {
                            value: value.clone(),
                            stored_at: Instant::now(),
                            ttl,
                        },
                    );
                }
                // Failures are not cached; drop the in-flight marker.
                Err(_) => {
                    slots.remove(&key);
                }
            }
        }
        let _ = tx.send(Some(result));
    });
}
