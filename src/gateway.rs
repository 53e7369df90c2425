//! Gateway Facade
//!
//! Thin composition point over the rate limiter, the response cache, and the
//! highscore store. Callers ask for summoners and mastery standings; the
//! facade routes every request through the cache, gates each actual upstream
//! call behind the limiter, and feeds score-bearing responses into the
//! highscore boards. It holds no state of its own.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::ResponseCache;
use crate::config::{CacheConfig, Config};
use crate::error::{Error, Result};
use crate::highscores::HighscoreStore;
use crate::rate_limit::RateLimiter;
use crate::upstream::{ChampionMastery, Summoner, UpstreamClient};

/// Method name for summoner lookups (rate limit class and cache TTL key)
pub const METHOD_SUMMONER: &str = "summoner";

/// Method name for champion mastery lookups
pub const METHOD_CHAMPION_MASTERY: &str = "championMastery";

/// Highscore category for total points across all champions
pub const CATEGORY_TOTAL: &str = "total";

/// Cooldown applied when an upstream 429 carries no Retry-After header
const FALLBACK_COOLDOWN: Duration = Duration::from_secs(1);

/// Everything a lookup resolves for one summoner
#[derive(Debug, Clone)]
pub struct MasteryLookup {
    pub summoner: Summoner,
    pub masteries: Vec<ChampionMastery>,
    pub total_points: i64,
}

/// Composition of the gateway core
pub struct Gateway {
    limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    highscores: Arc<HighscoreStore>,
    upstream: Arc<dyn UpstreamClient>,
    cache_config: CacheConfig,
}

impl Gateway {
    /// Wire the core together. The only failure mode is invalid rate limit
    /// configuration.
    pub fn new(
        config: &Config,
        upstream: Arc<dyn UpstreamClient>,
        highscores: Arc<HighscoreStore>,
    ) -> Result<Self> {
        Ok(Self {
            limiter: Arc::new(RateLimiter::new(&config.rate_limits)?),
            cache: Arc::new(ResponseCache::new()),
            highscores,
            upstream,
            cache_config: config.cache.clone(),
        })
    }

    /// Resolve one endpoint through the cache, fetching behind the limiter
    /// on a miss.
    ///
    /// An upstream-reported rate limit applies a cooldown to the method's
    /// classes and then surfaces to the caller; retrying is the caller's
    /// decision, a blind retry here could itself violate the upstream limit.
    async fn fetch(&self, method: &'static str, cache_key: String, endpoint: String) -> Result<Value> {
        let ttl = self.cache_config.duration_for(method);
        let limiter = Arc::clone(&self.limiter);
        let upstream = Arc::clone(&self.upstream);

        self.cache
            .get(method, &cache_key, ttl, move || async move {
                limiter.acquire(method).await;
                match upstream.call(&endpoint, &[]).await {
                    Err(Error::UpstreamRateLimited { retry_after }) => {
                        limiter
                            .apply_cooldown(method, retry_after.unwrap_or(FALLBACK_COOLDOWN));
                        Err(Error::UpstreamRateLimited { retry_after })
                    }
                    other => other,
                }
            })
            .await
    }

    /// Look up a summoner by display name
    pub async fn summoner_by_name(&self, name: &str) -> Result<Summoner> {
        let standardized = standardize_name(name);
        let value = self
            .fetch(
                METHOD_SUMMONER,
                format!("summoner:{}", standardized),
                format!("lol/summoner/v4/summoners/by-name/{}", standardized),
            )
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Decode(format!("malformed summoner payload: {}", e)))
    }

    /// Fetch a summoner's mastery standings and feed them into the
    /// highscore boards.
    ///
    /// Board bookkeeping is best-effort relative to this request: the caller
    /// gets the masteries even if no board changed.
    pub async fn masteries_for(&self, summoner: &Summoner) -> Result<Vec<ChampionMastery>> {
        let value = self
            .fetch(
                METHOD_CHAMPION_MASTERY,
                format!("championMastery:{}", summoner.id),
                format!(
                    "lol/champion-mastery/v4/champion-masteries/by-summoner/{}",
                    summoner.id
                ),
            )
            .await?;
        let masteries: Vec<ChampionMastery> = serde_json::from_value(value)
            .map_err(|e| Error::Decode(format!("malformed mastery payload: {}", e)))?;

        let mut total_points = 0i64;
        for mastery in &masteries {
            total_points += mastery.champion_points;
            self.highscores
                .update(
                    &mastery.champion_id.to_string(),
                    &summoner.id,
                    &summoner.name,
                    mastery.champion_points,
                )
                .await;
        }
        self.highscores
            .update(CATEGORY_TOTAL, &summoner.id, &summoner.name, total_points)
            .await;

        debug!(
            summoner = %summoner.name,
            champions = masteries.len(),
            total_points,
            "mastery standings resolved"
        );
        Ok(masteries)
    }

    /// Full lookup: summoner by name, then their mastery standings
    pub async fn lookup(&self, name: &str) -> Result<MasteryLookup> {
        let summoner = self.summoner_by_name(name).await?;
        let masteries = self.masteries_for(&summoner).await?;
        let total_points = masteries.iter().map(|m| m.champion_points).sum();
        Ok(MasteryLookup {
            summoner,
            masteries,
            total_points,
        })
    }

    /// The highscore store this gateway feeds
    pub fn highscores(&self) -> &Arc<HighscoreStore> {
        &self.highscores
    }

    /// The response cache, exposed for the periodic sweep
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }
}

/// Names differing only in case or spacing are the same summoner upstream
fn standardize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highscores::{HighscoreStore, NullNotifier};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::time::Instant;

    /// Upstream stub serving canned responses and counting calls
    struct MockUpstream {
        responses: Mutex<HashMap<String, Result<Value>>>,
        calls: AtomicUsize,
    }

    impl MockUpstream {
        fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn respond(&self, endpoint: &str, value: Value) {
            self.responses
                .lock()
                .unwrap()
                .insert(endpoint.to_string(), Ok(value));
        }

        fn fail(&self, endpoint: &str, error: Error) {
            self.responses
                .lock()
                .unwrap()
                .insert(endpoint.to_string(), Err(error));
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UpstreamClient for MockUpstream {
        async fn call(&self, endpoint: &str, _params: &[(&str, &str)]) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .get(endpoint)
                .cloned()
                .unwrap_or(Err(Error::NotFound))
        }
    }

    fn test_setup(dir: &TempDir) -> (Config, Arc<MockUpstream>, Arc<HighscoreStore>) {
        let mut config = Config::default();
        config.highscores.data_path = dir.path().join("highscore_data.json");
        let upstream = Arc::new(MockUpstream::new());
        let highscores = Arc::new(HighscoreStore::new(
            &config.highscores,
            Arc::new(NullNotifier),
        ));
        (config, upstream, highscores)
    }

    fn seed_summoner(upstream: &MockUpstream) {
        upstream.respond(
            "lol/summoner/v4/summoners/by-name/bestplayer",
            json!({"id": "enc-1", "name": "Best Player"}),
        );
        upstream.respond(
            "lol/champion-mastery/v4/champion-masteries/by-summoner/enc-1",
            json!([
                {"championId": 266, "championPoints": 500_000},
                {"championId": 103, "championPoints": 250_000}
            ]),
        );
    }

    #[tokio::test]
    async fn test_lookup_resolves_and_feeds_highscores() {
        let dir = TempDir::new().unwrap();
        let (config, upstream, highscores) = test_setup(&dir);
        seed_summoner(&upstream);
        let gateway =
            Gateway::new(&config, upstream.clone() as Arc<dyn UpstreamClient>, highscores).unwrap();

        let lookup = gateway.lookup("Best Player").await.unwrap();
        assert_eq!(lookup.summoner.id, "enc-1");
        assert_eq!(lookup.masteries.len(), 2);
        assert_eq!(lookup.total_points, 750_000);

        // One board per champion plus the total board
        let top = gateway.highscores().display("266").await;
        assert_eq!(top[0].display_name, "Best Player");
        assert_eq!(top[0].score, 500_000);
        let total = gateway.highscores().display(CATEGORY_TOTAL).await;
        assert_eq!(total[0].score, 750_000);
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let (config, upstream, highscores) = test_setup(&dir);
        seed_summoner(&upstream);
        let gateway =
            Gateway::new(&config, upstream.clone() as Arc<dyn UpstreamClient>, highscores).unwrap();

        gateway.lookup("BestPlayer").await.unwrap();
        assert_eq!(upstream.call_count(), 2);

        // Same summoner, different spacing and case: both endpoints cached
        gateway.lookup("best player").await.unwrap();
        assert_eq!(upstream.call_count(), 2);
    }

    #[tokio::test]
    async fn test_not_found_propagates_cleanly() {
        let dir = TempDir::new().unwrap();
        let (config, upstream, highscores) = test_setup(&dir);
        let gateway =
            Gateway::new(&config, upstream.clone() as Arc<dyn UpstreamClient>, highscores).unwrap();

        let result = gateway.lookup("nobody").await;
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let (config, upstream, highscores) = test_setup(&dir);
        upstream.fail(
            "lol/summoner/v4/summoners/by-name/bestplayer",
            Error::Upstream("502 Bad Gateway".to_string()),
        );
        let gateway =
            Gateway::new(&config, upstream.clone() as Arc<dyn UpstreamClient>, highscores).unwrap();

        assert!(gateway.lookup("BestPlayer").await.is_err());

        // The upstream recovers; the next lookup retries instead of serving
        // the failure from the cache.
        seed_summoner(&upstream);
        assert!(gateway.lookup("BestPlayer").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_rate_limit_applies_cooldown() {
        let dir = TempDir::new().unwrap();
        let (config, upstream, highscores) = test_setup(&dir);
        upstream.fail(
            "lol/summoner/v4/summoners/by-name/bestplayer",
            Error::UpstreamRateLimited {
                retry_after: Some(Duration::from_secs(8)),
            },
        );
        let gateway =
            Gateway::new(&config, upstream.clone() as Arc<dyn UpstreamClient>, highscores).unwrap();

        let result = gateway.summoner_by_name("BestPlayer").await;
        assert!(matches!(
            result,
            Err(Error::UpstreamRateLimited { .. })
        ));

        // The caller's retry waits out the cooldown before hitting upstream.
        seed_summoner(&upstream);
        let start = Instant::now();
        gateway.summoner_by_name("BestPlayer").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_repeat_lookup_leaves_boards_unchanged() {
        let dir = TempDir::new().unwrap();
        let (config, upstream, highscores) = test_setup(&dir);
        seed_summoner(&upstream);
        let gateway = Gateway::new(
            &config,
            upstream.clone() as Arc<dyn UpstreamClient>,
            Arc::clone(&highscores),
        )
        .unwrap();

        gateway.lookup("BestPlayer").await.unwrap();
        let before = highscores.snapshot().await.boards;
        gateway.lookup("BestPlayer").await.unwrap();
        let after = highscores.snapshot().await.boards;
        assert_eq!(before, after);
    }
}
