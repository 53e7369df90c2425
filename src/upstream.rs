//! Upstream API Client
//!
//! The seam between the gateway core and the rate-limited statistics API.
//! The core only depends on the [`UpstreamClient`] trait; the HTTP
//! implementation below targets the original API's shape (API key header,
//! JSON bodies, 429s carrying a Retry-After) and tests substitute mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::metrics;

/// Header carrying the API key, as the upstream expects it
const API_KEY_HEADER: &str = "X-Riot-Token";

/// Calls the upstream statistics API.
///
/// Rate-limit rejections and missing entities are distinct from other
/// failures so the gateway can apply a cooldown or pass a clean not-found
/// through without logging it as an error.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Perform one call. `endpoint` is a path below the base URL and
    /// `params` are query parameters.
    async fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value>;
}

/// A summoner as the upstream returns it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summoner {
    /// Stable encrypted identifier
    pub id: String,

    /// Current display name
    pub name: String,
}

/// One champion's mastery standing for a summoner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChampionMastery {
    pub champion_id: i64,
    pub champion_points: i64,
}

/// `reqwest`-backed upstream client
pub struct HttpUpstream {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpUpstream {
    /// Build a client from configuration
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(params)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("request to {} failed: {}", endpoint, e)))?;

        let status = response.status();
        metrics::UPSTREAM_CALLS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::UpstreamRateLimited {
                retry_after: parse_retry_after(&response),
            });
        }
        if !status.is_success() {
            warn!(endpoint, %status, "upstream returned an error status");
            return Err(Error::Upstream(format!(
                "{} returned {}",
                endpoint, status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Decode(format!("invalid JSON from {}: {}", endpoint, e)))
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
