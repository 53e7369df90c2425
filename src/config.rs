// Configuration File Support
//
// This module provides configuration file parsing for the MasteryHub gateway.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from the XDG config directory:
// ~/.config/masteryhub/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::rate_limit::WindowConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Upstream API configuration
    pub upstream: UpstreamConfig,

    /// Rate limit windows for the upstream API key
    pub rate_limits: RateLimitsConfig,

    /// Response cache configuration
    pub cache: CacheConfig,

    /// Highscore tracking configuration
    pub highscores: HighscoresConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream statistics API
    pub base_url: String,

    /// API key sent with every upstream request.
    /// Overridden by MASTERYHUB_API_KEY; never written back to disk.
    pub api_key: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://na1.api.riotgames.com".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

/// Rate limit windows for the upstream API key.
///
/// Every upstream call is gated by all `application` windows plus all windows
/// of its own method class. Intervals are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitsConfig {
    /// Application-wide windows shared by every upstream call
    pub application: Vec<WindowConfig>,

    /// Per-method windows, keyed by method name (e.g. "summoner")
    pub method: HashMap<String, Vec<WindowConfig>>,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        // Default production key limits
        let application = vec![
            WindowConfig::new(10.0, 3000),
            WindowConfig::new(600.0, 180_000),
        ];

        let mut method = HashMap::new();
        method.insert("summoner".to_string(), vec![WindowConfig::new(1.0, 2000)]);
        method.insert(
            "championMastery".to_string(),
            vec![WindowConfig::new(1.0, 2000)],
        );

        Self {
            application,
            method,
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// How long responses from each method should be cached for (in seconds)
    pub durations_secs: HashMap<String, u64>,

    /// Cache duration for methods without an explicit entry
    pub default_duration_secs: u64,

    /// How often expired entries are swept from memory (in seconds)
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut durations_secs = HashMap::new();
        durations_secs.insert("summoner".to_string(), 3600);
        durations_secs.insert("championMastery".to_string(), 600);

        Self {
            durations_secs,
            default_duration_secs: 600,
            sweep_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    /// Cache TTL for a method, falling back to the default duration
    pub fn duration_for(&self, method: &str) -> std::time::Duration {
        let secs = self
            .durations_secs
            .get(method)
            .copied()
            .unwrap_or(self.default_duration_secs);
        std::time::Duration::from_secs(secs)
    }
}

/// Highscore tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HighscoresConfig {
    /// How many scores should be kept on each list
    pub track: usize,

    /// How many scores should be displayed to readers
    pub display: usize,

    /// Where the highscore snapshot file should be saved
    pub data_path: PathBuf,

    /// How often to save highscores to the snapshot file (in seconds)
    pub save_interval_secs: u64,

    /// Log a message every time an entry's ranking changes
    pub log_rank_changes: bool,

    /// Log a message when a name or score is updated without a rank change
    pub log_value_updates: bool,
}

impl Default for HighscoresConfig {
    fn default() -> Self {
        Self {
            track: 30,
            display: 20,
            data_path: PathBuf::from("highscore_data.json"),
            save_interval_secs: 120,
            log_rank_changes: true,
            log_value_updates: false,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to enable the metrics endpoint
    pub enabled: bool,

    /// Port for the metrics server
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            upstream: UpstreamConfig::default(),
            rate_limits: RateLimitsConfig::default(),
            cache: CacheConfig::default(),
            highscores: HighscoresConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// If the config file does not exist, returns default configuration.
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path, with environment overrides
    /// applied and the result validated
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/masteryhub/config.toml` on Linux/Mac
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "masteryhub", "MasteryHub") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("masteryhub")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - MASTERYHUB_LOG_LEVEL
    /// - MASTERYHUB_LOG_FORMAT
    /// - MASTERYHUB_API_KEY
    /// - MASTERYHUB_UPSTREAM_URL
    /// - MASTERYHUB_DATA_PATH
    /// - MASTERYHUB_SAVE_INTERVAL_SECS
    /// - MASTERYHUB_METRICS_ENABLED
    /// - MASTERYHUB_METRICS_PORT
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("MASTERYHUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("MASTERYHUB_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(key) = std::env::var("MASTERYHUB_API_KEY") {
            self.upstream.api_key = key;
        }
        if let Ok(url) = std::env::var("MASTERYHUB_UPSTREAM_URL") {
            self.upstream.base_url = url;
        }

        if let Ok(path) = std::env::var("MASTERYHUB_DATA_PATH") {
            self.highscores.data_path = PathBuf::from(path);
        }
        if let Ok(interval) = std::env::var("MASTERYHUB_SAVE_INTERVAL_SECS") {
            if let Ok(interval) = interval.parse::<u64>() {
                if interval > 0 {
                    self.highscores.save_interval_secs = interval;
                }
            }
        }

        if let Ok(enabled) = std::env::var("MASTERYHUB_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }
        if let Ok(port) = std::env::var("MASTERYHUB_METRICS_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.metrics.port = port;
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// Limit values are checked here, at load time; the limiter and the
    /// highscore store never re-validate at runtime.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.upstream.base_url.is_empty() {
            anyhow::bail!("Upstream base URL must not be empty");
        }
        if self.upstream.timeout_secs == 0 {
            anyhow::bail!("Upstream timeout must be > 0");
        }

        if self.rate_limits.application.is_empty() {
            anyhow::bail!("At least one application rate limit window is required");
        }
        for window in &self.rate_limits.application {
            window
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid application window: {}", e))?;
        }
        for (method, windows) in &self.rate_limits.method {
            if windows.is_empty() {
                anyhow::bail!("Method '{}' has an empty rate limit window set", method);
            }
            for window in windows {
                window
                    .validate()
                    .map_err(|e| anyhow::anyhow!("Invalid window for method '{}': {}", method, e))?;
            }
        }

        if self.cache.default_duration_secs == 0 {
            anyhow::bail!("Default cache duration must be > 0");
        }
        if self.cache.sweep_interval_secs == 0 {
            anyhow::bail!("Cache sweep interval must be > 0");
        }

        if self.highscores.track == 0 {
            anyhow::bail!("Highscore track count must be > 0");
        }
        if self.highscores.display > self.highscores.track {
            anyhow::bail!(
                "Highscore display count ({}) must be <= track count ({})",
                self.highscores.display,
                self.highscores.track
            );
        }
        if self.highscores.save_interval_secs == 0 {
            anyhow::bail!("Highscore save interval must be > 0");
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            anyhow::bail!("Metrics port must be > 0");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.rate_limits.application.len(), 2);
        assert_eq!(config.highscores.track, 30);
        assert_eq!(config.highscores.display, 20);
        assert_eq!(config.highscores.save_interval_secs, 120);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_default_cache_durations() {
        let config = Config::default();
        assert_eq!(
            config.cache.duration_for("summoner"),
            std::time::Duration::from_secs(3600)
        );
        assert_eq!(
            config.cache.duration_for("championMastery"),
            std::time::Duration::from_secs(600)
        );
        // Unknown methods fall back to the default
        assert_eq!(
            config.cache.duration_for("unknown"),
            std::time::Duration::from_secs(600)
        );
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_application_windows() {
        let mut config = Config::default();
        config.rate_limits.application.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_max_requests() {
        let mut config = Config::default();
        config.rate_limits.application = vec![WindowConfig::new(10.0, 0)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_negative_interval() {
        let mut config = Config::default();
        config
            .rate_limits
            .method
            .insert("summoner".to_string(), vec![WindowConfig::new(-1.0, 10)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_display_exceeds_track() {
        let mut config = Config::default();
        config.highscores.display = 40;
        config.highscores.track = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_save_interval() {
        let mut config = Config::default();
        config.highscores.save_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension(".nonexistent");
        let config = Config::load_from_path(&path);
        assert!(config.is_ok());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[upstream]
base_url = "https://euw1.api.riotgames.com"
timeout_secs = 5

[rate_limits]
application = [
    { interval_secs = 10.0, max_requests = 10 },
    { interval_secs = 600.0, max_requests = 500 },
]

[rate_limits.method]
summoner = [{ interval_secs = 1.0, max_requests = 100 }]

[cache]
default_duration_secs = 120

[cache.durations_secs]
summoner = 1800

[highscores]
track = 50
display = 25
save_interval_secs = 60

[metrics]
enabled = true
port = 8080
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.upstream.base_url, "https://euw1.api.riotgames.com");
        assert_eq!(config.rate_limits.application.len(), 2);
        assert_eq!(config.rate_limits.application[0].max_requests, 10);
        assert_eq!(
            config.cache.duration_for("summoner"),
            std::time::Duration::from_secs(1800)
        );
        assert_eq!(config.highscores.track, 50);
        assert_eq!(config.highscores.display, 25);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 8080);
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging
level = "debug"
"#; // Invalid TOML

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path());
        assert!(config.is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::remove_var("MASTERYHUB_API_KEY");
        std::env::remove_var("MASTERYHUB_SAVE_INTERVAL_SECS");

        std::env::set_var("MASTERYHUB_API_KEY", "RGAPI-test-key");
        std::env::set_var("MASTERYHUB_SAVE_INTERVAL_SECS", "30");

        let config = Config::default().apply_env_overrides();
        assert_eq!(config.upstream.api_key, "RGAPI-test-key");
        assert_eq!(config.highscores.save_interval_secs, 30);

        std::env::remove_var("MASTERYHUB_API_KEY");
        std::env::remove_var("MASTERYHUB_SAVE_INTERVAL_SECS");
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        std::env::remove_var("MASTERYHUB_SAVE_INTERVAL_SECS");
        std::env::set_var("MASTERYHUB_SAVE_INTERVAL_SECS", "0"); // Invalid (must be > 0)

        let config = Config::default().apply_env_overrides();
        assert_eq!(config.highscores.save_interval_secs, 120);

        std::env::remove_var("MASTERYHUB_SAVE_INTERVAL_SECS");
    }

    #[test]
    fn test_config_partial_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[highscores]
track = 100
display = 10
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.highscores.track, 100);
        assert_eq!(config.highscores.display, 10);
        // Other sections keep their defaults
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.rate_limits.application.len(), 2);
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);
    }
}
