//! Configuration management

use crate::error::{BotError, Result};
use crate::ingester::http::MAX_BACKOFF_SECS;
use crate::scoring::{IndicatorOverride, IndicatorTable};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Per-indicator overrides of the built-in scoring table
    #[serde(default)]
    pub indicators: HashMap<String, IndicatorOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token
    #[serde(default)]
    pub bot_token: String,
    /// Chat that receives scheduled readings
    pub chat_id: Option<String>,
    /// Long-poll timeout for getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub fred_api_key: Option<String>,
    pub alpha_vantage_api_key: Option<String>,
    /// Falls back to the public guest key when unset
    pub trading_economics_api_key: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff on HTTP 429
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: f64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Minutes after a prediction at which DXY is measured
    #[serde(default = "default_horizons")]
    pub horizons_mins: Vec<u32>,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Window used by /hitrate
    #[serde(default = "default_metrics_days")]
    pub metrics_days: i64,
}

fn default_true() -> bool {
    true
}
fn default_poll_timeout() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff() -> f64 {
    1.0
}
fn default_cache_ttl() -> i64 {
    60
}
fn default_db_path() -> String {
    "macro_bot.db".to_string()
}
fn default_horizons() -> Vec<u32> {
    vec![30, 60, 120]
}
fn default_retention_days() -> i64 {
    90
}
fn default_metrics_days() -> i64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: None,
            poll_timeout_secs: default_poll_timeout(),
            enabled: true,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            fred_api_key: None,
            alpha_vantage_api_key: None,
            trading_economics_api_key: None,
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_secs: default_retry_backoff(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            horizons_mins: default_horizons(),
            retention_days: default_retention_days(),
            metrics_days: default_metrics_days(),
        }
    }
}

impl TelegramConfig {
    /// Telegram is usable only with a token and the switch on
    pub fn is_active(&self) -> bool {
        self.enabled && !self.bot_token.trim().is_empty()
    }
}

impl TrackerConfig {
    /// Horizons sorted, deduplicated, zero dropped
    pub fn horizons(&self) -> Vec<u32> {
        let mut horizons: Vec<u32> = self.horizons_mins.iter().copied().filter(|h| *h > 0).collect();
        horizons.sort_unstable();
        horizons.dedup();
        horizons
    }
}

impl Config {
    /// Load configuration from file, then `MACRO_BOT__*` environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| BotError::Config(format!("Non UTF-8 config path: {}", path.display())))?;

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .add_source(
                config::Environment::with_prefix("MACRO_BOT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations, or environment only when no file exists
    pub fn load_default() -> Result<Self> {
        let paths = ["config.toml", "~/.config/macro-usd-bot/config.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        tracing::info!("No configuration file found, using defaults and environment");
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("MACRO_BOT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Built-in indicator table with the configured overrides applied
    pub fn indicator_table(&self) -> Result<IndicatorTable> {
        IndicatorTable::default().with_overrides(&self.indicators)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracker.horizons().is_empty() {
            return Err(BotError::Config("tracker.horizons_mins must contain a positive value".into()));
        }
        if self.tracker.retention_days <= 0 || self.tracker.metrics_days <= 0 {
            return Err(BotError::Config("tracker day windows must be positive".into()));
        }
        let backoff = self.sources.retry_backoff_secs;
        if !backoff.is_finite() || !(0.0..=MAX_BACKOFF_SECS).contains(&backoff) {
            return Err(BotError::Config(format!(
                "sources.retry_backoff_secs must be between 0 and {}",
                MAX_BACKOFF_SECS
            )));
        }
        self.indicator_table()?;
        Ok(())
    }
}
