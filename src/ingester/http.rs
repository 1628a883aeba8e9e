//! Shared HTTP plumbing for data providers
//!
//! Every provider request goes through [`HttpFetcher`]: a per-request
//! timeout, and exponential backoff with jitter when the provider answers
//! HTTP 429.

use crate::config::SourcesConfig;
use crate::error::{BotError, Result};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const USER_AGENT: &str = concat!("macro-usd-bot/", env!("CARGO_PKG_VERSION"));

/// Upper bound of the random jitter added to each backoff
const MAX_JITTER_MS: u64 = 250;
/// Longest wait before retrying a rate-limited request
pub const MAX_BACKOFF_SECS: f64 = 300.0;

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
    max_retries: u32,
    backoff_secs: f64,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, max_retries: u32, backoff_secs: f64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            max_retries: max_retries.max(1),
            backoff_secs: if backoff_secs.is_nan() { 0.0 } else { backoff_secs.clamp(0.0, MAX_BACKOFF_SECS) },
        })
    }

    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        Self::new(
            config.request_timeout_secs,
            config.max_retries,
            config.retry_backoff_secs,
        )
    }

    /// GET `url` with `query` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut last_wait = 0;

        for attempt in 0..self.max_retries {
            let response = self.http.get(url).query(query).send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = self.backoff(attempt);
                last_wait = wait.as_secs().max(1);
                tracing::warn!(
                    "Rate limited by {} (attempt {}/{}), waiting {:?}",
                    host_of(url),
                    attempt + 1,
                    self.max_retries,
                    wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BotError::Api(format!(
                    "{} returned {}: {}",
                    host_of(url),
                    status,
                    truncate(&body, 200)
                )));
            }

            return Ok(response.json().await?);
        }

        Err(BotError::RateLimited {
            retry_after_secs: last_wait,
        })
    }

    /// `backoff * 2^attempt`, capped at [`MAX_BACKOFF_SECS`], plus jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let base = (self.backoff_secs * 2f64.powi(attempt.min(16) as i32)).min(MAX_BACKOFF_SECS);
        let jitter = rand::rng().random_range(0..=MAX_JITTER_MS);
        Duration::from_secs_f64(base) + Duration::from_millis(jitter)
    }
}

fn host_of(url: &str) -> &str {
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or(url)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Parse a provider number, tolerating blanks and FRED's "." placeholder
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
