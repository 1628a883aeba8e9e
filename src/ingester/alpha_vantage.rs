//! Alpha Vantage economic indicator endpoints
//!
//! Free tier allows a handful of calls per minute, so requests are issued
//! one after another rather than concurrently.

use super::http::{parse_number, HttpFetcher};
use super::IndicatorSource;
use crate::error::{BotError, Result};
use crate::scoring::IndicatorObservation;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;

const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

/// How a published series is turned into the indicator's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Value as published
    Level,
    /// Difference to the prior period (payroll levels -> monthly change)
    Change,
    /// Percent change against twelve periods back (CPI index -> YoY inflation)
    YearOverYear,
}

const FUNCTIONS: &[(&str, &str, Transform)] = &[
    ("NFP", "NONFARM_PAYROLL", Transform::Change),
    ("UNEMPLOYMENT", "UNEMPLOYMENT", Transform::Level),
    ("CPI", "CPI", Transform::YearOverYear),
    ("RETAIL_SALES", "RETAIL_SALES", Transform::Change),
];

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    #[serde(default)]
    data: Vec<SeriesPoint>,
    /// Present when the call quota is exhausted
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesPoint {
    date: String,
    value: String,
}

pub struct AlphaVantageSource {
    fetcher: HttpFetcher,
    api_key: String,
}

impl AlphaVantageSource {
    pub fn new(fetcher: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
        }
    }

    pub fn function_for(indicator: &str) -> Option<(&'static str, Transform)> {
        FUNCTIONS
            .iter()
            .find(|(code, _, _)| *code == indicator)
            .map(|(_, function, transform)| (*function, *transform))
    }

    async fn fetch_one(&self, indicator: &str) -> Result<Option<IndicatorObservation>> {
        let Some((function, transform)) = Self::function_for(indicator) else {
            return Ok(None);
        };

        let query = [
            ("function", function.to_string()),
            ("apikey", self.api_key.clone()),
            ("datatype", "json".to_string()),
        ];
        let response: SeriesResponse = self.fetcher.get_json(ALPHA_VANTAGE_URL, &query).await?;

        if let Some(message) = response.error_message {
            return Err(BotError::Api(format!("Alpha Vantage: {}", message)));
        }
        if let Some(message) = response.note.or(response.information) {
            tracing::warn!("[AlphaVantage] {}", message);
            return Err(BotError::RateLimited { retry_after_secs: 60 });
        }

        Ok(build_observation(indicator, &response.data, transform))
    }
}

/// Points arrive newest first
fn build_observation(indicator: &str, points: &[SeriesPoint], transform: Transform) -> Option<IndicatorObservation> {
    let dated: Vec<(&str, f64)> = points
        .iter()
        .filter_map(|p| parse_number(&p.value).map(|v| (p.date.as_str(), v)))
        .collect();
    let values: Vec<f64> = dated.iter().map(|(_, v)| *v).collect();

    let at = |offset: usize| -> Option<f64> {
        match transform {
            Transform::Level => values.get(offset).copied(),
            Transform::Change => Some(values.get(offset)? - values.get(offset + 1)?),
            Transform::YearOverYear => {
                let now = values.get(offset)?;
                let year_ago = values.get(offset + 12)?;
                if *year_ago == 0.0 {
                    None
                } else {
                    Some((now / year_ago - 1.0) * 100.0)
                }
            }
        }
    };

    let actual = at(0)?;
    let mut obs = IndicatorObservation::new(indicator)
        .with_actual(actual)
        .with_source("AlphaVantage");
    if let Some(previous) = at(1) {
        obs = obs.with_previous(previous);
    }
    if let Some(period) = dated
        .first()
        .and_then(|(date, _)| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
    {
        obs = obs.with_period(period);
    }
    Some(obs)
}

#[async_trait]
impl IndicatorSource for AlphaVantageSource {
    fn name(&self) -> &str {
        "AlphaVantage"
    }

    async fn fetch(&self, indicators: &[String]) -> Result<HashMap<String, IndicatorObservation>> {
        let mut out = HashMap::new();

        for name in indicators {
            if Self::function_for(name).is_none() {
                continue;
            }
            match self.fetch_one(name).await {
                Ok(Some(obs)) => {
                    out.insert(name.clone(), obs);
                }
                Ok(None) => tracing::debug!("[AlphaVantage] No usable data for {}", name),
                Err(BotError::RateLimited { .. }) => {
                    tracing::warn!("[AlphaVantage] Quota exhausted, skipping remaining indicators");
                    break;
                }
                Err(e) => tracing::warn!("[AlphaVantage] Failed to fetch {}: {}", name, e),
            }
        }

        Ok(out)
    }
}
