//! FRED (St. Louis Fed) series observations
//!
//! FRED has no consensus data, so observations carry `actual` and
//! `previous` only and score against the prior release.

use super::http::{parse_number, HttpFetcher};
use super::IndicatorSource;
use crate::error::Result;
use crate::scoring::IndicatorObservation;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;

const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Indicator code -> (series id, FRED `units` transformation)
///
/// `chg` = change from prior period, `pch` = percent change from prior
/// period, `pc1` = percent change from a year ago, `lin` = level.
const SERIES: &[(&str, &str, &str)] = &[
    ("NFP", "PAYEMS", "chg"),
    ("UNEMPLOYMENT", "UNRATE", "lin"),
    ("AHE", "CES0500000003", "pch"),
    ("CPI", "CPIAUCSL", "pc1"),
    ("CORE_CPI", "CPILFESL", "pc1"),
    ("PCE", "PCEPI", "pc1"),
    ("CORE_PCE", "PCEPILFE", "pc1"),
    ("CLAIMS", "ICSA", "lin"),
    ("RETAIL_SALES", "RSAFS", "chg"),
];

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

pub struct FredSource {
    fetcher: HttpFetcher,
    api_key: String,
    base_url: String,
}

impl FredSource {
    pub fn new(fetcher: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            base_url: FRED_BASE_URL.to_string(),
        }
    }

    pub fn series_for(indicator: &str) -> Option<(&'static str, &'static str)> {
        SERIES
            .iter()
            .find(|(code, _, _)| *code == indicator)
            .map(|(_, series, units)| (*series, *units))
    }

    async fn fetch_one(&self, indicator: &str) -> Result<Option<IndicatorObservation>> {
        let Some((series_id, units)) = Self::series_for(indicator) else {
            return Ok(None);
        };

        let url = format!("{}/series/observations", self.base_url);
        let query = [
            ("series_id", series_id.to_string()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
            ("sort_order", "desc".to_string()),
            ("units", units.to_string()),
            ("limit", "5".to_string()),
        ];

        let response: ObservationsResponse = self.fetcher.get_json(&url, &query).await?;
        Ok(parse_observations(indicator, &response.observations))
    }
}

/// Newest valid value becomes `actual`, the one before it `previous`
fn parse_observations(indicator: &str, observations: &[FredObservation]) -> Option<IndicatorObservation> {
    let mut valid = observations
        .iter()
        .filter_map(|o| parse_number(&o.value).map(|v| (o, v)));

    let (latest, actual) = valid.next()?;
    let mut obs = IndicatorObservation::new(indicator)
        .with_actual(actual)
        .with_source("FRED");
    if let Some((_, previous)) = valid.next() {
        obs = obs.with_previous(previous);
    }
    if let Ok(period) = NaiveDate::parse_from_str(&latest.date, "%Y-%m-%d") {
        obs = obs.with_period(period);
    }
    Some(obs)
}

#[async_trait]
impl IndicatorSource for FredSource {
    fn name(&self) -> &str {
        "FRED"
    }

    async fn fetch(&self, indicators: &[String]) -> Result<HashMap<String, IndicatorObservation>> {
        let wanted: Vec<&String> = indicators
            .iter()
            .filter(|name| Self::series_for(name).is_some())
            .collect();

        let results = join_all(wanted.iter().map(|name| self.fetch_one(name))).await;

        let mut out = HashMap::new();
        for (name, result) in wanted.into_iter().zip(results) {
            match result {
                Ok(Some(obs)) => {
                    out.insert(name.clone(), obs);
                }
                Ok(None) => tracing::debug!("[FRED] No usable observations for {}", name),
                Err(e) => tracing::warn!("[FRED] Failed to fetch {}: {}", name, e),
            }
        }
        Ok(out)
    }
}
