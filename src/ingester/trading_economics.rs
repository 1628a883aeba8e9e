//! TradingEconomics economic calendar
//!
//! The only configured provider with market forecasts, so it is queried
//! first and is the source of `consensus` values.

use super::http::HttpFetcher;
use super::IndicatorSource;
use crate::error::Result;
use crate::scoring::{canonical_indicator_name, IndicatorObservation};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TE_BASE_URL: &str = "https://api.tradingeconomics.com";
/// Public key with limited access, used when none is configured
pub const GUEST_KEY: &str = "guest:guest";
/// How far back the calendar is searched for the latest release
const LOOKBACK_DAYS: i64 = 45;

/// One calendar row as returned by the API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarEntry {
    #[serde(rename = "Date")]
    pub date: Option<String>,
    #[serde(rename = "Country", default)]
    pub country: String,
    #[serde(rename = "Event", default)]
    pub event: String,
    #[serde(rename = "Actual")]
    pub actual: Option<String>,
    #[serde(rename = "Forecast")]
    pub forecast: Option<String>,
    #[serde(rename = "Previous")]
    pub previous: Option<String>,
    #[serde(rename = "Importance")]
    pub importance: Option<i64>,
}

impl CalendarEntry {
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let raw = self.date.as_deref()?;
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
    }

    pub fn to_observation(&self) -> IndicatorObservation {
        let mut obs = IndicatorObservation::new(canonical_indicator_name(&self.event))
            .with_source("TradingEconomics");
        obs.actual = self.actual.as_deref().and_then(parse_calendar_value);
        obs.consensus = self.forecast.as_deref().and_then(parse_calendar_value);
        obs.previous = self.previous.as_deref().and_then(parse_calendar_value);
        obs.period = self.timestamp().map(|ts| ts.date());
        obs
    }
}

/// Parse calendar figures such as `"272K"`, `"4.0%"`, `"$-5.2B"`, `"-0.1%"`.
///
/// Magnitude suffixes are applied so that actual, forecast and previous of
/// one row are always in the same unit.
pub fn parse_calendar_value(raw: &str) -> Option<f64> {
    let mut s = raw.trim().replace(['$', ',', ' '], "");
    if s.is_empty() {
        return None;
    }
    if s.ends_with('%') {
        s.pop();
    }

    let multiplier = match s.chars().last()? {
        'K' | 'k' => 1e3,
        'M' | 'm' => 1e6,
        'B' | 'b' => 1e9,
        'T' | 't' => 1e12,
        _ => 1.0,
    };
    if multiplier != 1.0 {
        s.pop();
    }

    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v * multiplier)
}

/// Latest row per indicator: released rows beat pending ones, then newer beats older
fn latest_per_indicator(entries: &[CalendarEntry]) -> HashMap<String, IndicatorObservation> {
    let mut best: HashMap<String, (bool, Option<NaiveDateTime>, IndicatorObservation)> = HashMap::new();

    for entry in entries {
        let obs = entry.to_observation();
        let released = obs.actual.is_some();
        let ts = entry.timestamp();

        let replace = match best.get(&obs.name) {
            None => true,
            Some((best_released, best_ts, _)) => (released, ts) > (*best_released, *best_ts),
        };
        if replace {
            best.insert(obs.name.clone(), (released, ts, obs));
        }
    }

    best.into_iter().map(|(name, (_, _, obs))| (name, obs)).collect()
}

pub struct TradingEconomicsSource {
    fetcher: HttpFetcher,
    api_key: String,
    base_url: String,
}

impl TradingEconomicsSource {
    pub fn new(fetcher: HttpFetcher, api_key: Option<String>) -> Self {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| GUEST_KEY.to_string());
        Self {
            fetcher,
            api_key,
            base_url: TE_BASE_URL.to_string(),
        }
    }

    pub fn uses_guest_key(&self) -> bool {
        self.api_key == GUEST_KEY
    }

    /// US calendar rows between `from` and `to` (inclusive)
    pub async fn calendar(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<CalendarEntry>> {
        let url = format!(
            "{}/calendar/country/united%20states/{}/{}",
            self.base_url,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );
        let query = [("c", self.api_key.clone()), ("f", "json".to_string())];
        self.fetcher.get_json(&url, &query).await
    }
}

#[async_trait]
impl IndicatorSource for TradingEconomicsSource {
    fn name(&self) -> &str {
        "TradingEconomics"
    }

    async fn fetch(&self, indicators: &[String]) -> Result<HashMap<String, IndicatorObservation>> {
        let today = Utc::now().date_naive();
        let entries = self
            .calendar(today - Duration::days(LOOKBACK_DAYS), today + Duration::days(1))
            .await?;
        tracing::debug!("[TradingEconomics] {} calendar rows", entries.len());

        let mut latest = latest_per_indicator(&entries);
        Ok(indicators
            .iter()
            .filter_map(|name| latest.remove(name).map(|obs| (name.clone(), obs)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: &str, event: &str, actual: Option<&str>, forecast: &str, previous: &str) -> CalendarEntry {
        CalendarEntry {
            date: Some(date.to_string()),
            country: "United States".to_string(),
            event: event.to_string(),
            actual: actual.map(str::to_string),
            forecast: Some(forecast.to_string()),
            previous: Some(previous.to_string()),
            importance: Some(3),
        }
    }

    #[test]
    fn test_parse_calendar_value() {
        assert_eq!(parse_calendar_value("272K"), Some(272_000.0));
        assert_eq!(parse_calendar_value("4.0%"), Some(4.0));
        assert_eq!(parse_calendar_value("-0.1%"), Some(-0.1));
        assert_eq!(parse_calendar_value("$-5.2B"), Some(-5.2e9));
        assert_eq!(parse_calendar_value("1,234.5"), Some(1234.5));
        assert_eq!(parse_calendar_value(""), None);
        assert_eq!(parse_calendar_value("n/a"), None);
    }

    #[test]
    fn test_entry_to_observation() {
        let row = entry("2024-06-07T12:30:00", "Non Farm Payrolls", Some("272K"), "185K", "165K");
        let obs = row.to_observation();

        assert_eq!(obs.name, "NFP");
        assert_eq!(obs.actual, Some(272_000.0));
        assert_eq!(obs.consensus, Some(185_000.0));
        assert_eq!(obs.previous, Some(165_000.0));
        assert_eq!(obs.period, NaiveDate::from_ymd_opt(2024, 6, 7));
        assert_eq!(obs.source, "TradingEconomics");
    }

    #[test]
    fn test_latest_released_row_wins() {
        let rows = vec![
            entry("2024-05-03T12:30:00", "Non Farm Payrolls", Some("175K"), "243K", "315K"),
            entry("2024-06-07T12:30:00", "Non Farm Payrolls", Some("272K"), "185K", "165K"),
            entry("2024-07-05T12:30:00", "Non Farm Payrolls", None, "190K", "272K"),
            entry("2024-06-07T12:30:00", "Unemployment Rate", Some("4.0%"), "3.9%", "3.9%"),
        ];

        let latest = latest_per_indicator(&rows);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest["NFP"].actual, Some(272_000.0));
        assert_eq!(latest["UNEMPLOYMENT"].consensus, Some(3.9));
    }

    #[test]
    fn test_cpi_index_level_never_scored_as_rate() {
        let index = entry("2024-06-12T12:30:00", "CPI", Some("314.07"), "313.80", "313.55");
        let rate = entry("2024-06-12T12:30:00", "Inflation Rate YoY", Some("3.3%"), "3.4%", "3.4%");

        for rows in [vec![index.clone(), rate.clone()], vec![rate, index]] {
            let latest = latest_per_indicator(&rows);
            let cpi = &latest["CPI"];
            assert_eq!(cpi.actual, Some(3.3));
            assert_eq!(cpi.consensus, Some(3.4));
            assert_eq!(latest["CPI_INDEX"].actual, Some(314.07));
        }
    }

    #[test]
    fn test_rate_decision_row() {
        let row = entry("2024-06-12T18:00:00", "Fed Interest Rate Decision", Some("5.5%"), "5.5%", "5.5%");
        let obs = row.to_observation();
        assert_eq!(obs.name, "FOMC");
        assert_eq!(obs.actual, Some(5.5));
        assert_eq!(obs.period, NaiveDate::from_ymd_opt(2024, 6, 12));
    }

    #[test]
    fn test_pending_row_kept_when_nothing_released() {
        let rows = vec![entry("2024-07-11T12:30:00", "Core Inflation Rate YoY", None, "3.4%", "3.4%")];
        let latest = latest_per_indicator(&rows);

        let obs = &latest["CORE_CPI"];
        assert!(obs.actual.is_none());
        assert!(!obs.is_scorable());
    }

    #[test]
    fn test_calendar_json_deserializes() {
        let json = r#"[{"CalendarId":"1","Date":"2024-06-07T12:30:00","Country":"United States","Category":"Non Farm Payrolls","Event":"Non Farm Payrolls","Reference":"May","Actual":"272K","Previous":"165K","Forecast":"185K","TEForecast":"190K","Importance":3}]"#;
        let rows: Vec<CalendarEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].importance, Some(3));
        assert!(rows[0].timestamp().is_some());
    }

    #[test]
    fn test_guest_key_fallback() {
        let fetcher = HttpFetcher::new(5, 1, 0.0).unwrap();
        assert!(TradingEconomicsSource::new(fetcher.clone(), None).uses_guest_key());
        assert!(TradingEconomicsSource::new(fetcher.clone(), Some("  ".into())).uses_guest_key());
        assert!(!TradingEconomicsSource::new(fetcher, Some("key:secret".into())).uses_guest_key());
    }
}
