//! Yahoo Finance chart endpoint, used for the Dollar Index price

use super::http::HttpFetcher;
use super::PriceSource;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
/// ICE US Dollar Index
pub const DXY_SYMBOL: &str = "DX-Y.NYB";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

pub struct YahooPriceSource {
    fetcher: HttpFetcher,
}

impl YahooPriceSource {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

/// Last non-null one-minute close, else the quoted market price
fn extract_price(response: ChartResponse) -> Option<f64> {
    let result = response.chart.result?.into_iter().next()?;

    let last_close = result
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .and_then(|q| q.close.into_iter().rev().flatten().next());

    last_close
        .or_else(|| result.meta.and_then(|m| m.regular_market_price))
        .filter(|p| p.is_finite() && *p > 0.0)
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    async fn latest_price(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}/{}", YAHOO_CHART_URL, symbol);
        let query = [
            ("interval", "1m".to_string()),
            ("range", "1d".to_string()),
            ("includePrePost", "false".to_string()),
        ];
        let response: ChartResponse = self.fetcher.get_json(&url, &query).await?;
        let price = extract_price(response);
        if price.is_none() {
            tracing::warn!("[Yahoo] No price in chart response for {}", symbol);
        }
        Ok(price)
    }
}
