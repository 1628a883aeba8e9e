//! Indicator ingestion from external data providers
//!
//! Collects released indicator values from:
//! - TradingEconomics calendar (actual, forecast, previous)
//! - FRED series observations (actual, previous)
//! - Alpha Vantage economic indicators (actual, previous)
//!
//! and the Dollar Index price from Yahoo Finance.

pub mod alpha_vantage;
pub mod fred;
pub mod http;
pub mod trading_economics;
pub mod yahoo;


pub use alpha_vantage::AlphaVantageSource;
pub use fred::FredSource;
pub use http::HttpFetcher;
pub use trading_economics::TradingEconomicsSource;
pub use yahoo::{YahooPriceSource, DXY_SYMBOL};

use crate::config::SourcesConfig;
use crate::error::Result;
use crate::scoring::IndicatorObservation;
use crate::storage::TtlCache;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Provider of indicator observations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    /// Source name
    fn name(&self) -> &str;

    /// Fetch the latest observation for each requested indicator it knows.
    ///
    /// Indicators the source does not cover are simply absent from the map.
    async fn fetch(&self, indicators: &[String]) -> Result<HashMap<String, IndicatorObservation>>;
}

/// Provider of a current market price
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn latest_price(&self, symbol: &str) -> Result<Option<f64>>;
}

/// Merged, cached view over the configured sources in priority order
pub struct IndicatorStore {
    sources: Vec<Arc<dyn IndicatorSource>>,
    cache: TtlCache<IndicatorObservation>,
}

impl IndicatorStore {
    pub fn new(cache_ttl_secs: i64) -> Self {
        Self {
            sources: Vec::new(),
            cache: TtlCache::new(cache_ttl_secs),
        }
    }

    /// Sources built from configuration: the calendar first (it is the only
    /// one with forecasts), then FRED and Alpha Vantage when keyed.
    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        let fetcher = HttpFetcher::from_config(config)?;
        let mut store = Self::new(config.cache_ttl_secs);

        let te = TradingEconomicsSource::new(fetcher.clone(), config.trading_economics_api_key.clone());
        if te.uses_guest_key() {
            tracing::info!("TradingEconomics key not set, using the public guest key");
        }
        store.add_source(Arc::new(te));

        match config.fred_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => store.add_source(Arc::new(FredSource::new(fetcher.clone(), key))),
            None => tracing::info!("FRED key not set, source disabled"),
        }
        match config.alpha_vantage_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => store.add_source(Arc::new(AlphaVantageSource::new(fetcher, key))),
            None => tracing::info!("Alpha Vantage key not set, source disabled"),
        }

        Ok(store)
    }

    pub fn with_source(mut self, source: Arc<dyn IndicatorSource>) -> Self {
        self.add_source(source);
        self
    }

    pub fn add_source(&mut self, source: Arc<dyn IndicatorSource>) {
        self.sources.push(source);
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn cache(&self) -> &TtlCache<IndicatorObservation> {
        &self.cache
    }

    /// Observations for `indicators`, never failing.
    ///
    /// Sources are asked in priority order, each only for indicators that no
    /// earlier source has released yet. The first observation with an
    /// `actual` wins; an unreleased one is kept only if nothing better turns
    /// up. Failing sources are logged and skipped.
    pub async fn fetch(&self, indicators: &[String]) -> HashMap<String, IndicatorObservation> {
        let mut merged = self.cache.get_many(indicators);
        let mut missing: Vec<String> = indicators
            .iter()
            .filter(|name| !merged.contains_key(*name))
            .cloned()
            .collect();
        missing.dedup();

        if missing.is_empty() {
            tracing::debug!("All {} indicators served from cache", merged.len());
            return merged;
        }

        let mut fetched: HashMap<String, IndicatorObservation> = HashMap::new();
        for source in &self.sources {
            if missing.is_empty() {
                break;
            }

            match source.fetch(&missing).await {
                Ok(observations) => {
                    tracing::debug!("[{}] returned {} observations", source.name(), observations.len());
                    for (name, obs) in observations {
                        if !missing.contains(&name) {
                            continue;
                        }
                        let better = match fetched.get(&name) {
                            None => true,
                            Some(existing) => existing.actual.is_none() && obs.actual.is_some(),
                        };
                        if better {
                            fetched.insert(name, obs);
                        }
                    }
                }
                Err(e) => tracing::warn!("Source {} failed: {}", source.name(), e),
            }

            missing.retain(|name| fetched.get(name).map_or(true, |obs| obs.actual.is_none()));
        }

        for (name, obs) in fetched {
            self.cache.insert(&name, obs.clone());
            merged.insert(name, obs);
        }

        if !missing.is_empty() {
            tracing::info!("No released data for: {}", missing.join(", "));
        }
        merged
    }
}
