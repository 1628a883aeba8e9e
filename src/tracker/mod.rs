//! Hit-rate tracking
//!
//! Every logged reading is checked against the Dollar Index at fixed
//! horizons afterwards. Measurements run as spawned tasks that stop as soon
//! as the shutdown signal flips; unfinished ones are picked up again on the
//! next start by [`HitRateTracker::resume_pending`].


use crate::error::Result;
use crate::ingester::{PriceSource, DXY_SYMBOL};
use crate::scoring::AggregateResult;
use crate::storage::{Database, Measurement, NewPrediction, PredictionRecord};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Longest look-back accepted for reports, cleanup and export
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Scores within this band predict no move and always count as hits
pub const NEUTRAL_BAND: f64 = 0.5;

/// Cutoff `days` before now, with `days` clamped to `0..=MAX_LOOKBACK_DAYS`
fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days.clamp(0, MAX_LOOKBACK_DAYS))
}

/// Whether a DXY move agrees with the predicted direction
pub fn is_hit(score: f64, return_pct: f64) -> bool {
    if score.abs() <= NEUTRAL_BAND {
        true
    } else if score > 0.0 {
        return_pct > 0.0
    } else {
        return_pct < 0.0
    }
}

/// Percent change from `reference` to `current`
pub fn dxy_return_pct(reference: f64, current: f64) -> Option<f64> {
    if reference.is_finite() && current.is_finite() && reference > 0.0 {
        Some((current - reference) / reference * 100.0)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonStats {
    pub horizon_mins: u32,
    pub measured: usize,
    pub hits: usize,
}

impl HorizonStats {
    pub fn hit_rate(&self) -> Option<f64> {
        (self.measured > 0).then(|| self.hits as f64 / self.measured as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStats {
    pub event_type: String,
    pub predictions: usize,
    /// Measurements across all horizons
    pub measured: usize,
    pub hits: usize,
}

impl EventStats {
    pub fn hit_rate(&self) -> Option<f64> {
        (self.measured > 0).then(|| self.hits as f64 / self.measured as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub period_days: i64,
    pub total_predictions: usize,
    pub horizons: Vec<HorizonStats>,
    pub by_event: Vec<EventStats>,
}

impl PerformanceReport {
    pub fn from_records(records: &[PredictionRecord], horizons: &[u32], period_days: i64) -> Self {
        let horizon_stats = horizons
            .iter()
            .map(|h| {
                let measured: Vec<&Measurement> = records.iter().filter_map(|r| r.measurement(*h)).collect();
                HorizonStats {
                    horizon_mins: *h,
                    measured: measured.len(),
                    hits: measured.iter().filter(|m| m.hit).count(),
                }
            })
            .collect();

        let mut by_event: BTreeMap<&str, EventStats> = BTreeMap::new();
        for record in records {
            let stats = by_event
                .entry(record.event_type.as_str())
                .or_insert_with(|| EventStats {
                    event_type: record.event_type.clone(),
                    predictions: 0,
                    measured: 0,
                    hits: 0,
                });
            stats.predictions += 1;
            for m in record.measurements.iter().filter(|m| horizons.contains(&m.horizon_mins)) {
                stats.measured += 1;
                if m.hit {
                    stats.hits += 1;
                }
            }
        }

        Self {
            period_days,
            total_predictions: records.len(),
            horizons: horizon_stats,
            by_event: by_event.into_values().collect(),
        }
    }

    pub fn has_measurements(&self) -> bool {
        self.horizons.iter().any(|h| h.measured > 0)
    }
}

#[derive(Clone)]
pub struct HitRateTracker {
    db: Database,
    prices: Arc<dyn PriceSource>,
    horizons: Vec<u32>,
    shutdown: watch::Receiver<bool>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl HitRateTracker {
    pub fn new(
        db: Database,
        prices: Arc<dyn PriceSource>,
        horizons: Vec<u32>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let mut horizons = horizons;
        horizons.retain(|h| *h > 0);
        horizons.sort_unstable();
        horizons.dedup();

        Self {
            db,
            prices,
            horizons,
            shutdown,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn horizons(&self) -> &[u32] {
        &self.horizons
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Log a reading made now and schedule its measurements
    pub async fn log_prediction(&self, event_type: &str, result: &AggregateResult) -> Result<i64> {
        self.log_prediction_at(event_type, result, Utc::now()).await
    }

    pub async fn log_prediction_at(
        &self,
        event_type: &str,
        result: &AggregateResult,
        timestamp: DateTime<Utc>,
    ) -> Result<i64> {
        let reference_price = match self.prices.latest_price(DXY_SYMBOL).await {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!("[Tracker] Could not capture DXY reference: {}", e);
                None
            }
        };

        let id = self
            .db
            .log_prediction(&NewPrediction {
                timestamp,
                event_type: event_type.to_string(),
                usd_score: result.score,
                classification: result.classification,
                confidence: result.confidence,
                reference_price,
            })
            .await?;

        tracing::info!(
            "[Tracker] Logged prediction #{} {} score {:+.2} ({}), DXY ref {:?}",
            id,
            event_type,
            result.score,
            result.classification,
            reference_price
        );

        if reference_price.is_some() {
            self.schedule(id, timestamp, self.horizons.clone());
        } else {
            tracing::warn!("[Tracker] Prediction #{} has no reference price, not measured", id);
        }
        Ok(id)
    }

    /// Measure one horizon now and store the outcome
    pub async fn measure(&self, prediction_id: i64, horizon_mins: u32) -> Result<Option<Measurement>> {
        let Some(record) = self.db.get_prediction(prediction_id).await? else {
            tracing::debug!("[Tracker] Prediction #{} no longer exists", prediction_id);
            return Ok(None);
        };
        let Some(reference) = record.reference_price else {
            return Ok(None);
        };
        let Some(current) = self.prices.latest_price(DXY_SYMBOL).await? else {
            tracing::warn!("[Tracker] No DXY price for #{} at {}m", prediction_id, horizon_mins);
            return Ok(None);
        };
        let Some(return_pct) = dxy_return_pct(reference, current) else {
            return Ok(None);
        };

        let hit = is_hit(record.usd_score, return_pct);
        self.db
            .record_measurement(prediction_id, horizon_mins, return_pct, hit)
            .await?;

        tracing::info!(
            "[Tracker] #{} {}m: DXY {:+.3}% -> {}",
            prediction_id,
            horizon_mins,
            return_pct,
            if hit { "HIT" } else { "MISS" }
        );

        Ok(Some(Measurement {
            horizon_mins,
            return_pct,
            hit,
            measured_at: Utc::now(),
        }))
    }

    /// Reschedule unfinished measurements of recent predictions
    pub async fn resume_pending(&self) -> Result<usize> {
        let Some(max_horizon) = self.horizons.last().copied() else {
            return Ok(0);
        };
        let cutoff = Utc::now() - Duration::minutes(i64::from(max_horizon));
        let records = self.db.predictions_since(cutoff).await?;

        let mut resumed = 0;
        for record in records {
            if record.reference_price.is_none() {
                continue;
            }
            let missing = record.missing_horizons(&self.horizons);
            if missing.is_empty() {
                continue;
            }
            tracing::info!("[Tracker] Resuming #{} horizons {:?}", record.id, missing);
            self.schedule(record.id, record.timestamp, missing);
            resumed += 1;
        }
        Ok(resumed)
    }

    pub async fn performance(&self, days: i64) -> Result<PerformanceReport> {
        let records = self.db.predictions_since(days_ago(days)).await?;
        Ok(PerformanceReport::from_records(&records, &self.horizons, days))
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<PredictionRecord>> {
        self.db.recent_predictions(limit).await
    }

    /// Delete predictions older than `retention_days`
    pub async fn cleanup(&self, retention_days: i64) -> Result<u64> {
        let deleted = self
            .db
            .cleanup_older_than(days_ago(retention_days))
            .await?;
        tracing::info!("[Tracker] Removed {} predictions older than {} days", deleted, retention_days);
        Ok(deleted)
    }

    pub async fn export<P: AsRef<Path>>(&self, path: P, days: i64) -> Result<usize> {
        let written = self
            .db
            .export_csv(path.as_ref(), days_ago(days), &self.horizons)
            .await?;
        tracing::info!("[Tracker] Exported {} predictions to {}", written, path.as_ref().display());
        Ok(written)
    }

    /// Number of measurement tasks still running
    pub fn active_tasks(&self) -> usize {
        let mut tasks = self.tasks.lock();
        tasks.retain(|h| !h.is_finished());
        tasks.len()
    }

    /// Wait for every scheduled measurement task to finish or stop
    pub async fn wait_idle(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("[Tracker] Measurement task failed: {}", e);
            }
        }
    }

    fn schedule(&self, prediction_id: i64, timestamp: DateTime<Utc>, horizons: Vec<u32>) {
        let tracker = self.clone();
        let handle = tokio::spawn(async move {
            tracker.run_measurements(prediction_id, timestamp, horizons).await;
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    async fn run_measurements(&self, prediction_id: i64, timestamp: DateTime<Utc>, horizons: Vec<u32>) {
        let mut shutdown = self.shutdown.clone();

        for horizon in horizons {
            if *shutdown.borrow() {
                break;
            }

            let due = timestamp + Duration::minutes(i64::from(horizon));
            let wait = (due - Utc::now()).to_std().unwrap_or_default();
            if !wait.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.changed() => {
                        tracing::debug!("[Tracker] Shutdown, leaving #{} at {}m", prediction_id, horizon);
                        return;
                    }
                }
            }

            if let Err(e) = self.measure(prediction_id, horizon).await {
                tracing::warn!("[Tracker] Measurement #{} {}m failed: {}", prediction_id, horizon, e);
            }
        }
    }
}
