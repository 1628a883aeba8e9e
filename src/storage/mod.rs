//! Data storage and persistence
//!
//! SQLite prediction log used for hit-rate tracking, plus the TTL cache.

pub mod cache;


pub use cache::{CacheStats, TtlCache};

use crate::error::Result;
use crate::scoring::{Classification, Confidence};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;

/// A reading to be logged
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub timestamp: DateTime<Utc>,
    /// Triggering event ("NFP", "CPI", "MANUAL", ...)
    pub event_type: String,
    pub usd_score: f64,
    pub classification: Classification,
    pub confidence: Confidence,
    /// DXY level when the reading was made
    pub reference_price: Option<f64>,
}

/// Realized DXY move at one horizon after a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub horizon_mins: u32,
    pub return_pct: f64,
    pub hit: bool,
    pub measured_at: DateTime<Utc>,
}

/// Logged prediction with whatever measurements exist so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub usd_score: f64,
    pub classification: String,
    pub confidence: String,
    pub reference_price: Option<f64>,
    pub measurements: Vec<Measurement>,
}

impl PredictionRecord {
    pub fn measurement(&self, horizon_mins: u32) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.horizon_mins == horizon_mins)
    }

    /// Horizons from `horizons` not yet measured
    pub fn missing_horizons(&self, horizons: &[u32]) -> Vec<u32> {
        horizons
            .iter()
            .copied()
            .filter(|h| self.measurement(*h).is_none())
            .collect()
    }
}

/// Database for storing predictions and their outcomes
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to SQLite database (creates if not exists)
    pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        tracing::info!("Database ready at {}", path.as_ref().display());
        Ok(db)
    }

    /// Private in-memory database, single connection so every query sees it
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                usd_score REAL NOT NULL,
                classification TEXT NOT NULL,
                confidence TEXT NOT NULL,
                reference_price REAL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_predictions_timestamp ON predictions(timestamp)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_predictions_event_type ON predictions(event_type)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prediction_measurements (
                prediction_id INTEGER NOT NULL REFERENCES predictions(id) ON DELETE CASCADE,
                horizon_mins INTEGER NOT NULL,
                return_pct REAL NOT NULL,
                hit INTEGER NOT NULL,
                measured_at TEXT NOT NULL,
                PRIMARY KEY (prediction_id, horizon_mins)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append a prediction, returning its id
    pub async fn log_prediction(&self, prediction: &NewPrediction) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO predictions
            (timestamp, event_type, usd_score, classification, confidence, reference_price)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(format_ts(&prediction.timestamp))
        .bind(&prediction.event_type)
        .bind(prediction.usd_score)
        .bind(prediction.classification.label())
        .bind(prediction.confidence.label())
        .bind(prediction.reference_price)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Store the outcome for one horizon (replaces an earlier one)
    pub async fn record_measurement(
        &self,
        prediction_id: i64,
        horizon_mins: u32,
        return_pct: f64,
        hit: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO prediction_measurements
            (prediction_id, horizon_mins, return_pct, hit, measured_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(prediction_id)
        .bind(i64::from(horizon_mins))
        .bind(return_pct)
        .bind(i64::from(hit))
        .bind(format_ts(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_prediction(&self, id: i64) -> Result<Option<PredictionRecord>> {
        let row = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT id, timestamp, event_type, usd_score, classification, confidence, reference_price
            FROM predictions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_measurements(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    /// Most recent predictions, newest first
    pub async fn recent_predictions(&self, limit: i64) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT id, timestamp, event_type, usd_score, classification, confidence, reference_price
            FROM predictions
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.attach_measurements(rows).await
    }

    /// Predictions at or after `cutoff`, newest first
    pub async fn predictions_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT id, timestamp, event_type, usd_score, classification, confidence, reference_price
            FROM predictions
            WHERE timestamp >= ?
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(format_ts(&cutoff))
        .fetch_all(&self.pool)
        .await?;

        self.attach_measurements(rows).await
    }

    /// Delete predictions (and their measurements) older than `cutoff`
    pub async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff = format_ts(&cutoff);

        sqlx::query(
            r#"
            DELETE FROM prediction_measurements
            WHERE prediction_id IN (SELECT id FROM predictions WHERE timestamp < ?)
            "#,
        )
        .bind(&cutoff)
        .execute(&self.pool)
        .await?;

        let result = sqlx::query("DELETE FROM predictions WHERE timestamp < ?")
            .bind(&cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Write predictions since `cutoff` as CSV, one column pair per horizon
    pub async fn export_csv<P: AsRef<Path>>(
        &self,
        path: P,
        cutoff: DateTime<Utc>,
        horizons: &[u32],
    ) -> Result<usize> {
        let records = self.predictions_since(cutoff).await?;
        let mut writer = csv::Writer::from_path(path.as_ref())?;

        let mut header: Vec<String> = [
            "id",
            "timestamp",
            "event_type",
            "usd_score",
            "classification",
            "confidence",
            "reference_price",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for h in horizons {
            header.push(format!("dxy_{}m", h));
            header.push(format!("hit_{}m", h));
        }
        writer.write_record(&header)?;

        for record in &records {
            let mut row = vec![
                record.id.to_string(),
                format_ts(&record.timestamp),
                record.event_type.clone(),
                format!("{:.4}", record.usd_score),
                record.classification.clone(),
                record.confidence.clone(),
                record.reference_price.map(|p| p.to_string()).unwrap_or_default(),
            ];
            for h in horizons {
                match record.measurement(*h) {
                    Some(m) => {
                        row.push(format!("{:.4}", m.return_pct));
                        row.push(if m.hit { "1" } else { "0" }.to_string());
                    }
                    None => {
                        row.push(String::new());
                        row.push(String::new());
                    }
                }
            }
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(records.len())
    }

    async fn attach_measurements(&self, rows: Vec<PredictionRow>) -> Result<Vec<PredictionRecord>> {
        let mut by_prediction: HashMap<i64, Vec<Measurement>> = HashMap::new();

        for row in &rows {
            let measurements = sqlx::query_as::<_, MeasurementRow>(
                r#"
                SELECT horizon_mins, return_pct, hit, measured_at
                FROM prediction_measurements
                WHERE prediction_id = ?
                ORDER BY horizon_mins ASC
                "#,
            )
            .bind(row.id)
            .fetch_all(&self.pool)
            .await?;

            by_prediction.insert(
                row.id,
                measurements.into_iter().filter_map(|m| m.try_into().ok()).collect(),
            );
        }

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let measurements = by_prediction.remove(&row.id).unwrap_or_default();
                match parse_ts(&row.timestamp) {
                    Some(timestamp) => Some(PredictionRecord {
                        id: row.id,
                        timestamp,
                        event_type: row.event_type,
                        usd_score: row.usd_score,
                        classification: row.classification,
                        confidence: row.confidence,
                        reference_price: row.reference_price,
                        measurements,
                    }),
                    None => {
                        tracing::warn!("Skipping prediction {} with bad timestamp", row.id);
                        None
                    }
                }
            })
            .collect())
    }
}

/// Fixed-width RFC 3339 so text comparison matches time order
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[derive(Debug, sqlx::FromRow)]
struct PredictionRow {
    id: i64,
    timestamp: String,
    event_type: String,
    usd_score: f64,
    classification: String,
    confidence: String,
    reference_price: Option<f64>,
}

#[derive(Debug, sqlx::FromRow)]
struct MeasurementRow {
    horizon_mins: i64,
    return_pct: f64,
    hit: i64,
    measured_at: String,
}

impl TryFrom<MeasurementRow> for Measurement {
    type Error = anyhow::Error;

    fn try_from(row: MeasurementRow) -> std::result::Result<Self, Self::Error> {
        Ok(Measurement {
            horizon_mins: u32::try_from(row.horizon_mins)?,
            return_pct: row.return_pct,
            hit: row.hit != 0,
            measured_at: parse_ts(&row.measured_at)
                .ok_or_else(|| anyhow::anyhow!("bad timestamp {}", row.measured_at))?,
        })
    }
}
