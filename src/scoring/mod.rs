//! Indicator-surprise scoring
//!
//! Turns released macro indicators into a single USD bias reading:
//! - [`SurpriseScorer`]: one observation -> bounded sub-score in [-2, +2]
//! - [`UsdScoreAggregator`]: sub-scores -> weighted score, classification, confidence
//! - [`ScoringEngine`]: runs both over an [`IndicatorTable`]
//!
//! Everything here is pure and synchronous. Missing data never fails a
//! reading; it only shrinks the set of contributing indicators.

pub mod aggregator;
pub mod definition;
pub mod scorer;

#[cfg(test)]
mod tests;

pub use aggregator::UsdScoreAggregator;
pub use definition::{
    canonical_indicator_name, Category, IndicatorDefinition, IndicatorOverride, IndicatorTable,
    Normalization, ThresholdLadder,
};
pub use scorer::SurpriseScorer;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One released (or pending) value of an indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorObservation {
    /// Canonical indicator code ("NFP", "CPI", ...)
    pub name: String,
    /// Released value, `None` until published
    pub actual: Option<f64>,
    /// Market forecast, `None` when no forecast source is configured
    pub consensus: Option<f64>,
    /// Prior period's value
    pub previous: Option<f64>,
    /// Provider the values came from
    #[serde(default)]
    pub source: String,
    /// Reference period of the release
    #[serde(default)]
    pub period: Option<NaiveDate>,
}

impl IndicatorObservation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actual: None,
            consensus: None,
            previous: None,
            source: String::new(),
            period: None,
        }
    }

    pub fn with_actual(mut self, value: f64) -> Self {
        self.actual = Some(value);
        self
    }

    pub fn with_consensus(mut self, value: f64) -> Self {
        self.consensus = Some(value);
        self
    }

    pub fn with_previous(mut self, value: f64) -> Self {
        self.previous = Some(value);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_period(mut self, period: NaiveDate) -> Self {
        self.period = Some(period);
        self
    }

    /// True when a sub-score can be computed from this observation
    pub fn is_scorable(&self) -> bool {
        self.actual.is_some() && (self.consensus.is_some() || self.previous.is_some())
    }
}

/// Scored contribution of one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub indicator_name: String,
    /// Bucketed score in [-2, +2], inversion already applied
    pub sub_score: i8,
    /// Effective weight (halved when scored against `previous`)
    pub weight: f64,
    /// `sub_score * weight`
    pub contribution: f64,
    /// Normalized surprise (percent or points, per the indicator definition)
    pub surprise: f64,
    pub actual: f64,
    /// Consensus, or previous when `discounted`
    pub baseline: f64,
    /// Scored against the previous value instead of consensus
    pub discounted: bool,
    pub normalization: Normalization,
    pub category: Category,
}

/// Five-bucket USD bias label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Strong USD")]
    StrongUsd,
    #[serde(rename = "Mildly Strong")]
    MildlyStrong,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Mildly Weak")]
    MildlyWeak,
    #[serde(rename = "Weak USD")]
    WeakUsd,
}

impl Classification {
    /// Boundaries belong to the stronger-magnitude bucket on both sides.
    pub fn from_score(score: f64) -> Self {
        if score >= 1.5 {
            Classification::StrongUsd
        } else if score >= 0.5 {
            Classification::MildlyStrong
        } else if score > -0.5 {
            Classification::Neutral
        } else if score > -1.5 {
            Classification::MildlyWeak
        } else {
            Classification::WeakUsd
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::StrongUsd => "Strong USD",
            Classification::MildlyStrong => "Mildly Strong",
            Classification::Neutral => "Neutral",
            Classification::MildlyWeak => "Mildly Weak",
            Classification::WeakUsd => "Weak USD",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "Strong USD" => Some(Classification::StrongUsd),
            "Mildly Strong" => Some(Classification::MildlyStrong),
            "Neutral" => Some(Classification::Neutral),
            "Mildly Weak" => Some(Classification::MildlyWeak),
            "Weak USD" => Some(Classification::WeakUsd),
            _ => None,
        }
    }

    /// +1 for USD-positive buckets, -1 for USD-negative, 0 for neutral
    pub fn direction(&self) -> i8 {
        match self {
            Classification::StrongUsd | Classification::MildlyStrong => 1,
            Classification::Neutral => 0,
            Classification::MildlyWeak | Classification::WeakUsd => -1,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn label(&self) -> &'static str {
        match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "Low" => Some(Confidence::Low),
            "Medium" => Some(Confidence::Medium),
            "High" => Some(Confidence::High),
            _ => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Aggregate USD reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Weighted mean of sub-scores, in [-2, +2]
    pub score: f64,
    pub classification: Classification,
    pub confidence: Confidence,
    pub components: Vec<ComponentScore>,
}

impl AggregateResult {
    /// Reading used when nothing could be scored
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            classification: Classification::Neutral,
            confidence: Confidence::Low,
            components: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Scores a set of observations against an indicator table
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    table: IndicatorTable,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(IndicatorTable::default())
    }
}

impl ScoringEngine {
    pub fn new(table: IndicatorTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &IndicatorTable {
        &self.table
    }

    /// Score every known indicator present in `observations`.
    ///
    /// Indicators are visited in table order so repeated calls sum in the
    /// same order and produce bit-identical scores.
    pub fn evaluate(&self, observations: &HashMap<String, IndicatorObservation>) -> AggregateResult {
        let components: Vec<ComponentScore> = self
            .table
            .iter()
            .filter_map(|(name, definition)| {
                let observation = observations.get(name)?;
                let component = SurpriseScorer::score(observation, definition);
                if component.is_none() {
                    tracing::debug!("Skipping {}: insufficient data", name);
                }
                component
            })
            .collect();

        for name in observations.keys() {
            if self.table.get(name).is_none() {
                tracing::debug!("No definition for indicator {}, ignored", name);
            }
        }

        UsdScoreAggregator::aggregate(components)
    }
}
