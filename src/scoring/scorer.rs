//! Single-indicator surprise scoring

use super::{ComponentScore, IndicatorDefinition, IndicatorObservation, Normalization};

/// Weight multiplier when only the previous value is available as baseline
pub const PREVIOUS_BASELINE_DISCOUNT: f64 = 0.5;

/// Stateless scorer for one observation
pub struct SurpriseScorer;

impl SurpriseScorer {
    /// Score `observation` against its `definition`.
    ///
    /// Returns `None` when the observation cannot be scored: no actual value,
    /// no baseline, or a zero baseline for a percent-normalized indicator.
    pub fn score(
        observation: &IndicatorObservation,
        definition: &IndicatorDefinition,
    ) -> Option<ComponentScore> {
        let actual = observation.actual.filter(|v| v.is_finite())?;

        let (baseline, discounted) = match (observation.consensus, observation.previous) {
            (Some(consensus), _) if consensus.is_finite() => (consensus, false),
            (_, Some(previous)) if previous.is_finite() => (previous, true),
            _ => return None,
        };

        let surprise = normalize(actual, baseline, definition.normalization)?;

        let mut sub_score = definition.thresholds.bucket(surprise);
        if definition.inverted {
            sub_score = -sub_score;
        }

        let weight = if discounted {
            definition.weight * PREVIOUS_BASELINE_DISCOUNT
        } else {
            definition.weight
        };

        Some(ComponentScore {
            indicator_name: observation.name.clone(),
            sub_score,
            weight,
            contribution: f64::from(sub_score) * weight,
            surprise,
            actual,
            baseline,
            discounted,
            normalization: definition.normalization,
            category: definition.category,
        })
    }
}

fn normalize(actual: f64, baseline: f64, normalization: Normalization) -> Option<f64> {
    let delta = actual - baseline;
    let value = match normalization {
        Normalization::Point => delta,
        Normalization::Percent => {
            if baseline == 0.0 {
                return None;
            }
            delta / baseline.abs() * 100.0
        }
    };
    Some(round_micro(value))
}

/// Drops float residue so `4.1 - 4.2` buckets as `-0.1`
fn round_micro(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
