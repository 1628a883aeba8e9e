//! Weighted aggregation of component scores

use super::{AggregateResult, Classification, ComponentScore, Confidence};

/// Minimum |score| for a high-confidence reading
const HIGH_CONFIDENCE_SCORE: f64 = 1.5;
/// Minimum contributing indicators for a high-confidence reading
const HIGH_CONFIDENCE_COMPONENTS: usize = 3;
/// Maximum size of the minority side (positive vs negative) for high confidence
const MAX_DISAGREEMENT: usize = 1;
/// Minimum contributing indicators for a medium-confidence reading
const MEDIUM_CONFIDENCE_COMPONENTS: usize = 2;

pub struct UsdScoreAggregator;

impl UsdScoreAggregator {
    /// Combine component scores into one reading.
    ///
    /// The score is normalized by the weight actually present, so indicators
    /// without data never pull the reading towards zero.
    pub fn aggregate(components: Vec<ComponentScore>) -> AggregateResult {
        let contributing: Vec<ComponentScore> = components
            .into_iter()
            .filter(|c| c.weight.is_finite() && c.weight > 0.0)
            .collect();

        let total_weight: f64 = contributing.iter().map(|c| c.weight).sum();
        if contributing.is_empty() || total_weight <= 0.0 {
            return AggregateResult::neutral();
        }

        let weighted: f64 = contributing.iter().map(|c| c.contribution).sum();
        let score = (weighted / total_weight).clamp(-2.0, 2.0);

        AggregateResult {
            score,
            classification: Classification::from_score(score),
            confidence: Self::confidence(&contributing, score),
            components: contributing,
        }
    }

    fn confidence(components: &[ComponentScore], score: f64) -> Confidence {
        let count = components.len();

        if score.abs() >= HIGH_CONFIDENCE_SCORE && count >= HIGH_CONFIDENCE_COMPONENTS {
            let positive = components.iter().filter(|c| c.sub_score > 0).count();
            let negative = components.iter().filter(|c| c.sub_score < 0).count();
            if positive.min(negative) <= MAX_DISAGREEMENT {
                return Confidence::High;
            }
        }

        if count >= MEDIUM_CONFIDENCE_COMPONENTS {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}
