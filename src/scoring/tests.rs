//! Unit tests for scoring module

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashMap;

    fn component(name: &str, sub_score: i8, weight: f64) -> ComponentScore {
        ComponentScore {
            indicator_name: name.to_string(),
            sub_score,
            weight,
            contribution: f64::from(sub_score) * weight,
            surprise: 0.0,
            actual: 0.0,
            baseline: 0.0,
            discounted: false,
            normalization: Normalization::Percent,
            category: Category::Employment,
        }
    }

    fn spec_table() -> IndicatorTable {
        let mut table = IndicatorTable::empty();
        table.insert("NFP", IndicatorDefinition::percent(0.25, Category::Employment));
        table.insert(
            "UNEMPLOYMENT",
            IndicatorDefinition::point(0.15, Category::Employment).inverted(),
        );
        table
    }

    fn observations(list: Vec<IndicatorObservation>) -> HashMap<String, IndicatorObservation> {
        list.into_iter().map(|o| (o.name.clone(), o)).collect()
    }

    // --- Threshold ladders ---

    #[test]
    fn test_percent_ladder_buckets() {
        let ladder = ThresholdLadder::percent();
        assert_eq!(ladder.bucket(-45.0), -2);
        assert_eq!(ladder.bucket(-30.0), -2);
        assert_eq!(ladder.bucket(-29.9), -1);
        assert_eq!(ladder.bucket(-10.0), -1);
        assert_eq!(ladder.bucket(-9.9), 0);
        assert_eq!(ladder.bucket(0.0), 0);
        assert_eq!(ladder.bucket(9.9), 0);
        assert_eq!(ladder.bucket(10.0), 1);
        assert_eq!(ladder.bucket(30.0), 1);
        assert_eq!(ladder.bucket(30.1), 2);
    }

    #[test]
    fn test_point_ladder_buckets() {
        let ladder = ThresholdLadder::point();
        assert_eq!(ladder.bucket(-0.3), -2);
        assert_eq!(ladder.bucket(-0.2), -2);
        assert_eq!(ladder.bucket(-0.1), -1);
        assert_eq!(ladder.bucket(0.05), 0);
        assert_eq!(ladder.bucket(0.1), 1);
        assert_eq!(ladder.bucket(0.25), 2);
    }

    #[test]
    fn test_ladder_validation() {
        assert!(ThresholdLadder::percent().validate().is_ok());
        assert!(ThresholdLadder::new(-1.0, -2.0, 1.0, 2.0).validate().is_err());
        assert!(ThresholdLadder::new(-2.0, 1.0, 1.0, 2.0).validate().is_err());
        assert!(ThresholdLadder::new(f64::NAN, -1.0, 1.0, 2.0).validate().is_err());
    }

    // --- SurpriseScorer ---

    #[test]
    fn test_percent_surprise_against_consensus() {
        let def = IndicatorDefinition::percent(0.25, Category::Employment);
        let obs = IndicatorObservation::new("NFP").with_actual(220.0).with_consensus(150.0);

        let c = SurpriseScorer::score(&obs, &def).unwrap();
        assert!((c.surprise - 46.666667).abs() < 1e-6);
        assert_eq!(c.sub_score, 2);
        assert_eq!(c.weight, 0.25);
        assert_eq!(c.contribution, 0.5);
        assert!(!c.discounted);
    }

    #[test]
    fn test_point_delta_against_consensus() {
        let def = IndicatorDefinition::point(1.0, Category::Inflation);
        let obs = IndicatorObservation::new("CPI").with_actual(3.2).with_consensus(3.1);

        let c = SurpriseScorer::score(&obs, &def).unwrap();
        assert!((c.surprise - 0.1).abs() < 1e-9);
        assert_eq!(c.sub_score, 1);
    }

    #[test]
    fn test_float_residue_does_not_shift_bucket() {
        // 4.1 - 4.2 is -0.09999999999999964 in binary floating point
        let def = IndicatorDefinition::point(1.0, Category::Employment);
        let obs = IndicatorObservation::new("AHE").with_actual(4.1).with_consensus(4.2);

        let c = SurpriseScorer::score(&obs, &def).unwrap();
        assert_eq!(c.sub_score, -1);
    }

    #[test]
    fn test_previous_baseline_halves_weight() {
        let def = IndicatorDefinition::percent(1.2, Category::Employment);
        let obs = IndicatorObservation::new("NFP").with_actual(130.0).with_previous(100.0);

        let c = SurpriseScorer::score(&obs, &def).unwrap();
        assert!(c.discounted);
        assert_eq!(c.baseline, 100.0);
        assert_eq!(c.sub_score, 1);
        assert!((c.weight - 0.6).abs() < 1e-12);
        assert!((c.contribution - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_consensus_preferred_over_previous() {
        let def = IndicatorDefinition::percent(1.0, Category::Employment);
        let obs = IndicatorObservation::new("NFP")
            .with_actual(100.0)
            .with_consensus(100.0)
            .with_previous(10.0);

        let c = SurpriseScorer::score(&obs, &def).unwrap();
        assert!(!c.discounted);
        assert_eq!(c.sub_score, 0);
        assert_eq!(c.weight, 1.0);
    }

    #[test]
    fn test_no_actual_no_score() {
        let def = IndicatorDefinition::percent(1.0, Category::Employment);
        let obs = IndicatorObservation::new("NFP").with_consensus(150.0).with_previous(140.0);
        assert!(SurpriseScorer::score(&obs, &def).is_none());
    }

    #[test]
    fn test_no_baseline_no_score() {
        let def = IndicatorDefinition::point(1.0, Category::Inflation);
        let obs = IndicatorObservation::new("CPI").with_actual(3.0);
        assert!(!obs.is_scorable());
        assert!(SurpriseScorer::score(&obs, &def).is_none());
    }

    #[test]
    fn test_zero_baseline_percent_excluded() {
        let def = IndicatorDefinition::percent(1.0, Category::Employment);
        let obs = IndicatorObservation::new("NFP").with_actual(50.0).with_consensus(0.0);
        assert!(SurpriseScorer::score(&obs, &def).is_none());
    }

    #[test]
    fn test_zero_baseline_point_is_fine() {
        let def = IndicatorDefinition::point(1.0, Category::Inflation);
        let obs = IndicatorObservation::new("CPI").with_actual(0.3).with_consensus(0.0);
        assert_eq!(SurpriseScorer::score(&obs, &def).unwrap().sub_score, 2);
    }

    #[test]
    fn test_inversion_applied_after_bucketing() {
        let plain = IndicatorDefinition::point(1.0, Category::Employment);
        let inverted = plain.clone().inverted();

        // actual below consensus by 0.1pp: +1 would be -1 for a plain indicator
        let below = IndicatorObservation::new("UNEMPLOYMENT").with_actual(4.0).with_consensus(4.1);
        assert_eq!(SurpriseScorer::score(&below, &plain).unwrap().sub_score, -1);
        assert_eq!(SurpriseScorer::score(&below, &inverted).unwrap().sub_score, 1);

        let above = IndicatorObservation::new("UNEMPLOYMENT").with_actual(4.2).with_consensus(4.1);
        assert_eq!(SurpriseScorer::score(&above, &plain).unwrap().sub_score, 1);
        assert_eq!(SurpriseScorer::score(&above, &inverted).unwrap().sub_score, -1);
    }

    #[test]
    fn test_inverted_claims_percent() {
        let table = IndicatorTable::default();
        let claims = table.get("CLAIMS").unwrap();
        // 250k vs 220k expected: +13.6% more claims -> USD negative
        let obs = IndicatorObservation::new("CLAIMS").with_actual(250.0).with_consensus(220.0);
        assert_eq!(SurpriseScorer::score(&obs, claims).unwrap().sub_score, -1);
    }

    // --- UsdScoreAggregator ---

    #[test]
    fn test_empty_input_is_neutral_low() {
        let result = UsdScoreAggregator::aggregate(vec![]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.classification, Classification::Neutral);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.is_empty());
    }

    #[test]
    fn test_all_zero_weight_is_neutral_low() {
        let result = UsdScoreAggregator::aggregate(vec![component("X", 2, 0.0)]);
        assert_eq!(result, AggregateResult::neutral());
    }

    #[test]
    fn test_single_strong_component() {
        let result = UsdScoreAggregator::aggregate(vec![component("NFP", 2, 1.0)]);
        assert_eq!(result.score, 2.0);
        assert_eq!(result.classification, Classification::StrongUsd);
        assert_eq!(result.confidence, Confidence::Low);
    }

    #[test]
    fn test_score_normalized_by_present_weight() {
        let result = UsdScoreAggregator::aggregate(vec![
            component("NFP", 2, 0.25),
            component("CPI", -1, 0.75),
        ]);
        assert!((result.score - (-0.25)).abs() < 1e-12);
        assert_eq!(result.classification, Classification::Neutral);
    }

    #[test]
    fn test_zero_weight_component_does_not_change_score() {
        let base = vec![component("NFP", 2, 0.3), component("CPI", 1, 0.7)];
        let mut with_zero = base.clone();
        with_zero.push(component("ADP", -2, 0.0));

        let a = UsdScoreAggregator::aggregate(base);
        let b = UsdScoreAggregator::aggregate(with_zero);
        assert_eq!(a.score, b.score);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn test_score_bounded() {
        let cases = vec![
            vec![component("A", 2, 5.0), component("B", 2, 0.1)],
            vec![component("A", -2, 3.0), component("B", -2, 7.0)],
            vec![component("A", 2, 1.0), component("B", -2, 1.0), component("C", 1, 2.0)],
        ];
        for components in cases {
            let result = UsdScoreAggregator::aggregate(components);
            assert!((-2.0..=2.0).contains(&result.score));
        }
    }

    #[test]
    fn test_confidence_escalation() {
        let agreeing = vec![
            component("NFP", 2, 1.0),
            component("CPI", 1, 1.0),
            component("ISM_MFG", 2, 1.0),
        ];
        let result = UsdScoreAggregator::aggregate(agreeing);
        assert!(result.score >= 1.5);
        assert_eq!(result.confidence, Confidence::High);

        let disagreeing = vec![
            component("NFP", 2, 1.0),
            component("CPI", 1, 1.0),
            component("ISM_MFG", -2, 1.0),
        ];
        let result = UsdScoreAggregator::aggregate(disagreeing);
        assert!(result.confidence <= Confidence::Medium);
    }

    #[test]
    fn test_strong_score_with_split_signals_not_high() {
        // Heavy positives dominate the score but two negatives disagree
        let components = vec![
            component("NFP", 2, 10.0),
            component("CPI", 2, 10.0),
            component("PCE", -1, 0.1),
            component("ISM_MFG", -1, 0.1),
        ];
        let result = UsdScoreAggregator::aggregate(components);
        assert!(result.score >= 1.5);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_two_components_medium() {
        let result = UsdScoreAggregator::aggregate(vec![
            component("NFP", 2, 1.0),
            component("CPI", 2, 1.0),
        ]);
        assert_eq!(result.classification, Classification::StrongUsd);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(Classification::from_score(2.0), Classification::StrongUsd);
        assert_eq!(Classification::from_score(1.5), Classification::StrongUsd);
        assert_eq!(Classification::from_score(1.4999), Classification::MildlyStrong);
        assert_eq!(Classification::from_score(0.5), Classification::MildlyStrong);
        assert_eq!(Classification::from_score(0.4999), Classification::Neutral);
        assert_eq!(Classification::from_score(0.0), Classification::Neutral);
        assert_eq!(Classification::from_score(-0.4999), Classification::Neutral);
        assert_eq!(Classification::from_score(-0.5), Classification::MildlyWeak);
        assert_eq!(Classification::from_score(-1.4999), Classification::MildlyWeak);
        assert_eq!(Classification::from_score(-1.5), Classification::WeakUsd);
        assert_eq!(Classification::from_score(-2.0), Classification::WeakUsd);
    }

    #[test]
    fn test_classification_labels_roundtrip() {
        for c in [
            Classification::StrongUsd,
            Classification::MildlyStrong,
            Classification::Neutral,
            Classification::MildlyWeak,
            Classification::WeakUsd,
        ] {
            assert_eq!(Classification::parse(c.label()), Some(c));
        }
        assert_eq!(
            serde_json::to_string(&Classification::StrongUsd).unwrap(),
            "\"Strong USD\""
        );
        assert_eq!(Classification::parse("Bullish"), None);
    }

    // --- ScoringEngine ---

    #[test]
    fn test_end_to_end_nfp_and_unemployment() {
        let engine = ScoringEngine::new(spec_table());
        let obs = observations(vec![
            IndicatorObservation::new("NFP").with_actual(220.0).with_consensus(150.0),
            IndicatorObservation::new("UNEMPLOYMENT").with_actual(3.9).with_consensus(4.2),
        ]);

        let result = engine.evaluate(&obs);

        let nfp = result.components.iter().find(|c| c.indicator_name == "NFP").unwrap();
        let unemployment = result
            .components
            .iter()
            .find(|c| c.indicator_name == "UNEMPLOYMENT")
            .unwrap();
        assert_eq!(nfp.sub_score, 2);
        // -0.3pp buckets to -2, inverted to +2
        assert_eq!(unemployment.sub_score, 2);

        assert!((result.score - 2.0).abs() < 1e-12);
        assert_eq!(result.classification, Classification::StrongUsd);
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let engine = ScoringEngine::default();
        let obs = observations(vec![
            IndicatorObservation::new("NFP").with_actual(180.0).with_consensus(160.0),
            IndicatorObservation::new("CPI").with_actual(3.1).with_consensus(3.3),
            IndicatorObservation::new("ISM_MFG").with_actual(49.0).with_previous(47.5),
            IndicatorObservation::new("CLAIMS").with_actual(210.0).with_consensus(230.0),
        ]);

        let first = engine.evaluate(&obs);
        let second = engine.evaluate(&obs);
        assert_eq!(first, second);
    }

    #[test]
    fn test_absent_data_does_not_change_score() {
        let engine = ScoringEngine::default();
        let mut obs = observations(vec![
            IndicatorObservation::new("NFP").with_actual(180.0).with_consensus(150.0),
            IndicatorObservation::new("CPI").with_actual(3.0).with_consensus(3.1),
        ]);
        let baseline = engine.evaluate(&obs);

        // Unreleased and baseline-less observations are excluded
        obs.insert(
            "PCE".to_string(),
            IndicatorObservation::new("PCE").with_consensus(2.5),
        );
        obs.insert(
            "ADP".to_string(),
            IndicatorObservation::new("ADP").with_actual(120.0),
        );
        let with_absent = engine.evaluate(&obs);

        assert_eq!(baseline.score, with_absent.score);
        assert_eq!(baseline.components.len(), with_absent.components.len());
    }

    #[test]
    fn test_unknown_indicator_ignored() {
        let engine = ScoringEngine::default();
        let obs = observations(vec![IndicatorObservation::new("GDP")
            .with_actual(3.0)
            .with_consensus(2.0)]);
        assert_eq!(engine.evaluate(&obs), AggregateResult::neutral());
    }

    // --- IndicatorTable ---

    #[test]
    fn test_default_table_is_valid() {
        let table = IndicatorTable::default();
        assert!(table.validate().is_ok());
        assert!(table.get("UNEMPLOYMENT").unwrap().inverted);
        assert!(table.get("CLAIMS").unwrap().inverted);
        assert!(!table.get("NFP").unwrap().inverted);
        assert_eq!(table.get("NFP").unwrap().normalization, Normalization::Percent);
        assert_eq!(table.get("CPI").unwrap().normalization, Normalization::Point);
        assert_eq!(table.get("FOMC").unwrap().category, Category::Policy);
        assert!(table.get("CPI_INDEX").is_none());
    }

    #[test]
    fn test_overrides_adjust_and_add() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "nfp".to_string(),
            IndicatorOverride {
                weight: Some(2.0),
                ..Default::default()
            },
        );
        overrides.insert(
            "JOLTS".to_string(),
            IndicatorOverride {
                weight: Some(0.4),
                category: Some(Category::Employment),
                ..Default::default()
            },
        );

        let table = IndicatorTable::default().with_overrides(&overrides).unwrap();
        assert_eq!(table.get("NFP").unwrap().weight, 2.0);
        let jolts = table.get("JOLTS").unwrap();
        assert_eq!(jolts.weight, 0.4);
        assert_eq!(jolts.normalization, Normalization::Percent);
        assert_eq!(jolts.category, Category::Employment);
    }

    #[test]
    fn test_override_normalization_swaps_default_ladder() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "RETAIL_SALES".to_string(),
            IndicatorOverride {
                normalization: Some(Normalization::Point),
                ..Default::default()
            },
        );
        let table = IndicatorTable::default().with_overrides(&overrides).unwrap();
        assert_eq!(table.get("RETAIL_SALES").unwrap().thresholds, ThresholdLadder::point());
    }

    #[test]
    fn test_negative_weight_override_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "CPI".to_string(),
            IndicatorOverride {
                weight: Some(-1.0),
                ..Default::default()
            },
        );
        assert!(IndicatorTable::default().with_overrides(&overrides).is_err());
    }

    #[test]
    fn test_canonical_indicator_names() {
        assert_eq!(canonical_indicator_name("Nonfarm Payrolls"), "NFP");
        assert_eq!(canonical_indicator_name("Non Farm Payrolls"), "NFP");
        assert_eq!(canonical_indicator_name("Unemployment Rate"), "UNEMPLOYMENT");
        assert_eq!(canonical_indicator_name("Core PCE Price Index YoY"), "CORE_PCE");
        assert_eq!(canonical_indicator_name("ISM Services PMI"), "ISM_SERVICES");
        assert_eq!(canonical_indicator_name("Initial Jobless Claims"), "CLAIMS");
        assert_eq!(canonical_indicator_name("JOLTs Job Openings"), "JOLTS_JOB_OPENINGS");
        assert_eq!(canonical_indicator_name("Inflation Rate YoY"), "CPI");
        assert_eq!(canonical_indicator_name("CPI"), "CPI_INDEX");
        assert_eq!(canonical_indicator_name("PCE Price Index"), "PCE_INDEX");
        assert_eq!(canonical_indicator_name("Fed Interest Rate Decision"), "FOMC");
    }
}
