use cyclability_rater::config::{FeatureSet, Versioned, WeightTree, load_features, load_weights};
use cyclability_rater::network::{
    BudgetOptions, NetworkGraph, estimate_improvement, optimize_budget, optimize_graph,
    sample_sources,
};
use cyclability_rater::scoring::{SegmentContext, score_feature};
use cyclability_rater::{
    ErrorKind, MetricError, RawValue, Segment, aggregate_city, score_segments, sweep_all_groups,
    sweep_sensitivity,
};
use std::collections::BTreeMap;

const METRIC: &str = "cyclability";

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn load() -> (Vec<Segment>, Versioned<FeatureSet>, Versioned<WeightTree>) {
    let json = std::fs::read_to_string(fixture("segments.json")).expect("Failed to read segments");
    let segments = serde_json::from_str(&json).expect("Failed to parse segments");
    let features = load_features(fixture("features.yaml")).expect("Failed to load features");
    let weights = load_weights(fixture("weights.yaml")).expect("Failed to load weights");
    (segments, features, weights)
}

#[test]
fn test_fixture_config_loads() {
    let (segments, features, weights) = load();

    assert_eq!(segments.len(), 8);
    assert_eq!(features.value.len(), 4);
    assert!(features.version.starts_with("v1.0.0-"));
    assert!(weights.version.starts_with("v1.0.0-"));
    assert_eq!(weights.value.metric_names().collect::<Vec<_>>(), vec![METRIC]);
}

#[test]
fn test_bin_boundary_scores_lower_bin() {
    let (_, features, _) = load();
    let scored = BTreeMap::new();
    let ctx = SegmentContext {
        metric: METRIC,
        segment_id: "way/1",
        highway_class: "primary",
        scored: &scored,
    };

    let raw = RawValue::Number(50.0);
    let score = score_feature(&features.value, "maxspeed", Some(&raw), &ctx).unwrap();
    assert_eq!(score.score, 0.5);
    assert!(!score.missing);
}

#[test]
fn test_exempt_class_gets_full_credit() {
    let (_, features, _) = load();
    let scored = BTreeMap::new();
    let ctx = SegmentContext {
        metric: METRIC,
        segment_id: "way/8",
        highway_class: "footway",
        scored: &scored,
    };

    let score = score_feature(&features.value, "maxspeed", None, &ctx).unwrap();
    assert_eq!(score.score, 1.0);
    assert!(!score.missing);
}

#[test]
fn test_full_pipeline_scores() {
    let (segments, features, weights) = load();
    let scored = score_segments(&segments, &weights.value, &features.value, METRIC).unwrap();

    assert_eq!(scored.len(), segments.len());
    for s in &scored {
        assert!(s.total_score.is_finite());
        assert!((0.0..=1.0).contains(&s.total_score), "{} scored {}", s.segment.id, s.total_score);
    }

    let by_id = |id: &str| scored.iter().find(|s| s.segment.id == id).unwrap();

    // cycleway: everything at maximum
    assert!((by_id("way/5").total_score - 1.0).abs() < 1e-12);

    // missing maxspeed, but the track scored max
    assert_eq!(by_id("way/6").feature_scores["maxspeed"], 1.0);
    assert!(!by_id("way/6").is_missing("maxspeed"));

    // missing maxspeed with no override falls back
    assert_eq!(by_id("way/4").feature_scores["maxspeed"], 0.5);
    assert!(by_id("way/4").is_missing("maxspeed"));

    // numeric text and padded category
    assert_eq!(by_id("way/7").feature_scores["maxspeed"], 0.0);
    assert_eq!(by_id("way/7").feature_scores["surface"], 1.0);

    // 0.5 * (0.7 * 0.0 + 0.3 * 0.5) + 0.3 * 1.0 + 0.2 * 0.5
    let footway = by_id("way/8");
    assert!((footway.total_score - 0.475).abs() < 1e-12);
    assert_eq!(footway.missing_features(), vec!["bike_infrastructure", "lighting", "surface"]);
}

#[test]
fn test_city_index_from_fixture() {
    let (segments, features, weights) = load();
    let scored = score_segments(&segments, &weights.value, &features.value, METRIC).unwrap();
    let index = aggregate_city(&scored, weights.value.metric(METRIC).unwrap()).unwrap();

    assert_eq!(index.total_length_meters, 860.0);
    assert!((0.0..=1.0).contains(&index.score));
    assert!((index.feature_uncertainty["maxspeed"] - 110.0 / 860.0).abs() < 1e-12);
    assert!((index.feature_uncertainty["lighting"] - 180.0 / 860.0).abs() < 1e-12);
    assert!(index.total_uncertainty > 0.0);
}

#[test]
fn test_unmapped_category_fails_request() {
    let (mut segments, features, weights) = load();
    segments[0].attributes.insert("surface".into(), Some(RawValue::from("lava")));

    let err = score_segments(&segments, &weights.value, &features.value, METRIC).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("lava"));
    assert!(err.to_string().contains("way/1"));
}

#[test]
fn test_three_point_sweep_on_fixture() {
    let (segments, features, weights) = load();
    let result = sweep_sensitivity(
        &segments,
        "traffic",
        0.05,
        0.05,
        &weights.value,
        &features.value,
        METRIC,
    )
    .unwrap();

    assert_eq!(result.points.len(), 3);
    let below = result.point_at(-0.05).unwrap().city_score;
    let above = result.point_at(0.05).unwrap().city_score;
    assert!((result.local_slope - (above - below) / 0.10).abs() < 1e-9);

    let scored = score_segments(&segments, &weights.value, &features.value, METRIC).unwrap();
    let index = aggregate_city(&scored, weights.value.metric(METRIC).unwrap()).unwrap();
    assert!((result.baseline_score - index.score).abs() < 1e-9);
}

#[test]
fn test_sweep_every_group() {
    let (segments, features, weights) = load();
    let results =
        sweep_all_groups(&segments, 0.05, 0.1, &weights.value, &features.value, METRIC).unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.points.len() == 5));
}

#[test]
fn test_oversized_sweep_is_precondition_error() {
    let (segments, features, weights) = load();
    let err = sweep_sensitivity(
        &segments,
        "traffic",
        1e-30,
        0.2,
        &weights.value,
        &features.value,
        METRIC,
    )
    .unwrap_err();

    assert!(matches!(err, MetricError::InvalidSweep { .. }));
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn test_optimizer_respects_budget() {
    let (segments, features, weights) = load();
    let scored = score_segments(&segments, &weights.value, &features.value, METRIC).unwrap();

    for budget in [0.1, 0.25, 0.5] {
        let options = BudgetOptions::new(budget).with_samples(None);
        let selection = optimize_budget(&scored, &options).unwrap();
        assert!(selection.spent_km <= budget + 1e-12);
        assert!(selection.ids().all(|id| id != "way/8"), "footway must never be proposed");
    }
}

#[test]
fn test_optimizer_improvement_estimate() {
    let (segments, features, weights) = load();
    let scored = score_segments(&segments, &weights.value, &features.value, METRIC).unwrap();

    let options = BudgetOptions::new(0.3)
        .with_samples(Some(4))
        .with_seed(Some(42));
    let graph = NetworkGraph::from_segments(&scored);
    assert_eq!(graph.component_count(), 1);

    let sources = sample_sources(&graph, options.betweenness_samples, options.seed);
    let selection = optimize_graph(&graph, &sources, &options).unwrap();
    assert!(!selection.selected.is_empty());

    let improvement = estimate_improvement(&graph, &selection, &sources).unwrap();
    assert!(improvement.after <= improvement.before);
    assert!(improvement.improvement_pct >= 0.0);
}

#[test]
fn test_non_positive_budget_is_precondition_error() {
    let (segments, features, weights) = load();
    let scored = score_segments(&segments, &weights.value, &features.value, METRIC).unwrap();

    let err = optimize_budget(&scored, &BudgetOptions::new(-0.5)).unwrap_err();
    assert_eq!(err, MetricError::NonPositiveBudget { budget_km: -0.5 });
    assert_eq!(err.kind(), ErrorKind::Precondition);
}
