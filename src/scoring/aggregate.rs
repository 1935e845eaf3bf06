use std::collections::BTreeMap;

use crate::config::MetricWeights;
use crate::error::{MetricError, Result};
use crate::segment::Segment;

/// Combines per-feature scores into one segment score.
///
/// For each group, `group_score = sum(feature_score * feature_weight)`; the
/// segment score is `sum(group_score * group_weight)`. The result is not clamped:
/// configurations whose weights exceed the unit simplex can leave [0, 1].
pub fn aggregate(
    segment: &Segment,
    feature_scores: &BTreeMap<String, f64>,
    weights: &MetricWeights,
) -> Result<f64> {
    let mut total_score = 0.0;

    for (_, group) in weights.groups() {
        let mut group_score = 0.0;
        for (feature, weight) in &group.features {
            let score = feature_scores
                .get(feature)
                .ok_or_else(|| MetricError::MissingAttribute {
                    feature: feature.clone(),
                    segment: segment.id.clone(),
                })?;
            group_score += score * weight;
        }
        total_score += group_score * group.weight;
    }

    Ok(total_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightGroup;

    fn weights() -> MetricWeights {
        MetricWeights::new([
            (
                "infrastructure",
                WeightGroup::new(0.5, [("bike_infrastructure", 0.6), ("surface", 0.4)]),
            ),
            ("traffic", WeightGroup::new(0.5, [("maxspeed", 1.0)])),
        ])
    }

    #[test]
    fn test_two_level_weighting() {
        let segment = Segment::new("way/1", 10.0, "residential");
        let scores = BTreeMap::from([
            ("bike_infrastructure".to_string(), 1.0),
            ("surface".to_string(), 0.5),
            ("maxspeed".to_string(), 0.0),
        ]);

        let total = aggregate(&segment, &scores, &weights()).unwrap();
        // 0.5 * (0.6 + 0.2) + 0.5 * 0.0
        assert!((total - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_missing_feature_score_is_fatal() {
        let segment = Segment::new("way/2", 10.0, "residential");
        let scores = BTreeMap::from([("maxspeed".to_string(), 1.0)]);

        let err = aggregate(&segment, &scores, &weights()).unwrap_err();
        assert!(matches!(err, MetricError::MissingAttribute { .. }));
    }

    #[test]
    fn test_unnormalized_feature_weights_are_not_rescaled() {
        let segment = Segment::new("way/3", 10.0, "residential");
        let only = WeightGroup::new(1.0, [("a", 0.8), ("b", 0.8)]);
        let weights = MetricWeights::new([("only", only)]);
        let scores = BTreeMap::from([("a".to_string(), 1.0), ("b".to_string(), 1.0)]);

        let total = aggregate(&segment, &scores, &weights).unwrap();
        assert!((total - 1.6).abs() < 1e-12);
    }
}
