//! Sensitivity of the city index to one weight group's share.
//!
//! Each sweep step shifts the target group's weight, renormalizes every group
//! so the shares sum to 1, re-scores all segments and recomputes the city index.
//! Steps work on private copies of the weight hierarchy; the caller's
//! configuration is never touched.

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::city::aggregate_city;
use crate::config::{FeatureSet, WeightTree};
use crate::error::{MetricError, Result};
use crate::scoring::{FeatureScores, aggregate, score_features};
use crate::segment::{ScoredSegment, Segment};

/// Slack on `2 * delta_range / epsilon` before flooring the step count.
const STEP_COUNT_SLACK: f64 = 1e-9;

/// Largest number of points a single sweep may produce.
pub const MAX_SWEEP_STEPS: usize = 10_001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensitivityPoint {
    pub weight_delta: f64,
    /// Target group weight after clamping and renormalization.
    pub group_weight: f64,
    pub city_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityResult {
    pub metric: String,
    pub target_group: String,
    pub base_weight: f64,
    pub points: Vec<SensitivityPoint>,
    pub baseline_score: f64,
    /// Central finite difference of the city score at delta 0.
    pub local_slope: f64,
}

impl SensitivityResult {
    /// Point whose delta equals `delta` exactly.
    pub fn point_at(&self, delta: f64) -> Option<&SensitivityPoint> {
        self.points.iter().find(|p| p.weight_delta == delta)
    }
}

/// Evenly spaced deltas in `[-delta_range, +delta_range]`,
/// `floor(2 * delta_range / epsilon) + 1` of them.
///
/// With an odd count the middle delta is exactly `0.0`. Returns `None` when the
/// count is not finite or would exceed [`MAX_SWEEP_STEPS`].
pub fn sweep_deltas(epsilon: f64, delta_range: f64) -> Option<Vec<f64>> {
    let intervals = (2.0 * delta_range / epsilon + STEP_COUNT_SLACK).floor();
    if !intervals.is_finite() || intervals < 0.0 || intervals >= MAX_SWEEP_STEPS as f64 {
        return None;
    }
    let num_steps = (intervals as usize).checked_add(1)?;
    if num_steps == 1 {
        return Some(vec![-delta_range]);
    }
    let last = (num_steps - 1) as f64;
    let deltas = (0..num_steps)
        .map(|i| delta_range * ((2 * i) as f64 / last - 1.0))
        .collect();
    Some(deltas)
}

/// Sweeps `target_group`'s weight and estimates the local slope of the city score.
#[tracing::instrument(skip(segments, weights, features), fields(segments = segments.len()))]
pub fn sweep_sensitivity(
    segments: &[Segment],
    target_group: &str,
    epsilon: f64,
    delta_range: f64,
    weights: &WeightTree,
    features: &FeatureSet,
    metric: &str,
) -> Result<SensitivityResult> {
    let invalid = |reason: String| MetricError::InvalidSweep {
        group: target_group.to_string(),
        reason,
    };

    let metric_weights = weights.metric(metric)?;
    let base_weight = metric_weights
        .group(target_group)
        .ok_or_else(|| MetricError::UnknownGroup {
            group: target_group.to_string(),
            metric: metric.to_string(),
        })?
        .weight;

    if !(epsilon.is_finite() && epsilon > 0.0) {
        return Err(invalid(format!("epsilon must be positive, got {epsilon}")));
    }
    if !(delta_range.is_finite() && delta_range >= 0.0) {
        return Err(invalid(format!("delta range must be non-negative, got {delta_range}")));
    }

    let deltas = sweep_deltas(epsilon, delta_range).ok_or_else(|| {
        invalid(format!(
            "epsilon {epsilon} over delta range {delta_range} exceeds {MAX_SWEEP_STEPS} steps"
        ))
    })?;
    let baseline = deltas
        .iter()
        .position(|&d| d == 0.0)
        .ok_or_else(|| MetricError::BaselineMissing {
            group: target_group.to_string(),
        })?;
    if baseline == 0 || baseline + 1 == deltas.len() {
        return Err(invalid("needs at least one step on each side of the baseline".into()));
    }

    // Feature scores do not depend on weights; only the aggregation is redone per step.
    let names = metric_weights.feature_names();
    let feature_scores = segments
        .par_iter()
        .map(|segment| score_features(segment, features, &names, metric))
        .collect::<Result<Vec<FeatureScores>>>()?;

    let points = deltas
        .par_iter()
        .map(|&delta| {
            let perturbed = metric_weights.perturbed(metric, target_group, delta)?;
            let scored = segments
                .iter()
                .zip(&feature_scores)
                .map(|(segment, scores)| {
                    Ok::<_, MetricError>(ScoredSegment {
                        segment,
                        feature_scores: scores.scores.clone(),
                        total_score: aggregate(segment, &scores.scores, &perturbed)?,
                        missing: scores.missing.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let index = aggregate_city(&scored, &perturbed)?;
            let group_weight = perturbed.group(target_group).map_or(0.0, |g| g.weight);

            info!(
                delta,
                group = target_group,
                group_weight,
                city_score = index.score,
                "Sweep step"
            );

            Ok::<_, MetricError>(SensitivityPoint {
                weight_delta: delta,
                group_weight,
                city_score: index.score,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let below = &points[baseline - 1];
    let above = &points[baseline + 1];
    let local_slope =
        (above.city_score - below.city_score) / (above.weight_delta - below.weight_delta);
    let baseline_score = points[baseline].city_score;

    info!(
        group = target_group,
        baseline_score,
        local_slope,
        steps = points.len(),
        "Sweep complete"
    );

    Ok(SensitivityResult {
        metric: metric.to_string(),
        target_group: target_group.to_string(),
        base_weight,
        points,
        baseline_score,
        local_slope,
    })
}

/// Runs [`sweep_sensitivity`] for every group of `metric`, in group-name order.
pub fn sweep_all_groups(
    segments: &[Segment],
    epsilon: f64,
    delta_range: f64,
    weights: &WeightTree,
    features: &FeatureSet,
    metric: &str,
) -> Result<Vec<SensitivityResult>> {
    weights
        .metric(metric)?
        .group_names()
        .iter()
        .map(|group| {
            sweep_sensitivity(segments, group, epsilon, delta_range, weights, features, metric)
        })
        .collect()
}
