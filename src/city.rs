//! City-level aggregation of scored segments.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::MetricWeights;
use crate::error::{MetricError, Result};
use crate::segment::ScoredSegment;

/// Length-weighted city score with per-feature missing-data attribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityIndex {
    pub score: f64,
    /// Length fraction of the network where each feature fell back to its neutral
    /// value.
    pub feature_uncertainty: BTreeMap<String, f64>,
    /// `feature_uncertainty` weighted by each feature's effective coefficient in the metric.
    pub total_uncertainty: f64,
    pub total_length_meters: f64,
    pub segment_count: usize,
}

/// Rolls scored segments into a [`CityIndex`].
///
/// `score = sum(score_i * length_i) / sum(length_i)`, so long segments weigh more
/// than many short ones. Tracked features are those weighted by `weights`.
///
/// # Errors
///
/// Fails when any length is negative or non-finite, or when the total length is 0.
#[tracing::instrument(skip_all, fields(segments = segments.len()))]
pub fn aggregate_city(
    segments: &[ScoredSegment<'_>],
    weights: &MetricWeights,
) -> Result<CityIndex> {
    if let Some(bad) = segments
        .iter()
        .find(|s| !s.length_meters().is_finite() || s.length_meters() < 0.0)
    {
        return Err(MetricError::InvalidLength {
            segment: bad.segment.id.clone(),
            length: bad.length_meters(),
        });
    }

    let (weighted_score, total_length) = segments
        .par_iter()
        .map(|s| (s.total_score * s.length_meters(), s.length_meters()))
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));

    if total_length <= 0.0 {
        return Err(MetricError::EmptyNetwork { total_length });
    }

    let effective = weights.effective_weights();

    let feature_uncertainty = effective
        .keys()
        .map(|feature| {
            let missing_length = segments
                .par_iter()
                .filter(|s| s.is_missing(feature))
                .map(|s| s.length_meters())
                .sum::<f64>();
            (feature.clone(), missing_length / total_length)
        })
        .collect::<BTreeMap<_, _>>();

    let total_uncertainty = feature_uncertainty
        .iter()
        .map(|(feature, fraction)| fraction * effective[feature])
        .sum::<f64>();

    let score = weighted_score / total_length;
    debug!(score, total_uncertainty, total_length, "City index computed");

    Ok(CityIndex {
        score,
        feature_uncertainty,
        total_uncertainty,
        total_length_meters: total_length,
        segment_count: segments.len(),
    })
}
