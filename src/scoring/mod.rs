//! Segment scoring: raw attributes -> feature scores -> weighted segment score.

pub mod aggregate;
pub mod feature;

pub use aggregate::aggregate;
pub use feature::{
    FULL_CREDIT, FeatureScore, FeatureScores, SegmentContext, score_feature, score_features,
};

use rayon::prelude::*;
use tracing::info;

use crate::config::{FeatureSet, MetricWeights, WeightTree};
use crate::error::Result;
use crate::segment::{ScoredSegment, Segment};

/// Scores one segment under the weights of a single metric.
pub fn score_segment<'a>(
    segment: &'a Segment,
    features: &FeatureSet,
    weights: &MetricWeights,
    metric: &str,
) -> Result<ScoredSegment<'a>> {
    let names = weights.feature_names();
    let FeatureScores { scores, missing } = score_features(segment, features, &names, metric)?;
    let total_score = aggregate(segment, &scores, weights)?;

    Ok(ScoredSegment {
        segment,
        feature_scores: scores,
        total_score,
        missing,
    })
}

/// Scores every segment for `metric`. Either all segments succeed or the first
/// configuration error is returned.
#[tracing::instrument(skip(segments, weights, features), fields(segments = segments.len()))]
pub fn score_segments<'a>(
    segments: &'a [Segment],
    weights: &WeightTree,
    features: &FeatureSet,
    metric: &str,
) -> Result<Vec<ScoredSegment<'a>>> {
    let metric_weights = weights.metric(metric)?;

    let scored = segments
        .par_iter()
        .map(|segment| score_segment(segment, features, metric_weights, metric))
        .collect::<Result<Vec<_>>>()?;

    let flagged = scored
        .iter()
        .filter(|s| s.missing.values().any(|&m| m))
        .count();
    info!(scored = scored.len(), with_missing_data = flagged, "Segments scored");

    Ok(scored)
}
