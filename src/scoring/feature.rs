//! Raw attribute value -> per-feature score in [0, 1].
//!
//! Scoring runs in two explicit phases. Phase 1 covers features that read only
//! their own raw value. Phase 2 covers features whose missing-value rule reads a
//! phase-1 result (`full_credit_if_max`); the phase-1 scores are handed over in
//! [`SegmentContext::scored`] rather than relying on map iteration order.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{FeatureConfig, FeatureSet};
use crate::error::{MetricError, Result};
use crate::segment::{RawValue, Segment};

/// Score granted by the contextual overrides for missing values.
pub const FULL_CREDIT: f64 = 1.0;

/// Slack when testing whether a dependency reached its maximum score.
const MAX_SCORE_EPSILON: f64 = 1e-12;

/// What the scorer may see about the segment beyond the raw value.
#[derive(Debug, Clone, Copy)]
pub struct SegmentContext<'a> {
    pub metric: &'a str,
    pub segment_id: &'a str,
    pub highway_class: &'a str,
    /// Phase-1 scores already computed for this segment.
    pub scored: &'a BTreeMap<String, f64>,
}

/// A single feature's score and whether it fell back to the neutral value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureScore {
    pub score: f64,
    pub missing: bool,
}

impl FeatureScore {
    #[inline]
    fn present(score: f64) -> Self {
        Self {
            score,
            missing: false,
        }
    }

    #[inline]
    fn fallback(score: f64) -> Self {
        Self {
            score,
            missing: true,
        }
    }
}

/// All feature scores of one segment for one metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureScores {
    pub scores: BTreeMap<String, f64>,
    pub missing: BTreeMap<String, bool>,
}

/// Scores `feature` for one segment.
///
/// Categorical values are normalized and looked up; an unmapped value is a
/// configuration gap and fails. Continuous values resolve to the first bin whose
/// upper bound is >= the value. A missing value gets, in order: full credit when
/// the segment class is exempt, full credit when the dependency feature scored its
/// maximum, otherwise the configured fallback (flagged as missing).
pub fn score_feature(
    features: &FeatureSet,
    feature: &str,
    raw: Option<&RawValue>,
    ctx: &SegmentContext<'_>,
) -> Result<FeatureScore> {
    let config = features.get(feature).ok_or_else(|| MetricError::UnconfiguredFeature {
        feature: feature.to_string(),
        metric: ctx.metric.to_string(),
    })?;

    match (config, raw) {
        (FeatureConfig::Categorical { mapping, .. }, Some(value)) => {
            let key = value.category_key();
            mapping
                .get(&key)
                .map(|&score| FeatureScore::present(score))
                .ok_or_else(|| MetricError::UnmappedCategory {
                    feature: feature.to_string(),
                    value: key,
                    segment: ctx.segment_id.to_string(),
                })
        }
        (FeatureConfig::Continuous { .. }, Some(value)) => {
            let number = value.as_number().ok_or_else(|| MetricError::NonNumericValue {
                feature: feature.to_string(),
                value: value.to_string(),
                segment: ctx.segment_id.to_string(),
            })?;
            // Validated tables always end in an unbounded bin.
            config
                .bin_score(number)
                .map(FeatureScore::present)
                .ok_or_else(|| MetricError::MalformedBins {
                    feature: feature.to_string(),
                    reason: format!("no bin contains {number}"),
                })
        }
        (
            FeatureConfig::Continuous {
                exempt_classes,
                full_credit_if_max,
                ..
            },
            None,
        ) => {
            if exempt_classes.contains(ctx.highway_class) {
                return Ok(FeatureScore::present(FULL_CREDIT));
            }
            if let Some(dependency) = full_credit_if_max {
                if dependency_at_max(features, dependency, ctx) {
                    return Ok(FeatureScore::present(FULL_CREDIT));
                }
            }
            neutral_fallback(config, feature, ctx)
        }
        (FeatureConfig::Categorical { .. }, None) => neutral_fallback(config, feature, ctx),
    }
}

fn dependency_at_max(features: &FeatureSet, dependency: &str, ctx: &SegmentContext<'_>) -> bool {
    let (Some(score), Some(config)) = (ctx.scored.get(dependency), features.get(dependency))
    else {
        return false;
    };
    *score >= config.max_score() - MAX_SCORE_EPSILON
}

fn neutral_fallback(
    config: &FeatureConfig,
    feature: &str,
    ctx: &SegmentContext<'_>,
) -> Result<FeatureScore> {
    config
        .fallback()
        .map(FeatureScore::fallback)
        .ok_or_else(|| MetricError::NoFallback {
            feature: feature.to_string(),
            segment: ctx.segment_id.to_string(),
        })
}

/// Scores every feature in `names` for `segment`, phase 1 first, then phase 2.
///
/// A name without a configuration, or without an attribute key on the segment,
/// is a configuration mismatch.
pub fn score_features(
    segment: &Segment,
    features: &FeatureSet,
    names: &BTreeSet<&str>,
    metric: &str,
) -> Result<FeatureScores> {
    let mut phase_one = Vec::new();
    let mut phase_two = Vec::new();
    for &name in names {
        let config = features.get(name).ok_or_else(|| MetricError::UnconfiguredFeature {
            feature: name.to_string(),
            metric: metric.to_string(),
        })?;
        match config.depends_on() {
            None => phase_one.push(name),
            Some(dependency) => {
                if !names.contains(dependency) {
                    return Err(MetricError::InvalidDependency {
                        feature: name.to_string(),
                        reason: format!("'{dependency}' is not scored by metric '{metric}'"),
                    });
                }
                phase_two.push(name);
            }
        }
    }

    let mut result = FeatureScores::default();
    for phase in [phase_one, phase_two] {
        // Phase-2 features read the phase-1 scores through the context.
        let scored = result.scores.clone();
        let ctx = SegmentContext {
            metric,
            segment_id: &segment.id,
            highway_class: &segment.highway_class,
            scored: &scored,
        };
        for name in phase {
            let raw = segment
                .attributes
                .get(name)
                .ok_or_else(|| MetricError::MissingAttribute {
                    feature: name.to_string(),
                    segment: segment.id.clone(),
                })?;
            let FeatureScore { score, missing } =
                score_feature(features, name, raw.as_ref(), &ctx)?;
            result.scores.insert(name.to_string(), score);
            result.missing.insert(name.to_string(), missing);
        }
    }

    Ok(result)
}
