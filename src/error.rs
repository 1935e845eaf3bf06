//! Typed failures raised by the scoring core.
//!
//! Two families exist: configuration gaps, which corrupt every downstream
//! metric and must be fixed in the scoring documents, and precondition
//! violations, which are caller bugs. Missing raw attribute values are not
//! errors; they travel as the `missing` map on a scored segment.

use thiserror::Error;

/// Which side of the taxonomy an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Precondition,
}

#[derive(Debug, Error, PartialEq)]
pub enum MetricError {
    #[error("segment {segment}: value '{value}' is not mapped for categorical feature '{feature}'")]
    UnmappedCategory {
        feature: String,
        value: String,
        segment: String,
    },

    #[error("segment {segment}: value '{value}' is not numeric for continuous feature '{feature}'")]
    NonNumericValue {
        feature: String,
        value: String,
        segment: String,
    },

    #[error("segment {segment}: feature '{feature}' is missing and has no fallback configured")]
    NoFallback { feature: String, segment: String },

    #[error("feature '{feature}' is weighted in metric '{metric}' but has no scoring entry")]
    UnconfiguredFeature { feature: String, metric: String },

    #[error("segment {segment}: no attribute for weighted feature '{feature}'")]
    MissingAttribute { feature: String, segment: String },

    #[error("feature '{feature}': malformed bin table: {reason}")]
    MalformedBins { feature: String, reason: String },

    #[error("feature '{feature}': invalid dependency: {reason}")]
    InvalidDependency { feature: String, reason: String },

    #[error("metric '{metric}' is not defined in the weight tree")]
    UnknownMetric { metric: String },

    #[error("group '{group}' is not defined for metric '{metric}'")]
    UnknownGroup { group: String, metric: String },

    #[error("metric '{metric}': invalid weights: {reason}")]
    InvalidWeights { metric: String, reason: String },

    #[error("cannot aggregate an empty network (total length {total_length})")]
    EmptyNetwork { total_length: f64 },

    #[error("segment {segment}: invalid length {length}")]
    InvalidLength { segment: String, length: f64 },

    #[error("invalid sweep for group '{group}': {reason}")]
    InvalidSweep { group: String, reason: String },

    #[error("sweep for group '{group}' has no baseline point at delta 0")]
    BaselineMissing { group: String },

    #[error("budget must be positive, got {budget_km} km")]
    NonPositiveBudget { budget_km: f64 },

    #[error("no reachable node pairs from {sources} source(s)")]
    NoReachablePairs { sources: usize },

    #[error("betweenness sample size must be positive, got {samples}")]
    InvalidSampleSize { samples: usize },
}

impl MetricError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MetricError::UnmappedCategory { .. }
            | MetricError::NonNumericValue { .. }
            | MetricError::NoFallback { .. }
            | MetricError::UnconfiguredFeature { .. }
            | MetricError::MissingAttribute { .. }
            | MetricError::MalformedBins { .. }
            | MetricError::InvalidDependency { .. }
            | MetricError::UnknownMetric { .. }
            | MetricError::UnknownGroup { .. }
            | MetricError::InvalidWeights { .. } => ErrorKind::Config,

            MetricError::EmptyNetwork { .. }
            | MetricError::InvalidLength { .. }
            | MetricError::InvalidSweep { .. }
            | MetricError::BaselineMissing { .. }
            | MetricError::NonPositiveBudget { .. }
            | MetricError::NoReachablePairs { .. }
            | MetricError::InvalidSampleSize { .. } => ErrorKind::Precondition,
        }
    }
}

pub type Result<T> = std::result::Result<T, MetricError>;
