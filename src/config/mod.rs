//! Scoring configuration: feature tables, weight hierarchy and document loading.
//!
//! [`FeatureSet`] maps feature names to [`FeatureConfig`] tables.
//! [`WeightTree`] holds one [`MetricWeights`] hierarchy per metric.
//! [`load_features`] / [`load_weights`] read YAML or JSON documents and attach a
//! content-derived version string.

mod document;
mod features;
mod weights;

pub use document::{Versioned, config_version, from_document, load_features, load_weights};
pub use features::{Bin, FeatureConfig, FeatureSet};
pub use weights::{MetricWeights, WEIGHT_SUM_TOLERANCE, WeightGroup, WeightTree};
