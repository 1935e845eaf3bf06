//! Two-level weight hierarchy: group weight within a metric, feature weight
//! within a group.
//!
//! Group weights of a metric sum to 1. Feature weights inside a group are free
//! linear coefficients and are not renormalized.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{MetricError, Result};

/// Tolerance on the sum of group weights.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightGroup {
    pub weight: f64,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

impl WeightGroup {
    pub fn new<K: Into<String>>(
        weight: f64,
        features: impl IntoIterator<Item = (K, f64)>,
    ) -> Self {
        Self {
            weight,
            features: features.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Groups of one metric, keyed by group name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricWeights {
    groups: BTreeMap<String, WeightGroup>,
}

impl MetricWeights {
    pub fn new<K: Into<String>>(groups: impl IntoIterator<Item = (K, WeightGroup)>) -> Self {
        Self {
            groups: groups.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &WeightGroup)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn group(&self, name: &str) -> Option<&WeightGroup> {
        self.groups.get(name)
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn group_weight_sum(&self) -> f64 {
        self.groups.values().map(|g| g.weight).sum()
    }

    /// Every feature referenced by any group.
    pub fn feature_names(&self) -> BTreeSet<&str> {
        self.groups
            .values()
            .flat_map(|g| g.features.keys().map(String::as_str))
            .collect()
    }

    /// Total linear coefficient of each feature in the metric:
    /// in-group weight times group weight, summed over the groups it appears in.
    pub fn effective_weights(&self) -> BTreeMap<String, f64> {
        let mut effective = BTreeMap::new();
        for group in self.groups.values() {
            for (feature, weight) in &group.features {
                *effective.entry(feature.clone()).or_insert(0.0) += weight * group.weight;
            }
        }
        effective
    }

    /// A renormalized copy with `group`'s weight shifted by `delta` and clamped to [0, 1].
    ///
    /// Every group weight is then scaled by `1 / sum` so the copy sums to 1.
    pub fn perturbed(&self, metric: &str, group: &str, delta: f64) -> Result<MetricWeights> {
        let base = self.group(group).ok_or_else(|| MetricError::UnknownGroup {
            group: group.to_string(),
            metric: metric.to_string(),
        })?;

        let mut copy = self.clone();
        if let Some(target) = copy.groups.get_mut(group) {
            target.weight = (base.weight + delta).clamp(0.0, 1.0);
        }

        let total = copy.group_weight_sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(MetricError::InvalidWeights {
                metric: metric.to_string(),
                reason: format!(
                    "group weights sum to {total} after shifting '{group}' by {delta:+}"
                ),
            });
        }
        copy.groups.values_mut().for_each(|g| g.weight /= total);
        Ok(copy)
    }

    pub(crate) fn validate(&self, metric: &str) -> Result<()> {
        let invalid = |reason: String| MetricError::InvalidWeights {
            metric: metric.to_string(),
            reason,
        };

        if self.groups.is_empty() {
            return Err(invalid("no groups defined".into()));
        }
        for (name, group) in &self.groups {
            if !group.weight.is_finite() || group.weight < 0.0 {
                return Err(invalid(format!("group '{name}' has weight {}", group.weight)));
            }
            if let Some((feature, w)) = group.features.iter().find(|(_, w)| !w.is_finite()) {
                return Err(invalid(format!(
                    "feature '{feature}' in group '{name}' has weight {w}"
                )));
            }
        }
        let total = self.group_weight_sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(invalid(format!("group weights sum to {total}, expected 1")));
        }
        Ok(())
    }
}

/// Weight hierarchies for every metric, keyed by metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightTree {
    metrics: BTreeMap<String, MetricWeights>,
}

impl WeightTree {
    pub fn new<K: Into<String>>(
        metrics: impl IntoIterator<Item = (K, MetricWeights)>,
    ) -> Result<Self> {
        let tree = Self {
            metrics: metrics.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };
        for (name, weights) in &tree.metrics {
            weights.validate(name)?;
        }
        Ok(tree)
    }

    pub fn metric(&self, name: &str) -> Result<&MetricWeights> {
        self.metrics
            .get(name)
            .ok_or_else(|| MetricError::UnknownMetric {
                metric: name.to_string(),
            })
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }
}

impl<'de> Deserialize<'de> for WeightTree {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let metrics = BTreeMap::<String, MetricWeights>::deserialize(deserializer)?;
        WeightTree::new(metrics).map_err(serde::de::Error::custom)
    }
}
