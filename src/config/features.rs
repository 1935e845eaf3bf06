//! Per-feature scoring tables.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{MetricError, Result};

/// One row of a continuous bin table. `upper_bound: None` is the unbounded last bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub upper_bound: Option<f64>,
    pub score: f64,
}

impl Bin {
    pub fn new(upper_bound: Option<f64>, score: f64) -> Self {
        Self { upper_bound, score }
    }

    #[inline]
    fn contains(&self, value: f64) -> bool {
        self.upper_bound.is_none_or(|upper| value <= upper)
    }
}

/// How a single feature turns a raw value into a score in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeatureConfig {
    /// Lookup table keyed by the normalized raw value.
    Categorical {
        mapping: BTreeMap<String, f64>,
        #[serde(default)]
        fallback: Option<f64>,
    },
    /// Ascending bin table; the first bin whose upper bound is >= the value wins.
    Continuous {
        bins: Vec<Bin>,
        #[serde(default)]
        fallback: Option<f64>,
        /// Highway classes that get full credit when the value is missing.
        #[serde(default)]
        exempt_classes: BTreeSet<String>,
        /// Phase-1 feature whose maximum score grants full credit when the value is
        /// missing.
        #[serde(default)]
        full_credit_if_max: Option<String>,
    },
}

impl FeatureConfig {
    pub fn categorical<K: Into<String>>(
        mapping: impl IntoIterator<Item = (K, f64)>,
        fallback: Option<f64>,
    ) -> Self {
        FeatureConfig::Categorical {
            mapping: mapping.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            fallback,
        }
    }

    pub fn continuous(bins: Vec<Bin>, fallback: Option<f64>) -> Self {
        FeatureConfig::Continuous {
            bins,
            fallback,
            exempt_classes: BTreeSet::new(),
            full_credit_if_max: None,
        }
    }

    /// Add contextual full-credit rules to a continuous feature. No-op for categorical ones.
    pub fn with_context<S: Into<String>>(
        mut self,
        classes: impl IntoIterator<Item = S>,
        full_credit_if_max: Option<&str>,
    ) -> Self {
        if let FeatureConfig::Continuous {
            exempt_classes,
            full_credit_if_max: dependency,
            ..
        } = &mut self
        {
            exempt_classes.extend(classes.into_iter().map(Into::into));
            *dependency = full_credit_if_max.map(str::to_string);
        }
        self
    }

    #[inline]
    pub fn fallback(&self) -> Option<f64> {
        match self {
            FeatureConfig::Categorical { fallback, .. }
            | FeatureConfig::Continuous { fallback, .. } => *fallback,
        }
    }

    /// The phase-1 feature this one reads, if any.
    #[inline]
    pub fn depends_on(&self) -> Option<&str> {
        match self {
            FeatureConfig::Categorical { .. } => None,
            FeatureConfig::Continuous {
                full_credit_if_max, ..
            } => full_credit_if_max.as_deref(),
        }
    }

    /// Highest score this feature can produce from a present value.
    pub fn max_score(&self) -> f64 {
        match self {
            FeatureConfig::Categorical { mapping, .. } => mapping
                .values()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max),
            FeatureConfig::Continuous { bins, .. } => bins
                .iter()
                .map(|b| b.score)
                .fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Score of the first bin containing `value`. `None` for categorical features.
    pub fn bin_score(&self, value: f64) -> Option<f64> {
        match self {
            FeatureConfig::Categorical { .. } => None,
            FeatureConfig::Continuous { bins, .. } => bins
                .iter()
                .find(|bin| bin.contains(value))
                .map(|bin| bin.score),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let malformed = |reason: String| MetricError::MalformedBins {
            feature: name.to_string(),
            reason,
        };

        if let Some(fallback) = self.fallback() {
            if !fallback.is_finite() {
                return Err(malformed(format!("fallback {fallback} is not finite")));
            }
        }

        match self {
            FeatureConfig::Categorical { mapping, .. } => {
                if let Some((key, score)) = mapping.iter().find(|(_, s)| !s.is_finite()) {
                    return Err(malformed(format!("mapping '{key}' has non-finite score {score}")));
                }
            }
            FeatureConfig::Continuous { bins, .. } => {
                let Some((last, bounded)) = bins.split_last() else {
                    return Err(malformed("bin table is empty".into()));
                };
                if last.upper_bound.is_some() {
                    return Err(malformed("last bin must have an unbounded upper edge".into()));
                }
                let mut previous = f64::NEG_INFINITY;
                for bin in bounded {
                    let Some(upper) = bin.upper_bound else {
                        return Err(malformed("only the last bin may be unbounded".into()));
                    };
                    if !upper.is_finite() || upper <= previous {
                        return Err(malformed(format!(
                            "upper bound {upper} is not finite or not above {previous}"
                        )));
                    }
                    previous = upper;
                }
                if let Some(bin) = bins.iter().find(|b| !b.score.is_finite()) {
                    return Err(malformed(format!("bin score {} is not finite", bin.score)));
                }
            }
        }
        Ok(())
    }

    /// Categorical keys are matched against normalized raw values.
    fn normalized(self) -> Self {
        match self {
            FeatureConfig::Categorical { mapping, fallback } => FeatureConfig::Categorical {
                mapping: mapping
                    .into_iter()
                    .map(|(k, v)| (k.trim().to_lowercase(), v))
                    .collect(),
                fallback,
            },
            other => other,
        }
    }
}

/// Validated set of feature configurations, keyed by feature name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureSet {
    features: BTreeMap<String, FeatureConfig>,
}

impl FeatureSet {
    /// Validate bin tables and dependencies, normalizing categorical keys.
    pub fn new(features: BTreeMap<String, FeatureConfig>) -> Result<Self> {
        let features = features
            .into_iter()
            .map(|(name, config)| (name, config.normalized()))
            .collect::<BTreeMap<_, _>>();

        for (name, config) in &features {
            config.validate(name)?;

            if let Some(dependency) = config.depends_on() {
                let invalid = |reason: String| MetricError::InvalidDependency {
                    feature: name.clone(),
                    reason,
                };
                let target = features
                    .get(dependency)
                    .ok_or_else(|| invalid(format!("'{dependency}' is not configured")))?;
                if dependency == name {
                    return Err(invalid("a feature cannot depend on itself".into()));
                }
                if target.depends_on().is_some() {
                    return Err(invalid(format!("'{dependency}' has a dependency of its own")));
                }
            }
        }

        Ok(Self { features })
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&FeatureConfig> {
        self.features.get(name)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureConfig)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<'de> Deserialize<'de> for FeatureSet {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let features = BTreeMap::<String, FeatureConfig>::deserialize(deserializer)?;
        FeatureSet::new(features).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed_bins() -> Vec<Bin> {
        vec![
            Bin::new(Some(30.0), 1.0),
            Bin::new(Some(50.0), 0.5),
            Bin::new(None, 0.0),
        ]
    }

    fn single(name: &str, config: FeatureConfig) -> BTreeMap<String, FeatureConfig> {
        BTreeMap::from([(name.to_string(), config)])
    }

    #[test]
    fn test_bin_boundary_resolves_to_lower_bin() {
        let config = FeatureConfig::continuous(speed_bins(), Some(0.5));
        assert_eq!(config.bin_score(30.0), Some(1.0));
        assert_eq!(config.bin_score(30.0001), Some(0.5));
        assert_eq!(config.bin_score(50.0), Some(0.5));
        assert_eq!(config.bin_score(130.0), Some(0.0));
        assert_eq!(config.bin_score(-5.0), Some(1.0));
    }

    #[test]
    fn test_max_score() {
        let config =
            FeatureConfig::categorical([("track", 1.0), ("lane", 0.7), ("none", 0.0)], None);
        assert_eq!(config.max_score(), 1.0);
        assert_eq!(FeatureConfig::continuous(speed_bins(), None).max_score(), 1.0);
    }

    #[test]
    fn test_rejects_bounded_last_bin() {
        let bins = vec![Bin::new(Some(30.0), 1.0), Bin::new(Some(50.0), 0.5)];
        let features = single("maxspeed", FeatureConfig::continuous(bins, None));
        let err = FeatureSet::new(features).unwrap_err();
        assert!(matches!(err, MetricError::MalformedBins { .. }));
    }

    #[test]
    fn test_rejects_unsorted_bins() {
        let bins = vec![
            Bin::new(Some(50.0), 0.5),
            Bin::new(Some(30.0), 1.0),
            Bin::new(None, 0.0),
        ];
        let features = single("maxspeed", FeatureConfig::continuous(bins, None));
        assert!(FeatureSet::new(features).is_err());
    }

    #[test]
    fn test_rejects_empty_bins() {
        let features = single("maxspeed", FeatureConfig::continuous(vec![], None));
        assert!(FeatureSet::new(features).is_err());
    }

    #[test]
    fn test_rejects_unknown_dependency() {
        let maxspeed = FeatureConfig::continuous(speed_bins(), Some(0.5))
            .with_context(["footway"], Some("bike_infrastructure"));
        let features = single("maxspeed", maxspeed);
        let err = FeatureSet::new(features).unwrap_err();
        assert!(matches!(err, MetricError::InvalidDependency { .. }));
    }

    #[test]
    fn test_categorical_keys_are_normalized() {
        let features = single(
            "surface",
            FeatureConfig::categorical([(" Asphalt", 1.0)], None),
        );
        let set = FeatureSet::new(features).unwrap();
        match set.get("surface").unwrap() {
            FeatureConfig::Categorical { mapping, .. } => assert!(mapping.contains_key("asphalt")),
            _ => panic!("expected categorical"),
        }
    }

    #[test]
    fn test_deserialize_tagged_document() {
        let yaml = r#"
surface:
  type: categorical
  mapping: {asphalt: 1.0, gravel: 0.4}
  fallback: 0.5
maxspeed:
  type: continuous
  bins:
    - {upper_bound: 30, score: 1.0}
    - {upper_bound: 50, score: 0.5}
    - {upper_bound: null, score: 0.0}
  fallback: 0.5
  exempt_classes: [cycleway, footway]
"#;
        let set: FeatureSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("maxspeed").unwrap().bin_score(50.0), Some(0.5));
        assert_eq!(set.get("surface").unwrap().fallback(), Some(0.5));
    }
}
