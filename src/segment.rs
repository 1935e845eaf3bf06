//! Segment records consumed by the scoring core and the scored records it produces.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw attribute value as delivered by tag normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Lookup key used by categorical tables: trimmed and lowercased.
    pub fn category_key(&self) -> String {
        match self {
            RawValue::Bool(b) => b.to_string(),
            RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            RawValue::Number(n) => n.to_string(),
            RawValue::Text(s) => s.trim().to_lowercase(),
        }
    }

    /// Numeric reading for continuous features; `None` when the value is not a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) if n.is_finite() => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::Bool(b) => write!(f, "{b}"),
            RawValue::Number(n) => write!(f, "{n}"),
            RawValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// Planar or geographic endpoint of a segment. Only used for graph topology.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Key for deduplicating graph nodes by exact coordinate equality.
    pub(crate) fn key(&self) -> (u64, u64) {
        // -0.0 and 0.0 are the same point
        let norm = |v: f64| if v == 0.0 { 0.0f64 } else { v };
        (norm(self.x).to_bits(), norm(self.y).to_bits())
    }
}

/// One road segment, already normalized into feature attributes.
///
/// An attribute key holding `None` is missing data; a key that is absent
/// altogether means the producer and the scoring configuration disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub length_meters: f64,
    pub highway_class: String,
    pub start: Coordinate,
    pub end: Coordinate,
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<RawValue>>,
}

impl Segment {
    pub fn new(
        id: impl Into<String>,
        length_meters: f64,
        highway_class: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            length_meters,
            highway_class: highway_class.into(),
            start: Coordinate::new(0.0, 0.0),
            end: Coordinate::new(0.0, 0.0),
            attributes: BTreeMap::new(),
        }
    }

    /// Set the endpoints used to place the segment in the network graph.
    pub fn with_endpoints(mut self, start: Coordinate, end: Coordinate) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Set (or clear, with `None`) a raw attribute.
    pub fn with_attribute(mut self, feature: &str, value: Option<RawValue>) -> Self {
        self.attributes.insert(feature.to_string(), value);
        self
    }
}

/// A segment with its per-feature scores, total score and data-quality flags.
///
/// Created once per scoring pass and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSegment<'a> {
    pub segment: &'a Segment,
    pub feature_scores: BTreeMap<String, f64>,
    pub total_score: f64,
    pub missing: BTreeMap<String, bool>,
}

impl ScoredSegment<'_> {
    #[inline]
    pub fn length_meters(&self) -> f64 {
        self.segment.length_meters
    }

    /// Whether `feature` fell back to its neutral value on this segment.
    #[inline]
    pub fn is_missing(&self, feature: &str) -> bool {
        self.missing.get(feature).copied().unwrap_or(false)
    }

    /// Features flagged as missing, in name order.
    pub fn missing_features(&self) -> Vec<&str> {
        self.missing
            .iter()
            .filter_map(|(name, &flag)| flag.then_some(name.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_key_normalizes() {
        assert_eq!(RawValue::from("  Asphalt ").category_key(), "asphalt");
        assert_eq!(RawValue::Number(50.0).category_key(), "50");
        assert_eq!(RawValue::Number(2.5).category_key(), "2.5");
        assert_eq!(RawValue::Bool(true).category_key(), "true");
    }

    #[test]
    fn test_as_number() {
        assert_eq!(RawValue::Number(30.0).as_number(), Some(30.0));
        assert_eq!(RawValue::from(" 50 ").as_number(), Some(50.0));
        assert_eq!(RawValue::from("walk").as_number(), None);
        assert_eq!(RawValue::Bool(false).as_number(), None);
    }

    #[test]
    fn test_segment_deserializes_null_attribute() {
        let json = r#"{
            "id": "way/1",
            "length_meters": 120.0,
            "highway_class": "residential",
            "start": {"x": 0.0, "y": 0.0},
            "end": {"x": 1.0, "y": 0.0},
            "attributes": {"maxspeed": null, "surface": "asphalt", "lanes": 2}
        }"#;
        let segment: Segment = serde_json::from_str(json).unwrap();

        assert_eq!(segment.attributes.get("maxspeed"), Some(&None));
        assert_eq!(segment.attributes.get("surface"), Some(&Some(RawValue::from("asphalt"))));
        assert_eq!(segment.attributes.get("lanes"), Some(&Some(RawValue::Number(2.0))));
        assert!(segment.name.is_none());
    }

    #[test]
    fn test_coordinate_key_treats_signed_zero_as_equal() {
        assert_eq!(Coordinate::new(0.0, 1.0).key(), Coordinate::new(-0.0, 1.0).key());
        assert_ne!(Coordinate::new(0.0, 1.0).key(), Coordinate::new(0.0, 1.5).key());
    }
}
