use serde::Serialize;
use std::collections::BTreeSet;

use super::graph::{NetworkGraph, SCORE_FLOOR};
use crate::error::{MetricError, Result};

pub const DEFAULT_EXCLUDED_CLASSES: [&str; 3] = ["footway", "crossing", "service"];
pub const DEFAULT_MIN_LENGTH_KM: f64 = 0.04;
pub const DEFAULT_LENGTH_FLOOR_KM: f64 = 0.05;
pub const DEFAULT_BETWEENNESS_SAMPLES: usize = 100;

/// A segment eligible for upgrade with its improvement value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeCandidate {
    pub id: String,
    pub length_km: f64,
    /// `betweenness / score`: heavily used, low-quality edges rank highest.
    pub value: f64,
    /// `value / max(length_km, length_floor_km)`.
    pub ratio: f64,
}

impl EdgeCandidate {
    pub fn new(id: impl Into<String>, length_km: f64, value: f64, length_floor_km: f64) -> Self {
        Self {
            id: id.into(),
            length_km,
            value,
            ratio: value / length_km.max(length_floor_km),
        }
    }
}

/// Candidates accepted greedily, in acceptance order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetSelection {
    pub selected: Vec<EdgeCandidate>,
    pub spent_km: f64,
    pub budget_km: f64,
    pub candidates_considered: usize,
}

impl BudgetSelection {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(|c| c.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetOptions {
    pub budget_km: f64,
    pub excluded_classes: BTreeSet<String>,
    pub min_length_km: f64,
    pub length_floor_km: f64,
    /// Betweenness source sample size; `None` runs from every node.
    pub betweenness_samples: Option<usize>,
    pub seed: Option<u64>,
}

impl BudgetOptions {
    pub fn new(budget_km: f64) -> Self {
        Self {
            budget_km,
            excluded_classes: DEFAULT_EXCLUDED_CLASSES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            min_length_km: DEFAULT_MIN_LENGTH_KM,
            length_floor_km: DEFAULT_LENGTH_FLOOR_KM,
            betweenness_samples: Some(DEFAULT_BETWEENNESS_SAMPLES),
            seed: None,
        }
    }

    pub fn with_excluded_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_min_length_km(mut self, min_length_km: f64) -> Self {
        self.min_length_km = min_length_km;
        self
    }

    pub fn with_samples(mut self, samples: Option<usize>) -> Self {
        self.betweenness_samples = samples;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

#[inline]
pub fn edge_value(betweenness: f64, score: f64) -> f64 {
    betweenness / score.max(SCORE_FLOOR)
}

/// Values every edge from its betweenness and drops ineligible ones.
///
/// An edge is dropped when its class is excluded, it is longer than the budget,
/// shorter than `min_length_km`, or has no positive value. Output keeps edge order.
pub fn rank_candidates(
    graph: &NetworkGraph,
    betweenness: &[f64],
    options: &BudgetOptions,
) -> Vec<EdgeCandidate> {
    graph
        .edges()
        .filter(|(_, edge)| !options.excluded_classes.contains(&edge.highway_class))
        .filter(|(_, edge)| {
            edge.length_km() <= options.budget_km && edge.length_km() >= options.min_length_km
        })
        .filter_map(|(index, edge)| {
            let load = betweenness.get(index.index()).copied().unwrap_or(0.0);
            let value = edge_value(load, edge.score);
            (value > 0.0).then(|| {
                EdgeCandidate::new(&edge.id, edge.length_km(), value, options.length_floor_km)
            })
        })
        .collect()
}

/// Greedy selection by ratio, descending. Equal ratios keep input order.
///
/// # Errors
///
/// [`MetricError::NonPositiveBudget`] when `budget_km <= 0`.
pub fn select_under_budget(
    mut candidates: Vec<EdgeCandidate>,
    budget_km: f64,
) -> Result<BudgetSelection> {
    if budget_km.is_nan() || budget_km <= 0.0 {
        return Err(MetricError::NonPositiveBudget { budget_km });
    }

    let candidates_considered = candidates.len();
    candidates.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));

    let mut selected = Vec::new();
    let mut spent_km = 0.0;
    for candidate in candidates {
        if spent_km + candidate.length_km <= budget_km {
            spent_km += candidate.length_km;
            selected.push(candidate);
        }
    }

    Ok(BudgetSelection {
        selected,
        spent_km,
        budget_km,
        candidates_considered,
    })
}
