//! Budget-constrained upgrade planning on the street network.
//!
//! Segments become edges of an undirected graph weighted by
//! `length / max(score, 1e-3)`. Edge betweenness over that graph, divided by
//! the current score, values each edge; edges are then picked greedily by value
//! per kilometre until the budget is spent.

pub mod budget;
pub mod centrality;
pub mod graph;
pub mod improvement;
pub mod paths;

pub use budget::{
    BudgetOptions, BudgetSelection, EdgeCandidate, edge_value, rank_candidates, select_under_budget,
};
pub use centrality::edge_betweenness;
pub use graph::{EdgeData, NetworkGraph, SCORE_FLOOR};
pub use improvement::{Improvement, estimate_improvement};
pub use paths::{city_cyclability, sample_sources};

use petgraph::graph::NodeIndex;
use tracing::info;

use crate::error::{MetricError, Result};
use crate::segment::ScoredSegment;

/// Builds the graph from scored segments and selects upgrades within `options.budget_km`.
pub fn optimize_budget(
    segments: &[ScoredSegment<'_>],
    options: &BudgetOptions,
) -> Result<BudgetSelection> {
    let graph = NetworkGraph::from_segments(segments);
    let sources = sample_sources(&graph, options.betweenness_samples, options.seed);
    optimize_graph(&graph, &sources, options)
}

/// Selection on an already built graph, with betweenness accumulated from `sources`.
#[tracing::instrument(skip_all, fields(budget_km = options.budget_km, sources = sources.len()))]
pub fn optimize_graph(
    graph: &NetworkGraph,
    sources: &[NodeIndex],
    options: &BudgetOptions,
) -> Result<BudgetSelection> {
    if options.budget_km.is_nan() || options.budget_km <= 0.0 {
        return Err(MetricError::NonPositiveBudget {
            budget_km: options.budget_km,
        });
    }
    if let Some(0) = options.betweenness_samples {
        return Err(MetricError::InvalidSampleSize { samples: 0 });
    }

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        components = graph.component_count(),
        "Network graph built"
    );

    let betweenness = edge_betweenness(graph, sources);
    let candidates = rank_candidates(graph, &betweenness, options);
    let selection = select_under_budget(candidates, options.budget_km)?;

    info!(
        considered = selection.candidates_considered,
        selected = selection.selected.len(),
        spent_km = selection.spent_km,
        "Budget selection complete"
    );

    Ok(selection)
}
