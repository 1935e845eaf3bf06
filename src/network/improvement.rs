use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use super::budget::BudgetSelection;
use super::graph::NetworkGraph;
use super::paths::city_cyclability;
use crate::error::Result;

/// Network cyclability before and after upgrading a selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Improvement {
    pub before: f64,
    pub after: f64,
    /// `(before - after) / before * 100`; positive when paths got cheaper.
    pub improvement_pct: f64,
}

/// Re-runs the sampled cyclability on a copy of `graph` with every selected
/// edge set to score 1.0. `graph` is not modified.
///
/// Use the same `sources` as any earlier estimate; results from different
/// samples are not comparable.
#[tracing::instrument(skip_all, fields(selected = selection.selected.len()))]
pub fn estimate_improvement(
    graph: &NetworkGraph,
    selection: &BudgetSelection,
    sources: &[NodeIndex],
) -> Result<Improvement> {
    let before = city_cyclability(graph, sources)?;

    let ids = selection.ids().collect::<HashSet<_>>();
    let upgraded = graph.with_upgraded(&ids);
    let after = city_cyclability(&upgraded, sources)?;

    let improvement_pct = if before > 0.0 {
        (before - after) / before * 100.0
    } else {
        warn!("Baseline cyclability is zero, improvement undefined");
        0.0
    };

    info!(
        before,
        after,
        improvement_pct,
        sources = sources.len(),
        "Estimated improvement (sampling dependent)"
    );

    Ok(Improvement {
        before,
        after,
        improvement_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::budget::EdgeCandidate;
    use crate::network::graph::EdgeData;
    use crate::network::paths::sample_sources;
    use crate::segment::Coordinate;

    #[test]
    fn test_upgrading_cuts_costs() {
        let graph = NetworkGraph::from_edges([
            (
                Coordinate::new(0.0, 0.0),
                Coordinate::new(1.0, 0.0),
                EdgeData::new("ab", "residential", 100.0, 1.0),
            ),
            (
                Coordinate::new(1.0, 0.0),
                Coordinate::new(2.0, 0.0),
                EdgeData::new("bc", "residential", 100.0, 0.5),
            ),
        ]);
        let sources = sample_sources(&graph, None, None);
        let selection = BudgetSelection {
            selected: vec![EdgeCandidate::new("bc", 0.1, 1.0, 0.05)],
            spent_km: 0.1,
            budget_km: 0.1,
            candidates_considered: 1,
        };

        let improvement = estimate_improvement(&graph, &selection, &sources).unwrap();
        assert!((improvement.before - 200.0).abs() < 1e-9);
        assert!((improvement.after - 800.0 / 6.0).abs() < 1e-9);
        assert!((improvement.improvement_pct - 100.0 / 3.0).abs() < 1e-9);

        // the input graph keeps its original costs
        assert!(graph.edges().any(|(_, e)| e.cost == 200.0));
    }

    #[test]
    fn test_empty_selection_changes_nothing() {
        let graph = NetworkGraph::from_edges([(
            Coordinate::new(0.0, 0.0),
            Coordinate::new(1.0, 0.0),
            EdgeData::new("ab", "residential", 100.0, 0.5),
        )]);
        let sources = sample_sources(&graph, None, None);

        let improvement =
            estimate_improvement(&graph, &BudgetSelection::default(), &sources).unwrap();
        assert_eq!(improvement.before, improvement.after);
        assert_eq!(improvement.improvement_pct, 0.0);
    }
}
