use petgraph::algo::connected_components;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::segment::{Coordinate, ScoredSegment};

/// Lower bound on the score used to derive traversal cost.
pub const SCORE_FLOOR: f64 = 1e-3;

/// Edge payload: one per segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeData {
    pub id: String,
    pub highway_class: String,
    pub length_meters: f64,
    pub score: f64,
    /// `length / max(score, SCORE_FLOOR)`: long, low-quality edges are expensive.
    pub cost: f64,
}

impl EdgeData {
    pub fn new(
        id: impl Into<String>,
        highway_class: impl Into<String>,
        length_meters: f64,
        score: f64,
    ) -> Self {
        Self {
            id: id.into(),
            highway_class: highway_class.into(),
            length_meters,
            score,
            cost: length_meters / score.max(SCORE_FLOOR),
        }
    }

    #[inline]
    pub fn length_km(&self) -> f64 {
        self.length_meters / 1000.0
    }

    fn upgraded(&self) -> Self {
        Self::new(self.id.clone(), self.highway_class.clone(), self.length_meters, 1.0)
    }
}

/// Undirected, cost-weighted street network.
///
/// Nodes are segment endpoints deduplicated by exact coordinate equality.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    graph: UnGraph<Coordinate, EdgeData>,
}

impl NetworkGraph {
    /// Build from explicit `(start, end, edge)` triples.
    pub fn from_edges(edges: impl IntoIterator<Item = (Coordinate, Coordinate, EdgeData)>) -> Self {
        let mut graph = UnGraph::default();
        let mut nodes: HashMap<(u64, u64), NodeIndex> = HashMap::new();

        for (start, end, data) in edges {
            let a = *nodes.entry(start.key()).or_insert_with(|| graph.add_node(start));
            let b = *nodes.entry(end.key()).or_insert_with(|| graph.add_node(end));
            graph.add_edge(a, b, data);
        }

        Self { graph }
    }

    /// One edge per scored segment, weighted by its total score.
    pub fn from_segments(segments: &[ScoredSegment<'_>]) -> Self {
        Self::from_edges(segments.iter().map(|s| {
            let segment = s.segment;
            let data = EdgeData::new(
                &segment.id,
                &segment.highway_class,
                segment.length_meters,
                s.total_score,
            );
            (segment.start, segment.end, data)
        }))
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn component_count(&self) -> usize {
        connected_components(&self.graph)
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    /// All edges with their payloads, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeIndex, &EdgeData)> {
        self.graph.edge_indices().map(move |e| (e, &self.graph[e]))
    }

    #[inline]
    pub(crate) fn inner(&self) -> &UnGraph<Coordinate, EdgeData> {
        &self.graph
    }

    /// A copy in which every edge whose id is in `ids` has score 1.0 (cost recomputed).
    ///
    /// Node and edge indices are preserved, so sampled sources stay valid.
    pub fn with_upgraded(&self, ids: &HashSet<&str>) -> NetworkGraph {
        let graph = self.graph.map(
            |_, node| *node,
            |_, edge| {
                if ids.contains(edge.id.as_str()) {
                    edge.upgraded()
                } else {
                    edge.clone()
                }
            },
        );
        Self { graph }
    }
}
