//! Sampled edge betweenness on the cost-weighted graph (Brandes accumulation).

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::graph::NetworkGraph;

/// Relative tolerance when comparing path lengths for ties.
const TIE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    node: usize,
    distance: f64,
}

// Reversed so BinaryHeap pops the nearest node first.
impl Ord for QueueEntry {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

#[inline]
fn ties(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Shortest-path DAG from one source.
struct ShortestPaths {
    /// Nodes in order of non-decreasing distance.
    order: Vec<usize>,
    sigma: Vec<f64>,
    /// `(predecessor node, edge index)` on every shortest path.
    preds: Vec<Vec<(usize, usize)>>,
}

fn shortest_paths(graph: &NetworkGraph, source: usize) -> ShortestPaths {
    let inner = graph.inner();
    let n = inner.node_count();
    let mut distance = vec![f64::INFINITY; n];
    let mut settled = vec![false; n];
    let mut sigma = vec![0.0; n];
    let mut preds: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    let mut order = Vec::with_capacity(n);
    let mut heap = BinaryHeap::new();

    distance[source] = 0.0;
    sigma[source] = 1.0;
    heap.push(QueueEntry {
        node: source,
        distance: 0.0,
    });

    while let Some(QueueEntry { node, distance: d }) = heap.pop() {
        if settled[node] || d > distance[node] {
            continue;
        }
        settled[node] = true;
        order.push(node);

        for edge in inner.edges(NodeIndex::new(node)) {
            let next = if edge.source().index() == node {
                edge.target().index()
            } else {
                edge.source().index()
            };
            if next == node || settled[next] {
                continue;
            }
            let candidate = d + edge.weight().cost;
            if distance[next].is_finite() && ties(candidate, distance[next]) {
                sigma[next] += sigma[node];
                preds[next].push((node, edge.id().index()));
            } else if candidate < distance[next] {
                distance[next] = candidate;
                sigma[next] = sigma[node];
                preds[next] = vec![(node, edge.id().index())];
                heap.push(QueueEntry {
                    node: next,
                    distance: candidate,
                });
            }
        }
    }

    ShortestPaths {
        order,
        sigma,
        preds,
    }
}

fn accumulate(graph: &NetworkGraph, source: usize) -> Vec<f64> {
    let ShortestPaths { order, sigma, preds } = shortest_paths(graph, source);
    let mut dependency = vec![0.0; graph.node_count()];
    let mut edge_score = vec![0.0; graph.edge_count()];

    for &w in order.iter().rev() {
        for &(v, e) in &preds[w] {
            let share = sigma[v] / sigma[w] * (1.0 + dependency[w]);
            edge_score[e] += share;
            dependency[v] += share;
        }
    }
    edge_score
}

/// Edge betweenness indexed by edge index, accumulated from `sources` only.
///
/// Normalized by `1 / (n (n - 1))` and scaled by `n / k` when `k < n`
/// sources are used, so sampled values estimate the exact ones.
pub fn edge_betweenness(graph: &NetworkGraph, sources: &[NodeIndex]) -> Vec<f64> {
    let n = graph.node_count();
    let m = graph.edge_count();

    let mut scores = sources
        .par_iter()
        .map(|s| accumulate(graph, s.index()))
        .reduce(
            || vec![0.0; m],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        );

    if n > 1 && !sources.is_empty() {
        let mut scale = 1.0 / (n * (n - 1)) as f64;
        if sources.len() < n {
            scale *= n as f64 / sources.len() as f64;
        }
        scores.iter_mut().for_each(|s| *s *= scale);
    }
    scores
}
