use petgraph::algo::dijkstra;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::debug;

use super::graph::NetworkGraph;
use crate::error::{MetricError, Result};

pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Picks `samples` distinct source nodes, or every node when `samples` is `None`
/// or not smaller than the node count. Returned in index order.
pub fn sample_sources(
    graph: &NetworkGraph,
    samples: Option<usize>,
    seed: Option<u64>,
) -> Vec<NodeIndex> {
    let n = graph.node_count();
    match samples {
        Some(k) if k < n => {
            let mut rng = make_rng(seed);
            let mut picked = rand::seq::index::sample(&mut rng, n, k).into_vec();
            picked.sort_unstable();
            debug!(sampled = k, nodes = n, "Sampled source nodes");
            picked.into_iter().map(NodeIndex::new).collect()
        }
        _ => graph.node_indices().collect(),
    }
}

/// Mean cost-weighted shortest-path distance from each source to every node it
/// reaches, excluding the source itself. Lower is better.
pub fn city_cyclability(graph: &NetworkGraph, sources: &[NodeIndex]) -> Result<f64> {
    let (total, pairs) = sources
        .par_iter()
        .map(|&source| {
            dijkstra(graph.inner(), source, None, |e| e.weight().cost)
                .into_iter()
                .filter(|(node, _)| *node != source)
                .fold((0.0, 0usize), |(total, pairs), (_, distance)| {
                    (total + distance, pairs + 1)
                })
        })
        .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    if pairs == 0 {
        return Err(MetricError::NoReachablePairs {
            sources: sources.len(),
        });
    }
    Ok(total / pairs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::graph::EdgeData;
    use crate::segment::Coordinate;

    fn line() -> NetworkGraph {
        NetworkGraph::from_edges([
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
        ])
    }

    #[test]
    fn test_city_cyclability_all_pairs() {
        let graph = line();
        let sources = sample_sources(&graph, None, None);
        // 100 + 300 + 100 + 200 + 300 + 200 over 6 ordered pairs
        assert!((city_cyclability(&graph, &sources).unwrap() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_isolated_source_has_no_pairs() {
        let graph = NetworkGraph::from_edges([(
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.0),
            EdgeData::new("loop", "residential", 10.0, 1.0),
        )]);
        let sources = sample_sources(&graph, None, None);
        assert_eq!(
            city_cyclability(&graph, &sources).unwrap_err(),
            MetricError::NoReachablePairs { sources: 1 }
        );
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let graph = NetworkGraph::from_edges((0..20).map(|i| {
            (
                Coordinate::new(i as f64, 0.0),
                Coordinate::new(i as f64 + 1.0, 0.0),
                EdgeData::new(format!("e{i}"), "residential", 10.0, 1.0),
            )
        }));

        let first = sample_sources(&graph, Some(5), Some(7));
        let second = sample_sources(&graph, Some(5), Some(7));
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(sample_sources(&graph, Some(100), Some(7)).len(), graph.node_count());
    }
}
