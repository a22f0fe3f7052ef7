//! Spectral summary of the undirected dependency structure.
//!
//! The graph Laplacian `L = D − A` is built over the undirected projection
//! (binary adjacency) and decomposed densely. Its spectrum gives:
//! - the number of connected components (count of ~zero eigenvalues),
//! - the Fiedler value λ2 (algebraic connectivity; 0 when disconnected),
//! - the spectral gap, the ratio of the two smallest non-zero eigenvalues.

use nalgebra::DMatrix;
use serde::Serialize;
use tracing::{debug, info};

use super::model::DependencyGraph;

/// Eigenvalues with magnitude below this are treated as zero.
pub const ZERO_EIGENVALUE_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpectralSummary {
    /// Laplacian eigenvalues, ascending
    pub eigenvalues: Vec<f64>,
    pub num_components: usize,
    pub fiedler_value: f64,
    /// λ2 of the largest connected component (equals `fiedler_value` when connected)
    pub fiedler_largest_component: f64,
    pub spectral_gap: f64,
}

/// Compute the spectral summary, or `None` when the graph has fewer than
/// two nodes or more than `max_nodes`.
pub fn spectral_summary(graph: &DependencyGraph, max_nodes: usize) -> Option<SpectralSummary> {
    let n = graph.node_count();
    if n < 2 {
        return None;
    }
    if n > max_nodes {
        info!(
            "Skipping spectral analysis: {} nodes exceeds limit of {}",
            n, max_nodes
        );
        return None;
    }

    let all: Vec<usize> = (0..n).collect();
    let eigenvalues = laplacian_eigenvalues(graph, &all);

    let num_components = eigenvalues
        .iter()
        .filter(|ev| ev.abs() < ZERO_EIGENVALUE_TOLERANCE)
        .count();

    let fiedler_value = if num_components <= 1 {
        eigenvalues.get(1).copied().unwrap_or(0.0).max(0.0)
    } else {
        0.0
    };

    let fiedler_largest_component = if num_components <= 1 {
        fiedler_value
    } else {
        let largest = largest_component(graph);
        if largest.len() < 3 {
            0.0
        } else {
            laplacian_eigenvalues(graph, &largest)
                .get(1)
                .copied()
                .unwrap_or(0.0)
                .max(0.0)
        }
    };

    let non_zero: Vec<f64> = eigenvalues
        .iter()
        .copied()
        .filter(|&ev| ev > ZERO_EIGENVALUE_TOLERANCE)
        .collect();
    let spectral_gap = if non_zero.len() >= 2 && non_zero[1] > 0.0 {
        non_zero[0] / non_zero[1]
    } else {
        0.0
    };

    debug!(
        "Spectral analysis: fiedler={:.4}, components={}, gap={:.4}",
        fiedler_value, num_components, spectral_gap
    );

    Some(SpectralSummary {
        eigenvalues,
        num_components,
        fiedler_value,
        fiedler_largest_component,
        spectral_gap,
    })
}

/// Ascending Laplacian eigenvalues of the subgraph induced by `nodes`
/// (sorted node indices).
fn laplacian_eigenvalues(graph: &DependencyGraph, nodes: &[usize]) -> Vec<f64> {
    let k = nodes.len();
    let mut laplacian = DMatrix::<f64>::zeros(k, k);

    for (i, &v) in nodes.iter().enumerate() {
        for w in graph.undirected_neighbors(v) {
            if let Ok(j) = nodes.binary_search(&w) {
                laplacian[(i, j)] = -1.0;
            }
        }
    }
    for i in 0..k {
        let degree: f64 = (0..k).filter(|&j| j != i).map(|j| -laplacian[(i, j)]).sum();
        laplacian[(i, i)] = degree;
    }

    let mut eigenvalues: Vec<f64> = laplacian.symmetric_eigenvalues().iter().copied().collect();
    eigenvalues.sort_by(f64::total_cmp);
    eigenvalues
}

/// Nodes of the largest weakly connected component, sorted. Ties go to the
/// component containing the smallest index.
fn largest_component(graph: &DependencyGraph) -> Vec<usize> {
    let n = graph.node_count();
    let mut seen = vec![false; n];
    let mut best: Vec<usize> = Vec::new();

    for start in 0..n {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut component = vec![start];
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            for w in graph.undirected_neighbors(v) {
                if !seen[w] {
                    seen[w] = true;
                    component.push(w);
                    stack.push(w);
                }
            }
        }
        if component.len() > best.len() {
            component.sort_unstable();
            best = component;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn graph(n: usize, edges: &[(usize, usize)]) -> DependencyGraph {
        let names: Vec<String> = (0..n).map(|i| format!("s{:03}", i)).collect();
        DependencyGraph::from_edges(
            names.iter().map(String::as_str),
            edges
                .iter()
                .map(|&(a, b)| (names[a].as_str(), names[b].as_str())),
        )
    }

    #[test]
    fn test_path_of_three() {
        // Undirected P3 Laplacian eigenvalues: 0, 1, 3
        let s = spectral_summary(&graph(3, &[(0, 1), (1, 2)]), 100).unwrap();
        assert_eq!(s.num_components, 1);
        assert!(approx_eq(s.eigenvalues[0], 0.0));
        assert!(approx_eq(s.fiedler_value, 1.0));
        assert!(approx_eq(s.spectral_gap, 1.0 / 3.0));
        assert!(approx_eq(s.fiedler_largest_component, 1.0));
    }

    #[test]
    fn test_disconnected_counts_components() {
        // Triangle plus an isolated edge plus an isolated node
        let g = graph(6, &[(0, 1), (1, 2), (2, 0), (3, 4)]);
        let s = spectral_summary(&g, 100).unwrap();
        assert_eq!(s.num_components, 3);
        assert_eq!(s.fiedler_value, 0.0);
        // K3 Laplacian has eigenvalues 0, 3, 3
        assert!(approx_eq(s.fiedler_largest_component, 3.0));
    }

    #[test]
    fn test_reciprocal_edges_count_once() {
        let a = spectral_summary(&graph(2, &[(0, 1)]), 100).unwrap();
        let b = spectral_summary(&graph(2, &[(0, 1), (1, 0)]), 100).unwrap();
        assert_eq!(a.eigenvalues.len(), 2);
        assert!(approx_eq(a.eigenvalues[1], 2.0));
        assert!(approx_eq(b.eigenvalues[1], 2.0));
    }

    #[test]
    fn test_skips_tiny_and_oversized() {
        assert!(spectral_summary(&graph(1, &[]), 100).is_none());
        assert!(spectral_summary(&graph(5, &[(0, 1)]), 4).is_none());
    }
}
