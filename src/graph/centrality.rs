//! Centrality measures over the dependency graph.

use std::collections::VecDeque;

use petgraph::algo::dijkstra;
use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use tracing::warn;

use super::model::DependencyGraph;
use crate::math;

// ============================================================================
// PAGERANK
// ============================================================================
//
// Power iteration over the import graph. A file's score flows to the files
// it imports, so heavily-imported files accumulate rank.
//
//   PR(v) = (1-d)/N + d * ( Σ PR(u)/out(u) for u -> v  +  D/N )
//
// D is the total rank held by dangling nodes (no outgoing edges). It is
// redistributed uniformly so the scores keep summing to 1.
//
// Time complexity: O(iterations * (V + E))
// ============================================================================

/// PageRank scores plus a convergence report.
#[derive(Debug, Clone, Default)]
pub struct PageRankResult {
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Calculate PageRank scores for all nodes (PARALLELIZED).
///
/// Stops when the L1 change between iterations drops below `tolerance` or
/// after `max_iterations`. Never fails: a non-converged run returns the
/// last estimate with `converged = false`.
pub fn pagerank(
    graph: &DependencyGraph,
    damping: f64,
    tolerance: f64,
    max_iterations: usize,
) -> PageRankResult {
    let n = graph.node_count();
    if n == 0 {
        return PageRankResult {
            converged: true,
            ..Default::default()
        };
    }

    let nf = n as f64;
    let mut scores = vec![1.0 / nf; n];
    let base = (1.0 - damping) / nf;

    for iteration in 1..=max_iterations {
        let dangling: f64 = (0..n)
            .filter(|&v| graph.out_degree(v) == 0)
            .map(|v| scores[v])
            .sum();
        let dangling_share = damping * dangling / nf;

        let new_scores: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|v| {
                let inbound: f64 = graph
                    .predecessors(v)
                    .iter()
                    .map(|&u| scores[u] / graph.out_degree(u) as f64)
                    .sum();
                base + dangling_share + damping * inbound
            })
            .collect();

        let diff: f64 = scores
            .par_iter()
            .zip(new_scores.par_iter())
            .map(|(old, new)| (old - new).abs())
            .sum();

        scores = new_scores;

        if diff < tolerance {
            return PageRankResult {
                scores,
                iterations: iteration,
                converged: true,
            };
        }
    }

    warn!(
        "PageRank did not converge after {} iterations (tolerance {})",
        max_iterations, tolerance
    );
    PageRankResult {
        scores,
        iterations: max_iterations,
        converged: false,
    }
}

// ============================================================================
// BETWEENNESS CENTRALITY (Brandes Algorithm)
// ============================================================================
//
// How often a file lies on shortest import paths between other files.
// High betweenness = bridge between otherwise separate parts of the code.
//
//   BC(v) = Σ σ_st(v) / σ_st   for s ≠ v ≠ t
//
// One BFS per source, dependencies accumulated while unwinding the BFS order.
// Directed scores are normalised by 1/((n-1)(n-2)).
//
// Time complexity: O(V * E)
// ============================================================================

/// Betweenness centrality via Brandes' algorithm (PARALLELIZED per source).
///
/// Graphs with fewer than two nodes report all zeros.
pub fn betweenness(graph: &DependencyGraph) -> Vec<f64> {
    let n = graph.node_count();
    if n < 2 {
        return vec![0.0; n];
    }

    let partials: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|source| {
            let mut partial = vec![0.0; n];
            let mut stack: Vec<usize> = Vec::with_capacity(n);
            let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut num_paths = vec![0.0f64; n];
            let mut distance = vec![-1i64; n];
            num_paths[source] = 1.0;
            distance[source] = 0;

            let mut queue = VecDeque::new();
            queue.push_back(source);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                for &w in graph.successors(v) {
                    if distance[w] < 0 {
                        distance[w] = distance[v] + 1;
                        queue.push_back(w);
                    }
                    if distance[w] == distance[v] + 1 {
                        num_paths[w] += num_paths[v];
                        predecessors[w].push(v);
                    }
                }
            }

            let mut dependency = vec![0.0f64; n];
            while let Some(w) = stack.pop() {
                for &v in &predecessors[w] {
                    dependency[v] += (num_paths[v] / num_paths[w]) * (1.0 + dependency[w]);
                }
                if w != source {
                    partial[w] += dependency[w];
                }
            }
            partial
        })
        .collect();

    let mut scores = vec![0.0; n];
    for partial in partials {
        for (i, s) in partial.into_iter().enumerate() {
            scores[i] += s;
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for s in &mut scores {
            *s *= scale;
        }
    }
    scores
}

/// Gini coefficient of the PageRank distribution.
///
/// Above ~0.7 the topology is hub-dominated; below ~0.3 it is flat.
pub fn centrality_gini(pagerank: &[f64]) -> f64 {
    if pagerank.len() <= 1 {
        return 0.0;
    }
    math::gini(pagerank)
}

/// Hop distances from `source` along import edges. Unreachable nodes are `None`.
pub fn shortest_path_lengths(graph: &DependencyGraph, source: usize) -> Vec<Option<usize>> {
    let pg = graph.to_petgraph();
    let costs = dijkstra(&pg, NodeIndex::new(source), None, |_| 1usize);
    let mut out = vec![None; graph.node_count()];
    for (node, cost) in costs {
        out[pg[node]] = Some(cost);
    }
    out
}

/// Default entry points: files that import something but are never imported.
pub fn default_entry_points(graph: &DependencyGraph) -> Vec<usize> {
    (0..graph.node_count())
        .filter(|&v| graph.in_degree(v) == 0 && graph.out_degree(v) > 0)
        .collect()
}

/// Multi-source BFS depth from `entry_points`; `-1` marks unreachable files.
pub fn dag_depth(graph: &DependencyGraph, entry_points: &[usize]) -> Vec<i64> {
    let mut depth = vec![-1i64; graph.node_count()];
    let mut queue = VecDeque::new();
    for &ep in entry_points {
        if ep < depth.len() && depth[ep] < 0 {
            depth[ep] = 0;
            queue.push_back(ep);
        }
    }
    while let Some(v) = queue.pop_front() {
        for &w in graph.successors(v) {
            if depth[w] < 0 {
                depth[w] = depth[v] + 1;
                queue.push_back(w);
            }
        }
    }
    depth
}
