//! Louvain community detection on the undirected projection of the import
//! graph.

use rustc_hash::FxHashMap;
use serde::Serialize;

use super::model::DependencyGraph;

// ============================================================================
// LOUVAIN (Modularity-based Community Detection)
// ============================================================================
//
// Modularity of a partition:
//   Q = e_in/m - Σ_c σ_c² / (4m²)
//
// where m is the total undirected edge weight, e_in the weight inside
// communities and σ_c the degree sum of community c.
//
// Louvain:
// 1. Local moving: each node joins the neighbouring community with the
//    largest positive modularity gain, repeated until no node moves.
// 2. Coarsening: communities collapse into super-nodes (internal weight
//    becomes a self-loop) and phase 1 runs again on the smaller graph.
//
// Nodes are visited in index order, which is sorted path order at the first
// level, so the result is deterministic.
// ============================================================================

const MAX_LOCAL_PASSES: usize = 20;
const MAX_COARSEN_LEVELS: usize = 10;

/// Final partition of the graph.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommunityResult {
    /// Community id per node
    pub assignment: Vec<usize>,
    /// Sorted member lists, indexed by community id
    pub communities: Vec<Vec<usize>>,
    /// Modularity of `assignment` on the original graph
    pub modularity: f64,
}

type EdgeWeights = FxHashMap<(usize, usize), f64>;

/// Run Louvain and return the best partition found.
pub fn louvain(graph: &DependencyGraph) -> CommunityResult {
    let n = graph.node_count();
    if n == 0 {
        return CommunityResult::default();
    }

    let (orig_weights, orig_degree) = undirected_weights(graph);
    let m: f64 = orig_weights.values().sum();
    if m == 0.0 {
        return CommunityResult {
            assignment: (0..n).collect(),
            communities: (0..n).map(|v| vec![v]).collect(),
            modularity: 0.0,
        };
    }

    let mut weights = orig_weights.clone();
    let mut degree = orig_degree.clone();
    let mut level_size = n;
    let mut members: Vec<Vec<usize>> = (0..n).map(|v| vec![v]).collect();
    let mut level_assignment: Vec<usize> = (0..n).collect();

    for _ in 0..MAX_COARSEN_LEVELS {
        let (assignment, improved) = local_moving(level_size, &weights, &degree, m);
        level_assignment = assignment;
        if !improved {
            break;
        }

        let (new_weights, new_degree, groups) = coarsen(&weights, &degree, &level_assignment);
        if groups.len() == level_size {
            break;
        }

        members = groups
            .iter()
            .map(|group| {
                let mut orig: Vec<usize> = group
                    .iter()
                    .flat_map(|&node| members[node].iter().copied())
                    .collect();
                orig.sort_unstable();
                orig
            })
            .collect();
        weights = new_weights;
        degree = new_degree;
        level_size = groups.len();
        level_assignment = (0..level_size).collect();
    }

    // Map level communities back to original nodes, renumbered by id order
    let mut by_comm: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut slot: FxHashMap<usize, usize> = FxHashMap::default();
    let mut level_nodes: Vec<usize> = (0..level_size).collect();
    level_nodes.sort_by_key(|&v| level_assignment[v]);
    for v in level_nodes {
        let comm = level_assignment[v];
        let idx = *slot.entry(comm).or_insert_with(|| {
            by_comm.push((comm, Vec::new()));
            by_comm.len() - 1
        });
        by_comm[idx].1.extend(members[v].iter().copied());
    }

    let mut assignment = vec![0usize; n];
    let communities: Vec<Vec<usize>> = by_comm
        .into_iter()
        .enumerate()
        .map(|(new_id, (_, mut nodes))| {
            nodes.sort_unstable();
            for &v in &nodes {
                assignment[v] = new_id;
            }
            nodes
        })
        .collect();

    let modularity = modularity(&orig_weights, &orig_degree, &assignment, m);
    CommunityResult {
        assignment,
        communities,
        modularity,
    }
}

/// Canonical `(min, max)` undirected weights and weighted degrees.
fn undirected_weights(graph: &DependencyGraph) -> (EdgeWeights, Vec<f64>) {
    let mut weights = EdgeWeights::default();
    let mut degree = vec![0.0; graph.node_count()];
    for (src, dst) in graph.edges() {
        *weights.entry((src.min(dst), src.max(dst))).or_insert(0.0) += 1.0;
        degree[src] += 1.0;
        degree[dst] += 1.0;
    }
    (weights, degree)
}

/// Phase 1. Returns the community of every node and whether anything moved.
fn local_moving(n: usize, weights: &EdgeWeights, degree: &[f64], m: f64) -> (Vec<usize>, bool) {
    let two_m = 2.0 * m;
    let mut node_comm: Vec<usize> = (0..n).collect();
    let mut sigma_tot: Vec<f64> = degree.to_vec();

    let mut neighbors: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut sorted_edges: Vec<(&(usize, usize), &f64)> = weights.iter().collect();
    sorted_edges.sort_by_key(|(k, _)| **k);
    for (&(a, b), &w) in sorted_edges {
        neighbors[a].push((b, w));
        neighbors[b].push((a, w));
    }

    let mut any_moved = false;
    for _ in 0..MAX_LOCAL_PASSES {
        let mut moved = false;
        for node in 0..n {
            let current = node_comm[node];
            let ki = degree[node];

            let mut comm_weights: FxHashMap<usize, f64> = FxHashMap::default();
            for &(neighbor, w) in &neighbors[node] {
                *comm_weights.entry(node_comm[neighbor]).or_insert(0.0) += w;
            }
            let ki_in_current = comm_weights.get(&current).copied().unwrap_or(0.0);
            let sigma_current = sigma_tot[current] - ki;
            let remove_cost = ki_in_current / two_m - (sigma_current * ki) / (two_m * two_m);

            let mut candidates: Vec<(usize, f64)> = comm_weights.into_iter().collect();
            candidates.sort_unstable_by_key(|&(c, _)| c);

            let mut best = current;
            let mut best_gain = 0.0;
            for (comm, ki_in) in candidates {
                if comm == current {
                    continue;
                }
                let add_gain = ki_in / two_m - (sigma_tot[comm] * ki) / (two_m * two_m);
                let gain = add_gain - remove_cost;
                if gain > best_gain {
                    best_gain = gain;
                    best = comm;
                }
            }

            if best != current {
                sigma_tot[current] -= ki;
                sigma_tot[best] += ki;
                node_comm[node] = best;
                moved = true;
                any_moved = true;
            }
        }
        if !moved {
            break;
        }
    }

    (node_comm, any_moved)
}

/// Phase 2. Collapse communities into super-nodes numbered by community id
/// order. Returns the new weights, degrees and member lists.
fn coarsen(
    weights: &EdgeWeights,
    degree: &[f64],
    node_comm: &[usize],
) -> (EdgeWeights, Vec<f64>, Vec<Vec<usize>>) {
    let mut ids: Vec<usize> = node_comm.to_vec();
    ids.sort_unstable();
    ids.dedup();
    let super_of: FxHashMap<usize, usize> = ids.iter().enumerate().map(|(i, &c)| (c, i)).collect();

    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    let mut new_degree = vec![0.0; ids.len()];
    for (node, comm) in node_comm.iter().enumerate() {
        let s = super_of[comm];
        groups[s].push(node);
        new_degree[s] += degree[node];
    }

    let mut new_weights = EdgeWeights::default();
    for (&(a, b), &w) in weights {
        let sa = super_of[&node_comm[a]];
        let sb = super_of[&node_comm[b]];
        *new_weights.entry((sa.min(sb), sa.max(sb))).or_insert(0.0) += w;
    }

    (new_weights, new_degree, groups)
}

/// `Q = e_in/m − Σσ²/(4m²)` for the given assignment.
fn modularity(weights: &EdgeWeights, degree: &[f64], assignment: &[usize], m: f64) -> f64 {
    if m == 0.0 {
        return 0.0;
    }
    let e_in: f64 = weights
        .iter()
        .filter(|&(&(a, b), _)| assignment[a] == assignment[b])
        .map(|(_, w)| w)
        .sum();

    let mut sigma: FxHashMap<usize, f64> = FxHashMap::default();
    for (node, d) in degree.iter().enumerate() {
        *sigma.entry(assignment[node]).or_insert(0.0) += d;
    }
    let null_term: f64 = sigma.values().map(|s| s * s).sum::<f64>() / (4.0 * m * m);
    e_in / m - null_term
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("m{:03}", i)).collect()
    }

    fn graph(n: usize, edges: &[(usize, usize)]) -> DependencyGraph {
        let names = names(n);
        DependencyGraph::from_edges(
            names.iter().map(String::as_str),
            edges
                .iter()
                .map(|&(a, b)| (names[a].as_str(), names[b].as_str())),
        )
    }

    /// Two directed 4-cliques joined by a single edge.
    fn two_cliques() -> DependencyGraph {
        let mut edges = Vec::new();
        for base in [0, 4] {
            for i in 0..4 {
                for j in 0..4 {
                    if i < j {
                        edges.push((base + i, base + j));
                    }
                }
            }
        }
        edges.push((3, 4));
        graph(8, &edges)
    }

    #[test]
    fn test_two_cliques_split() {
        let result = louvain(&two_cliques());
        assert_eq!(result.communities.len(), 2);
        assert_eq!(result.communities[0], vec![0, 1, 2, 3]);
        assert_eq!(result.communities[1], vec![4, 5, 6, 7]);
        assert!(result.modularity > 0.3);
        for (v, &c) in result.assignment.iter().enumerate() {
            assert!(result.communities[c].contains(&v));
        }
    }

    #[test]
    fn test_no_edges_means_singletons() {
        let result = louvain(&graph(3, &[]));
        assert_eq!(result.assignment, vec![0, 1, 2]);
        assert_eq!(result.modularity, 0.0);
    }

    #[test]
    fn test_deterministic() {
        let g = two_cliques();
        let a = louvain(&g);
        let b = louvain(&g);
        assert_eq!(a.assignment, b.assignment);
        assert_eq!(a.modularity, b.modularity);
    }

    #[test]
    fn test_modularity_single_community_is_zero() {
        let g = graph(3, &[(0, 1), (1, 2), (2, 0)]);
        let (w, d) = undirected_weights(&g);
        let q = modularity(&w, &d, &[0, 0, 0], 3.0);
        assert!(q.abs() < 1e-12);
    }
}
