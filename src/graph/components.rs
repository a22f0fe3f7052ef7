//! Reachability structure: strongly connected components, blast radius and
//! orphan detection.

use std::collections::VecDeque;

use rayon::prelude::*;
use serde::Serialize;

use super::model::DependencyGraph;
use crate::models::Role;

const UNVISITED: usize = usize::MAX;

// ============================================================================
// TARJAN'S SCC (iterative)
// ============================================================================
//
// Classic Tarjan, but the DFS recursion is replaced by an explicit stack of
// (node, next-successor-position) frames. Import chains in large monorepos
// can be tens of thousands deep, which would overflow the native stack.
//
// Time complexity: O(V + E)
// ============================================================================

/// Partition nodes into strongly connected components.
///
/// Every node appears in exactly one component. Members of each component
/// are sorted; components are emitted in Tarjan completion order.
pub fn strongly_connected_components(graph: &DependencyGraph) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut call_stack: Vec<(usize, usize)> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        call_stack.push((root, 0));

        while let Some(frame) = call_stack.last_mut() {
            let v = frame.0;
            let successors = graph.successors(v);

            if frame.1 < successors.len() {
                let w = successors[frame.1];
                frame.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call_stack.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }

            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                components.push(component);
            }
        }
    }

    components
}

/// An import cycle: a strongly connected component with more than one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cycle {
    pub nodes: Vec<String>,
    pub internal_edges: usize,
}

/// Extract cycles from an SCC partition, largest first.
pub fn cycles(graph: &DependencyGraph, components: &[Vec<usize>]) -> Vec<Cycle> {
    let mut out: Vec<Cycle> = components
        .iter()
        .filter(|c| c.len() > 1)
        .map(|members| {
            let internal_edges = members
                .iter()
                .map(|&v| {
                    graph
                        .successors(v)
                        .iter()
                        .filter(|&&w| members.binary_search(&w).is_ok())
                        .count()
                })
                .sum();
            Cycle {
                nodes: members.iter().map(|&v| graph.path(v).to_string()).collect(),
                internal_edges,
            }
        })
        .collect();
    out.sort_by(|a, b| b.nodes.len().cmp(&a.nodes.len()).then(a.nodes.cmp(&b.nodes)));
    out
}

/// Size of the transitive importer set of every node, excluding itself
/// (PARALLELIZED per node).
///
/// A change to a file can break anything that reaches it along reverse
/// import edges.
pub fn blast_radius(graph: &DependencyGraph) -> Vec<usize> {
    let n = graph.node_count();
    (0..n)
        .into_par_iter()
        .map(|start| {
            let mut visited = vec![false; n];
            visited[start] = true;
            let mut queue = VecDeque::from([start]);
            let mut count = 0usize;
            while let Some(v) = queue.pop_front() {
                for &u in graph.predecessors(v) {
                    if !visited[u] {
                        visited[u] = true;
                        count += 1;
                        queue.push_back(u);
                    }
                }
            }
            count
        })
        .collect()
}

/// Files nobody imports whose role does not explain that.
pub fn orphans(graph: &DependencyGraph, roles: &[Role]) -> Vec<bool> {
    (0..graph.node_count())
        .map(|v| {
            let role = roles.get(v).copied().unwrap_or_default();
            graph.in_degree(v) == 0 && !role.may_be_unreferenced()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{:06}", i)).collect()
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

    fn is_partition(components: &[Vec<usize>], n: usize) -> bool {
        let mut seen = vec![0u32; n];
        for c in components {
            for &v in c {
                seen[v] += 1;
            }
        }
        seen.iter().all(|&c| c == 1)
    }

    #[test]
    fn test_three_cycle_is_one_component() {
        let g = graph(3, &[(0, 1), (1, 2), (2, 0)]);
        let sccs = strongly_connected_components(&g);
        assert_eq!(sccs, vec![vec![0, 1, 2]]);

        let cycles = cycles(&g, &sccs);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].internal_edges, 3);
    }

    #[test]
    fn test_chain_is_all_singletons() {
        let n = 50;
        let edges: Vec<_> = (0..n - 1).map(|i| (i, i + 1)).collect();
        let g = graph(n, &edges);
        let sccs = strongly_connected_components(&g);
        assert_eq!(sccs.len(), n);
        assert!(sccs.iter().all(|c| c.len() == 1));
        assert!(is_partition(&sccs, n));
        assert!(cycles(&g, &sccs).is_empty());
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let n = 100_000;
        let edges: Vec<_> = (0..n - 1).map(|i| (i, i + 1)).collect();
        let g = graph(n, &edges);
        let sccs = strongly_connected_components(&g);
        assert_eq!(sccs.len(), n);
        assert!(is_partition(&sccs, n));
    }

    #[test]
    fn test_mixed_components() {
        // {0,1} cycle, {2,3,4} cycle, 5 alone, bridge 1 -> 2
        let g = graph(6, &[(0, 1), (1, 0), (1, 2), (2, 3), (3, 4), (4, 2), (4, 5)]);
        let mut sccs = strongly_connected_components(&g);
        assert!(is_partition(&sccs, 6));
        sccs.sort();
        assert_eq!(sccs, vec![vec![0, 1], vec![2, 3, 4], vec![5]]);

        let cycles = cycles(&g, &strongly_connected_components(&g));
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].nodes.len(), 3);
    }

    #[test]
    fn test_blast_radius_excludes_self() {
        // 0 -> 1 -> 2, 3 -> 2
        let g = graph(4, &[(0, 1), (1, 2), (3, 2)]);
        assert_eq!(blast_radius(&g), vec![0, 1, 3, 0]);

        let cyc = graph(3, &[(0, 1), (1, 2), (2, 0)]);
        assert_eq!(blast_radius(&cyc), vec![2, 2, 2]);
    }

    #[test]
    fn test_orphans_respect_roles() {
        let g = graph(3, &[(0, 1)]);
        let roles = vec![Role::EntryPoint, Role::Service, Role::Model];
        assert_eq!(orphans(&g, &roles), vec![false, false, true]);
        assert_eq!(orphans(&g, &[]), vec![true, false, true]);
    }
}
