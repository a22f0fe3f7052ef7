//! File-level dependency graph.
//!
//! Nodes are file paths stored in sorted order so that every algorithm that
//! iterates over node indices is deterministic across runs. Edges are
//! resolved imports only.

use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::FileMetrics;

/// Directed import graph over the analysed file set.
///
/// Invariants: no self-loops, no duplicate edges, every edge endpoint is a
/// node. Imports that resolve outside the file set are counted as
/// unresolved (phantom) on the importing file.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    index: FxHashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
    reverse: Vec<Vec<usize>>,
    unresolved: Vec<usize>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Build the graph from scanner output.
    pub fn build(files: &[FileMetrics]) -> Self {
        let mut graph = Self::with_nodes(files.iter().map(|f| f.path.as_str()));

        for file in files {
            let Some(src) = graph.index_of(&file.path) else {
                continue;
            };
            for import in &file.imports {
                match import.resolved.as_deref() {
                    Some(target) if target == file.path => {}
                    Some(target) => match graph.index_of(target) {
                        Some(dst) => graph.push_edge(src, dst),
                        None => graph.unresolved[src] += 1,
                    },
                    None => graph.unresolved[src] += 1,
                }
            }
        }

        graph.finish();
        graph
    }

    /// Build a graph from explicit node and edge lists.
    ///
    /// Edges naming unknown nodes are ignored, as are self-loops.
    pub fn from_edges<'a, N, E>(nodes: N, edges: E) -> Self
    where
        N: IntoIterator<Item = &'a str>,
        E: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut graph = Self::with_nodes(nodes);
        for (src, dst) in edges {
            if let (Some(s), Some(d)) = (graph.index_of(src), graph.index_of(dst)) {
                if s != d {
                    graph.push_edge(s, d);
                }
            }
        }
        graph.finish();
        graph
    }

    fn with_nodes<'a>(nodes: impl IntoIterator<Item = &'a str>) -> Self {
        let unique: FxHashSet<&str> = nodes.into_iter().collect();
        let mut nodes: Vec<String> = unique.into_iter().map(str::to_string).collect();
        nodes.sort();

        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), i))
            .collect();
        let n = nodes.len();
        Self {
            nodes,
            index,
            adjacency: vec![Vec::new(); n],
            reverse: vec![Vec::new(); n],
            unresolved: vec![0; n],
            edge_count: 0,
        }
    }

    fn push_edge(&mut self, src: usize, dst: usize) {
        self.adjacency[src].push(dst);
    }

    /// Sort and dedupe adjacency, then derive the reverse lists.
    fn finish(&mut self) {
        for targets in &mut self.adjacency {
            targets.sort_unstable();
            targets.dedup();
        }
        self.reverse = vec![Vec::new(); self.nodes.len()];
        for (src, targets) in self.adjacency.iter().enumerate() {
            for &dst in targets {
                self.reverse[dst].push(src);
            }
        }
        self.edge_count = self.adjacency.iter().map(Vec::len).sum();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node paths in index order (sorted).
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn path(&self, node: usize) -> &str {
        &self.nodes[node]
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    /// Files imported by `node`, sorted.
    pub fn successors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    /// Files importing `node`, sorted.
    pub fn predecessors(&self, node: usize) -> &[usize] {
        &self.reverse[node]
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.reverse[node].len()
    }

    /// Number of unresolved imports recorded for `node`.
    pub fn phantom_count(&self, node: usize) -> usize {
        self.unresolved[node]
    }

    pub fn has_edge(&self, src: usize, dst: usize) -> bool {
        self.adjacency[src].binary_search(&dst).is_ok()
    }

    /// All edges as `(src, dst)` index pairs, in sorted order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(src, targets)| targets.iter().map(move |&dst| (src, dst)))
    }

    /// Neighbours in either direction, sorted and deduplicated.
    pub fn undirected_neighbors(&self, node: usize) -> Vec<usize> {
        let mut all: Vec<usize> = self.adjacency[node]
            .iter()
            .chain(self.reverse[node].iter())
            .copied()
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }

    /// Convert to a petgraph `DiGraph` whose node weights are our indices.
    pub fn to_petgraph(&self) -> DiGraph<usize, ()> {
        let mut g = DiGraph::with_capacity(self.node_count(), self.edge_count);
        for i in 0..self.node_count() {
            g.add_node(i);
        }
        for (src, dst) in self.edges() {
            g.add_edge(NodeIndex::new(src), NodeIndex::new(dst), ());
        }
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImportRef;

    fn file(path: &str, imports: Vec<ImportRef>) -> FileMetrics {
        FileMetrics {
            imports,
            ..FileMetrics::new(path)
        }
    }

    #[test]
    fn test_build_dedupes_and_drops_self_loops() {
        let files = vec![
            file(
                "b.py",
                vec![
                    ImportRef::resolved("a", "a.py"),
                    ImportRef::resolved("a", "a.py"),
                    ImportRef::resolved("b", "b.py"),
                ],
            ),
            file("a.py", vec![]),
        ];
        let g = DependencyGraph::build(&files);

        assert_eq!(g.nodes(), &["a.py".to_string(), "b.py".to_string()]);
        assert_eq!(g.edge_count(), 1);
        let a = g.index_of("a.py").unwrap();
        let b = g.index_of("b.py").unwrap();
        assert!(g.has_edge(b, a));
        assert!(!g.has_edge(b, b));
        assert_eq!(g.in_degree(a), 1);
        assert_eq!(g.phantom_count(b), 0);
    }

    #[test]
    fn test_unresolved_and_external_targets_are_phantoms() {
        let files = vec![file(
            "a.py",
            vec![
                ImportRef::unresolved("requests"),
                ImportRef::resolved("gone", "deleted.py"),
            ],
        )];
        let g = DependencyGraph::build(&files);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.phantom_count(0), 2);
    }

    #[test]
    fn test_from_edges_ignores_unknown_nodes() {
        let g = DependencyGraph::from_edges(
            ["x", "y", "z"],
            [("x", "y"), ("y", "z"), ("z", "missing"), ("x", "x")],
        );
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.undirected_neighbors(1), vec![0, 2]);
        assert_eq!(g.edges().collect::<Vec<_>>(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_to_petgraph_preserves_shape() {
        let g = DependencyGraph::from_edges(["a", "b", "c"], [("a", "b"), ("a", "c")]);
        let pg = g.to_petgraph();
        assert_eq!(pg.node_count(), 3);
        assert_eq!(pg.edge_count(), 2);
    }
}
