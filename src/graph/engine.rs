//! One-shot structural analysis of a dependency graph.

use serde::Serialize;
use tracing::{debug, info};

use super::centrality::{self, PageRankResult};
use super::community::{self, CommunityResult};
use super::components::{self, Cycle};
use super::model::DependencyGraph;
use super::spectral::{self, SpectralSummary};
use crate::config::GraphConfig;
use crate::models::Role;

/// Every per-node and global topology result, indexed by graph node.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphAnalysis {
    pub pagerank: Vec<f64>,
    pub pagerank_iterations: usize,
    pub pagerank_converged: bool,
    pub betweenness: Vec<f64>,
    pub in_degree: Vec<usize>,
    pub out_degree: Vec<usize>,
    pub blast_radius: Vec<usize>,
    pub depth: Vec<i64>,
    pub is_orphan: Vec<bool>,
    pub components: Vec<Vec<usize>>,
    pub cycles: Vec<Cycle>,
    pub communities: CommunityResult,
    pub centrality_gini: f64,
    pub spectral: Option<SpectralSummary>,
}

impl GraphAnalysis {
    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    pub fn modularity(&self) -> f64 {
        self.communities.modularity
    }

    pub fn community_of(&self, node: usize) -> usize {
        self.communities.assignment.get(node).copied().unwrap_or(0)
    }
}

/// Runs the graph algorithms with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct GraphEngine {
    config: GraphConfig,
}

impl GraphEngine {
    pub fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    /// Analyze `graph`. `roles` is indexed by node and may be shorter than
    /// the node count (missing roles count as unknown).
    pub fn analyze(&self, graph: &DependencyGraph, roles: &[Role]) -> GraphAnalysis {
        let n = graph.node_count();
        debug!(
            "Analyzing dependency graph: {} nodes, {} edges",
            n,
            graph.edge_count()
        );

        let PageRankResult {
            scores: pagerank,
            iterations,
            converged,
        } = centrality::pagerank(
            graph,
            self.config.damping,
            self.config.tolerance,
            self.config.max_iterations,
        );

        let betweenness = centrality::betweenness(graph);
        let blast_radius = components::blast_radius(graph);
        let scc = components::strongly_connected_components(graph);
        let cycles = components::cycles(graph, &scc);
        let communities = community::louvain(graph);
        let centrality_gini = centrality::centrality_gini(&pagerank);
        let spectral = spectral::spectral_summary(graph, self.config.max_spectral_nodes);

        let entry_points = centrality::default_entry_points(graph);
        let depth = centrality::dag_depth(graph, &entry_points);
        let is_orphan = components::orphans(graph, roles);

        let analysis = GraphAnalysis {
            pagerank,
            pagerank_iterations: iterations,
            pagerank_converged: converged,
            betweenness,
            in_degree: (0..n).map(|v| graph.in_degree(v)).collect(),
            out_degree: (0..n).map(|v| graph.out_degree(v)).collect(),
            blast_radius,
            depth,
            is_orphan,
            components: scc,
            cycles,
            communities,
            centrality_gini,
            spectral,
        };

        info!(
            "Graph analysis: {} cycles, {} communities (Q={:.3}), centrality gini {:.3}",
            analysis.cycle_count(),
            analysis.communities.communities.len(),
            analysis.modularity(),
            analysis.centrality_gini
        );
        analysis
    }
}
