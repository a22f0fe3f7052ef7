//! Module-level architecture metrics.
//!
//! A module is the parent directory of a file. File edges are contracted to
//! module edges, from which the Martin metrics (afferent/efferent coupling,
//! instability, abstractness, main-sequence distance) and layer violations
//! are derived.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Serialize;

use super::components::strongly_connected_components;
use super::model::DependencyGraph;
use crate::models::Role;

/// Module (directory) that owns `path`. Top-level files belong to `"."`.
pub fn module_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir,
        _ => ".",
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleMetrics {
    pub path: String,
    /// Member file indices into the dependency graph, sorted
    pub files: Vec<usize>,
    pub internal_edges: usize,
    pub external_edges: usize,
    /// Ca: edges from other modules into this one
    pub afferent: usize,
    /// Ce: edges from this module to others
    pub efferent: usize,
    pub cohesion: f64,
    pub coupling: f64,
    /// `None` when the module has no cross-module edges
    pub instability: Option<f64>,
    pub abstractness: f64,
    pub main_seq_distance: f64,
    pub boundary_alignment: f64,
    pub role_consistency: f64,
    pub dominant_role: Role,
    pub layer: usize,
    pub layer_violation_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Import points to the same or a higher layer. Modules on one cycle
    /// share a layer, so every module-level cycle edge lands here.
    Backward,
    /// Import jumps over at least one intermediate layer
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerViolation {
    pub source: String,
    pub target: String,
    pub source_layer: usize,
    pub target_layer: usize,
    pub kind: ViolationKind,
    /// Number of file-level edges behind this module edge
    pub edge_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArchitectureAnalysis {
    /// Sorted by module path
    pub modules: Vec<ModuleMetrics>,
    /// Module index of every graph node
    pub module_index: Vec<usize>,
    pub violations: Vec<LayerViolation>,
    /// Violating file edges over all cross-module file edges
    pub violation_rate: f64,
}

impl ArchitectureAnalysis {
    pub fn module_for_file(&self, node: usize) -> Option<&ModuleMetrics> {
        self.module_index.get(node).and_then(|&m| self.modules.get(m))
    }
}

/// Compute per-module metrics.
///
/// `roles`, `abstract_ratio` and `community` are indexed by graph node;
/// missing entries default to `Unknown`, 0.0 and singleton communities.
pub fn analyze_modules(
    graph: &DependencyGraph,
    roles: &[Role],
    abstract_ratio: &[f64],
    community: &[usize],
) -> ArchitectureAnalysis {
    let n = graph.node_count();
    if n == 0 {
        return ArchitectureAnalysis::default();
    }

    let mut by_path: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for v in 0..n {
        by_path.entry(module_of(graph.path(v))).or_default().push(v);
    }

    let mut module_index = vec![0usize; n];
    let mut modules: Vec<ModuleMetrics> = by_path
        .into_iter()
        .enumerate()
        .map(|(i, (path, files))| {
            for &v in &files {
                module_index[v] = i;
            }
            ModuleMetrics {
                path: path.to_string(),
                files,
                ..Default::default()
            }
        })
        .collect();

    let mut module_edges: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for (src, dst) in graph.edges() {
        let (ms, md) = (module_index[src], module_index[dst]);
        if ms == md {
            modules[ms].internal_edges += 1;
        } else {
            modules[ms].external_edges += 1;
            modules[ms].efferent += 1;
            modules[md].afferent += 1;
            *module_edges.entry((ms, md)).or_insert(0) += 1;
        }
    }

    for module in &mut modules {
        fill_martin_metrics(module, roles, abstract_ratio, community);
    }

    let layers = infer_layers(&modules, &module_edges);
    for (module, &layer) in modules.iter_mut().zip(&layers) {
        module.layer = layer;
    }

    let mut violations = Vec::new();
    for (&(ms, md), &edge_count) in &module_edges {
        let (ls, lt) = (layers[ms], layers[md]);
        let kind = if ls <= lt {
            ViolationKind::Backward
        } else if ls - lt > 1 {
            ViolationKind::Skip
        } else {
            continue;
        };
        modules[ms].layer_violation_count += edge_count;
        violations.push(LayerViolation {
            source: modules[ms].path.clone(),
            target: modules[md].path.clone(),
            source_layer: ls,
            target_layer: lt,
            kind,
            edge_count,
        });
    }

    let cross_edges: usize = modules.iter().map(|m| m.external_edges).sum();
    let violating: usize = violations.iter().map(|v| v.edge_count).sum();
    let violation_rate = if cross_edges > 0 {
        violating as f64 / cross_edges as f64
    } else {
        0.0
    };

    ArchitectureAnalysis {
        modules,
        module_index,
        violations,
        violation_rate,
    }
}

fn fill_martin_metrics(
    module: &mut ModuleMetrics,
    roles: &[Role],
    abstract_ratio: &[f64],
    community: &[usize],
) {
    let n = module.files.len();
    let total = module.internal_edges + module.external_edges;
    if total > 0 {
        module.coupling = module.external_edges as f64 / total as f64;
    }
    if n > 1 {
        module.cohesion = module.internal_edges as f64 / (n * (n - 1)) as f64;
    }

    let ca_ce = module.afferent + module.efferent;
    module.instability = (ca_ce > 0).then(|| module.efferent as f64 / ca_ce as f64);

    module.abstractness = if n > 0 {
        module
            .files
            .iter()
            .map(|&v| abstract_ratio.get(v).copied().unwrap_or(0.0))
            .sum::<f64>()
            / n as f64
    } else {
        0.0
    };
    module.main_seq_distance = module
        .instability
        .map(|i| (module.abstractness + i - 1.0).abs())
        .unwrap_or(0.0);

    let mut communities: FxHashMap<usize, usize> = FxHashMap::default();
    let mut role_counts: BTreeMap<Role, usize> = BTreeMap::new();
    for &v in &module.files {
        let c = community.get(v).copied().unwrap_or(usize::MAX - v);
        *communities.entry(c).or_insert(0) += 1;
        *role_counts
            .entry(roles.get(v).copied().unwrap_or_default())
            .or_insert(0) += 1;
    }
    if n > 0 {
        let dominant_community = communities.values().copied().max().unwrap_or(0);
        module.boundary_alignment = dominant_community as f64 / n as f64;

        // First role in enum order wins ties
        let mut best = (Role::Unknown, 0usize);
        for (&role, &count) in &role_counts {
            if count > best.1 {
                best = (role, count);
            }
        }
        module.dominant_role = best.0;
        module.role_consistency = best.1 as f64 / n as f64;
    }
}

/// Longest-path layer of every module over the condensed module graph.
/// Modules that import nothing sit at layer 0; members of a module cycle
/// share a layer.
fn infer_layers(modules: &[ModuleMetrics], module_edges: &BTreeMap<(usize, usize), usize>) -> Vec<usize> {
    let names: Vec<&str> = modules.iter().map(|m| m.path.as_str()).collect();
    let module_graph = DependencyGraph::from_edges(
        names.iter().copied(),
        module_edges
            .keys()
            .map(|&(s, d)| (names[s], names[d])),
    );

    // Map module-graph indices back to module indices (both sorted by path)
    let components = strongly_connected_components(&module_graph);
    let mut comp_of = vec![0usize; module_graph.node_count()];
    for (c, members) in components.iter().enumerate() {
        for &v in members {
            comp_of[v] = c;
        }
    }

    // Tarjan completes a component only after everything it reaches
    let mut comp_layer = vec![0usize; components.len()];
    for (c, members) in components.iter().enumerate() {
        let mut layer = 0;
        for &v in members {
            for &w in module_graph.successors(v) {
                let cw = comp_of[w];
                if cw != c {
                    layer = layer.max(comp_layer[cw] + 1);
                }
            }
        }
        comp_layer[c] = layer;
    }

    (0..modules.len())
        .map(|m| {
            module_graph
                .index_of(&modules[m].path)
                .map(|v| comp_layer[comp_of[v]])
                .unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(paths: &[&str], edges: &[(&str, &str)]) -> ArchitectureAnalysis {
        let g = DependencyGraph::from_edges(paths.iter().copied(), edges.iter().copied());
        analyze_modules(&g, &[], &[], &[])
    }

    fn module<'a>(a: &'a ArchitectureAnalysis, path: &str) -> &'a ModuleMetrics {
        a.modules.iter().find(|m| m.path == path).unwrap()
    }

    #[test]
    fn test_module_of() {
        assert_eq!(module_of("src/core/a.py"), "src/core");
        assert_eq!(module_of("a.py"), ".");
        assert_eq!(module_of("/a.py"), ".");
    }

    #[test]
    fn test_martin_metrics() {
        let a = analyze(
            &["api/h.py", "api/r.py", "core/m.py", "core/n.py"],
            &[
                ("api/h.py", "api/r.py"),
                ("api/h.py", "core/m.py"),
                ("api/r.py", "core/m.py"),
                ("core/m.py", "core/n.py"),
            ],
        );
        let api = module(&a, "api");
        assert_eq!(api.internal_edges, 1);
        assert_eq!(api.external_edges, 2);
        assert!((api.cohesion - 0.5).abs() < 1e-12);
        assert!((api.coupling - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(api.instability, Some(1.0));
        // A = 0, I = 1 sits on the main sequence
        assert_eq!(api.main_seq_distance, 0.0);

        let core = module(&a, "core");
        assert_eq!(core.instability, Some(0.0));
        assert_eq!(core.main_seq_distance, 1.0);
        assert_eq!(core.layer, 0);
        assert_eq!(api.layer, 1);
        assert!(a.violations.is_empty());
        assert_eq!(a.violation_rate, 0.0);
    }

    #[test]
    fn test_isolated_module_has_no_instability() {
        let a = analyze(&["x/a.py", "y/b.py"], &[]);
        assert_eq!(module(&a, "x").instability, None);
        assert_eq!(module(&a, "x").main_seq_distance, 0.0);
    }

    #[test]
    fn test_module_cycle_is_a_violation() {
        let a = analyze(
            &["a/1.py", "b/1.py"],
            &[("a/1.py", "b/1.py"), ("b/1.py", "a/1.py")],
        );
        assert_eq!(a.violations.len(), 2);
        assert!(a.violations.iter().all(|v| v.kind == ViolationKind::Backward));
        assert_eq!(a.violation_rate, 1.0);
        assert_eq!(module(&a, "a").layer_violation_count, 1);
    }

    #[test]
    fn test_skip_layer_violation() {
        // top -> mid -> base, plus top -> base skipping mid
        let a = analyze(
            &["top/t.py", "mid/m.py", "base/b.py"],
            &[
                ("top/t.py", "mid/m.py"),
                ("mid/m.py", "base/b.py"),
                ("top/t.py", "base/b.py"),
            ],
        );
        assert_eq!(module(&a, "top").layer, 2);
        assert_eq!(a.violations.len(), 1);
        assert_eq!(a.violations[0].kind, ViolationKind::Skip);
        assert!((a.violation_rate - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_roles_and_communities() {
        let g = DependencyGraph::from_edges(
            ["m/a.py", "m/b.py", "m/c.py"],
            std::iter::empty::<(&str, &str)>(),
        );
        let a = analyze_modules(
            &g,
            &[Role::Model, Role::Model, Role::Service],
            &[1.0, 0.0, 0.5],
            &[0, 0, 1],
        );
        let m = &a.modules[0];
        assert_eq!(m.dominant_role, Role::Model);
        assert!((m.role_consistency - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.boundary_alignment - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.abstractness - 0.5).abs() < 1e-12);
        assert!(a.module_for_file(2).is_some());
    }
}
