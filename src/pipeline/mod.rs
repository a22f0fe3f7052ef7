//! Signal fusion pipeline
//!
//! Fuses every producer's output into one [`SignalField`] in a fixed order:
//! 1. Collect per-file, per-module and global signals
//! 2. Raw risk (before percentiles, feeds the Laplacian)
//! 3. Percentile normalization (BAYESIAN/FULL tiers)
//! 4. Module aggregation and module percentiles (needs file percentiles)
//! 5. Composite scores (needs percentiles and module temporal signals)
//! 6. Health Laplacian
//!
//! Each step is a distinct type that can only be produced by its
//! predecessor, so the order is checked at compile time:
//!
//! ```compile_fail
//! use repotoire_signals::pipeline::Collected;
//!
//! // Composites before normalization do not exist
//! fn skip(stage: Collected<'_>) {
//!     stage.composites();
//! }
//! ```
//!
//! Nor can a later stage be built by hand:
//!
//! ```compile_fail
//! use repotoire_signals::pipeline::Normalized;
//! use repotoire_signals::signals::SignalField;
//!
//! let forged = Normalized { field: SignalField::new(0) };
//! ```

mod collect;
mod module_temporal;

use std::collections::BTreeMap;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

pub use collect::{cognitive_load, glue_deficit};

use crate::config::AnalysisConfig;
use crate::git::{TemporalAnalysis, TemporalEngine};
use crate::graph::{analyze_modules, ArchitectureAnalysis, DependencyGraph, GraphAnalysis, GraphEngine};
use crate::models::{FileMetrics, MetricsError, Role, SemanticInputs};
use crate::signals::{
    compute_composites, compute_raw_risks, health_laplacian, initialize_registry, normalize,
    normalize_modules, RegistryError, SignalField, SignalRegistry,
};

/// Everything the producers hand to fusion. All references are read-only.
#[derive(Debug, Clone, Copy)]
pub struct FusionInputs<'a> {
    pub files: &'a [FileMetrics],
    /// Semantic classifier output keyed by path; files without an entry keep
    /// default semantic signals
    pub semantics: &'a BTreeMap<String, SemanticInputs>,
    pub graph: &'a DependencyGraph,
    pub analysis: &'a GraphAnalysis,
    pub architecture: &'a ArchitectureAnalysis,
    /// `None` when history is unavailable
    pub temporal: Option<&'a TemporalAnalysis>,
    /// Share of files involved in clones, from an external clone detector
    pub clone_ratio: f64,
}

/// Entry point of the fusion chain.
pub struct FusionPipeline<'a> {
    inputs: FusionInputs<'a>,
    registry: &'a SignalRegistry,
}

impl<'a> FusionPipeline<'a> {
    pub fn new(inputs: FusionInputs<'a>, registry: &'a SignalRegistry) -> Self {
        Self { inputs, registry }
    }

    pub fn collect(self) -> Collected<'a> {
        let field = collect::collect_field(&self.inputs);
        Collected {
            inputs: self.inputs,
            registry: self.registry,
            field,
        }
    }
}

pub struct Collected<'a> {
    inputs: FusionInputs<'a>,
    registry: &'a SignalRegistry,
    field: SignalField,
}

impl<'a> Collected<'a> {
    pub fn field(&self) -> &SignalField {
        &self.field
    }

    pub fn raw_risk(mut self) -> RawRisked<'a> {
        compute_raw_risks(&mut self.field);
        RawRisked {
            inputs: self.inputs,
            registry: self.registry,
            field: self.field,
        }
    }
}

pub struct RawRisked<'a> {
    inputs: FusionInputs<'a>,
    registry: &'a SignalRegistry,
    field: SignalField,
}

impl<'a> RawRisked<'a> {
    pub fn normalize(mut self) -> Normalized<'a> {
        normalize(&mut self.field, self.registry);
        Normalized {
            inputs: self.inputs,
            registry: self.registry,
            field: self.field,
        }
    }
}

pub struct Normalized<'a> {
    inputs: FusionInputs<'a>,
    registry: &'a SignalRegistry,
    field: SignalField,
}

impl<'a> Normalized<'a> {
    pub fn field(&self) -> &SignalField {
        &self.field
    }

    pub fn module_temporal(mut self) -> ModuleTemporal<'a> {
        let history = self.inputs.temporal.map(|t| &t.history);
        module_temporal::fill_module_temporal(&mut self.field, history);
        normalize_modules(&mut self.field, self.registry);
        ModuleTemporal {
            inputs: self.inputs,
            field: self.field,
        }
    }
}

pub struct ModuleTemporal<'a> {
    inputs: FusionInputs<'a>,
    field: SignalField,
}

impl<'a> ModuleTemporal<'a> {
    pub fn composites(mut self) -> Composited<'a> {
        compute_composites(&mut self.field);
        Composited {
            inputs: self.inputs,
            field: self.field,
        }
    }
}

pub struct Composited<'a> {
    inputs: FusionInputs<'a>,
    field: SignalField,
}

impl Composited<'_> {
    /// Final step.
    pub fn laplacian(mut self) -> SignalField {
        health_laplacian(&mut self.field, self.inputs.graph);
        self.field
    }
}

/// Run the whole chain over already-computed producer outputs.
pub fn fuse(inputs: FusionInputs<'_>, registry: &SignalRegistry) -> SignalField {
    FusionPipeline::new(inputs, registry)
        .collect()
        .raw_risk()
        .normalize()
        .module_temporal()
        .composites()
        .laplacian()
}

/// Analyze one repository snapshot end to end.
///
/// Files without a path are dropped; files with other invalid metrics are
/// kept with default scanning signals. History is mined from `repo` only
/// when `use_git` is set and the configuration enables it.
pub fn run(
    repo: &Path,
    files: &[FileMetrics],
    semantics: &BTreeMap<String, SemanticInputs>,
    config: &AnalysisConfig,
    use_git: bool,
) -> Result<SignalField, RegistryError> {
    let registry = initialize_registry()?;

    let files: Vec<FileMetrics> = files
        .iter()
        .filter(|f| match f.validate() {
            Ok(()) => true,
            Err(MetricsError::EmptyPath) => {
                warn!("Dropping file metrics without a path");
                false
            }
            Err(e) => {
                warn!("{}", e);
                true
            }
        })
        .cloned()
        .collect();
    info!("Analyzing {} files", files.len());

    let graph = DependencyGraph::build(&files);
    let roles: Vec<Role> = graph
        .nodes()
        .iter()
        .map(|p| semantics.get(p).map(|s| s.role).unwrap_or_default())
        .collect();
    let analysis = GraphEngine::new(config.graph.clone()).analyze(&graph, &roles);
    if !analysis.pagerank_converged {
        warn!(
            "PageRank did not converge after {} iterations; using best estimate",
            analysis.pagerank_iterations
        );
    }

    let valid_ratio: FxHashMap<&str, f64> = files
        .iter()
        .filter(|f| f.validate().is_ok())
        .map(|f| (f.path.as_str(), f.abstract_ratio))
        .collect();
    let abstract_ratio: Vec<f64> = graph
        .nodes()
        .iter()
        .map(|p| valid_ratio.get(p.as_str()).copied().unwrap_or(0.0))
        .collect();
    let architecture = analyze_modules(
        &graph,
        &roles,
        &abstract_ratio,
        &analysis.communities.assignment,
    );
    debug!(
        "{} modules, {} layer violations",
        architecture.modules.len(),
        architecture.violations.len()
    );

    let temporal = if use_git {
        let known: FxHashSet<&str> = graph.nodes().iter().map(String::as_str).collect();
        TemporalEngine::new(config.temporal.clone()).extract_and_analyze(repo, &known)
    } else {
        debug!("Temporal analysis skipped");
        None
    };

    let inputs = FusionInputs {
        files: &files,
        semantics,
        graph: &graph,
        analysis: &analysis,
        architecture: &architecture,
        temporal: temporal.as_ref(),
        clone_ratio: 0.0,
    };
    let field = fuse(inputs, registry);
    info!(
        "Fusion complete: {} files, {} modules, {} tier",
        field.per_file.len(),
        field.per_module.len(),
        field.tier()
    );
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImportRef;
    use crate::signals::Signal;

    fn file(path: &str, lines: usize, imports: &[&str]) -> FileMetrics {
        FileMetrics {
            path: path.to_string(),
            lines,
            function_count: 3,
            complexity: 4.0,
            max_nesting: 2,
            function_sizes: vec![5, 10, 20],
            imports: imports
                .iter()
                .map(|t| ImportRef::resolved(*t, *t))
                .collect(),
            ..Default::default()
        }
    }

    fn inputs_for<'a>(
        files: &'a [FileMetrics],
        semantics: &'a BTreeMap<String, SemanticInputs>,
        graph: &'a DependencyGraph,
        analysis: &'a GraphAnalysis,
        architecture: &'a ArchitectureAnalysis,
    ) -> FusionInputs<'a> {
        FusionInputs {
            files,
            semantics,
            graph,
            analysis,
            architecture,
            temporal: None,
            clone_ratio: 0.0,
        }
    }

    #[test]
    fn test_stages_in_order() {
        let files = vec![
            file("app/main.py", 120, &["core/db.py"]),
            file("core/db.py", 300, &[]),
            file("core/unused.py", 50, &[]),
        ];
        let semantics = BTreeMap::new();
        let graph = DependencyGraph::build(&files);
        let analysis = GraphEngine::default().analyze(&graph, &[]);
        let arch = analyze_modules(&graph, &[], &[], &analysis.communities.assignment);
        let registry = SignalRegistry::build(&crate::signals::registry::signal_table()).unwrap();
        let inputs = inputs_for(&files, &semantics, &graph, &analysis, &arch);

        let collected = FusionPipeline::new(inputs, &registry).collect();
        assert_eq!(collected.field().per_file.len(), 3);
        assert_eq!(collected.field().per_module.len(), 2);
        let db = collected.field().file("core/db.py").unwrap();
        assert_eq!(db.in_degree, 1);
        assert!(db.cognitive_load > 0.0);
        assert!(collected.field().file("core/unused.py").unwrap().is_orphan);

        let normalized = collected.raw_risk().normalize();
        // three files: ABSOLUTE tier
        assert!(normalized.field().per_file.values().all(|f| f.percentiles.is_empty()));

        let field = normalized.module_temporal().composites().laplacian();
        assert_eq!(field.delta_h.len(), 3);
        assert_eq!(field.delta_h["core/unused.py"], 0.0);
        assert_eq!(field.global.codebase_health, 0.0);
        assert_eq!(field.global.orphan_ratio, 2.0 / 3.0);
    }

    #[test]
    fn test_invalid_metrics_keep_defaults() {
        let mut bad = file("a.py", 500, &[]);
        bad.stub_ratio = 2.0;
        let files = vec![bad, file("b.py", 10, &["a.py"])];
        let semantics = BTreeMap::new();
        let graph = DependencyGraph::build(&files);
        let analysis = GraphEngine::default().analyze(&graph, &[]);
        let arch = analyze_modules(&graph, &[], &[], &[]);
        let registry = SignalRegistry::build(&crate::signals::registry::signal_table()).unwrap();

        let field = fuse(inputs_for(&files, &semantics, &graph, &analysis, &arch), &registry);
        let a = field.file("a.py").unwrap();
        assert_eq!(a.lines, 0);
        assert_eq!(a.stub_ratio, 0.0);
        // graph signals still apply
        assert_eq!(a.in_degree, 1);
        assert_eq!(field.file("b.py").unwrap().lines, 10);
    }

    #[test]
    fn test_bayesian_tier_fills_composites() {
        let files: Vec<FileMetrics> = (0..20)
            .map(|i| {
                let next = format!("pkg{}/f{}.py", (i + 1) % 4, (i + 1) % 20);
                let mut f = file(&format!("pkg{}/f{}.py", i % 4, i), 100 + i * 40, &[]);
                f.imports = vec![ImportRef::resolved("next", next)];
                f
            })
            .collect();
        let semantics = BTreeMap::new();
        let graph = DependencyGraph::build(&files);
        let analysis = GraphEngine::default().analyze(&graph, &[]);
        let arch = analyze_modules(&graph, &[], &[], &analysis.communities.assignment);
        let registry = SignalRegistry::build(&crate::signals::registry::signal_table()).unwrap();

        let field = fuse(inputs_for(&files, &semantics, &graph, &analysis, &arch), &registry);
        assert!(field.tier().is_normalized());
        let top = field
            .per_file
            .values()
            .max_by_key(|f| f.lines)
            .unwrap();
        assert_eq!(top.pctl(Signal::Lines), 1.0);
        assert!(field.global.architecture_health > 0.0);
        assert!(field.global.codebase_health > 0.0);
        assert!(field.per_module.values().all(|m| m.health_score > 0.0));
        // no history: nothing changed, nothing at risk
        assert!(field.per_file.values().all(|f| f.risk_score == 0.0));
    }

    #[test]
    fn test_run_without_git() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            file("a.py", 100, &["b.py"]),
            file("b.py", 100, &[]),
            FileMetrics::new(""),
        ];
        let field = run(
            dir.path(),
            &files,
            &BTreeMap::new(),
            &AnalysisConfig::default(),
            false,
        )
        .unwrap();
        assert_eq!(field.per_file.len(), 2);
        assert!(registry_installed());
    }

    #[test]
    fn test_run_abstractness_reads_valid_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut abstract_file = file("core/a.py", 100, &[]);
        abstract_file.abstract_ratio = 0.6;
        let mut invalid = file("core/b.py", 100, &[]);
        invalid.abstract_ratio = 1.0;
        invalid.stub_ratio = 2.0;
        let files = vec![
            file("app/main.py", 100, &["core/a.py", "core/b.py"]),
            abstract_file,
            invalid,
        ];
        let field = run(
            dir.path(),
            &files,
            &BTreeMap::new(),
            &AnalysisConfig::default(),
            false,
        )
        .unwrap();
        let core = field.module("core").unwrap();
        assert!((core.abstractness - 0.3).abs() < 1e-12);
        assert_eq!(field.module("app").unwrap().abstractness, 0.0);
    }

    fn registry_installed() -> bool {
        crate::signals::registry().is_some()
    }
}
