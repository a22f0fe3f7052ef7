//! The signal tensor produced by fusion.

use std::collections::BTreeMap;

use serde::Serialize;

use super::registry::{Scope, Signal, SignalRegistry};
use crate::git::Trajectory;
use crate::models::{Role, Tier};

/// A single signal value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignalValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// A nullable signal with no value
    Null,
}

impl SignalValue {
    /// Numeric view used for percentiles. Booleans map to 0/1; text and
    /// null have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SignalValue::Int(v) => Some(*v as f64),
            SignalValue::Float(v) => Some(*v),
            SignalValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            SignalValue::Text(_) | SignalValue::Null => None,
        }
    }
}

impl From<usize> for SignalValue {
    fn from(v: usize) -> Self {
        SignalValue::Int(v as i64)
    }
}

impl From<u32> for SignalValue {
    fn from(v: u32) -> Self {
        SignalValue::Int(i64::from(v))
    }
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        SignalValue::Int(v)
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        SignalValue::Float(v)
    }
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        SignalValue::Bool(v)
    }
}

impl From<Option<f64>> for SignalValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(SignalValue::Null, SignalValue::Float)
    }
}

/// Every per-file signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSignals {
    pub path: String,
    /// Parent directory, which is also the owning module
    pub module: String,
    /// Number of directories above the file; 0 at the root
    pub dir_depth: usize,
    /// Other files in the same directory
    pub siblings_count: usize,

    pub lines: usize,
    pub function_count: usize,
    pub class_count: usize,
    pub max_nesting: usize,
    pub impl_gini: f64,
    pub stub_ratio: f64,
    pub import_count: usize,

    pub role: Role,
    pub concept_count: usize,
    pub concept_entropy: f64,
    pub naming_drift: f64,
    pub todo_density: f64,
    pub docstring_coverage: Option<f64>,

    pub pagerank: f64,
    pub betweenness: f64,
    pub in_degree: usize,
    pub out_degree: usize,
    pub blast_radius_size: usize,
    /// BFS depth from entry points, -1 when unreachable
    pub depth: i64,
    pub is_orphan: bool,
    pub phantom_import_count: usize,
    pub broken_call_count: usize,
    pub community: i64,
    pub compression_ratio: f64,
    pub semantic_coherence: f64,
    pub cognitive_load: f64,

    pub total_changes: u32,
    pub churn_trajectory: Trajectory,
    pub churn_slope: f64,
    pub churn_cv: f64,
    pub bus_factor: f64,
    pub author_entropy: f64,
    pub fix_ratio: f64,
    pub refactor_ratio: f64,
    pub change_entropy: f64,

    /// Pre-percentile risk
    pub raw_risk: f64,
    pub risk_score: f64,
    pub wiring_quality: f64,
    pub file_health_score: f64,
    pub delta_h: f64,

    /// Empty in the ABSOLUTE tier
    pub percentiles: BTreeMap<Signal, f64>,
}

impl FileSignals {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            module: crate::graph::module_of(&path).to_string(),
            dir_depth: path.matches('/').count(),
            siblings_count: 0,
            path,
            lines: 0,
            function_count: 0,
            class_count: 0,
            max_nesting: 0,
            impl_gini: 0.0,
            stub_ratio: 0.0,
            import_count: 0,
            role: Role::Unknown,
            concept_count: 1,
            concept_entropy: 0.0,
            naming_drift: 0.0,
            todo_density: 0.0,
            docstring_coverage: None,
            pagerank: 0.0,
            betweenness: 0.0,
            in_degree: 0,
            out_degree: 0,
            blast_radius_size: 0,
            depth: -1,
            is_orphan: false,
            phantom_import_count: 0,
            broken_call_count: 0,
            community: -1,
            compression_ratio: 0.0,
            semantic_coherence: 0.0,
            cognitive_load: 0.0,
            total_changes: 0,
            churn_trajectory: Trajectory::Dormant,
            churn_slope: 0.0,
            churn_cv: 0.0,
            bus_factor: 1.0,
            author_entropy: 0.0,
            fix_ratio: 0.0,
            refactor_ratio: 0.0,
            change_entropy: 0.0,
            raw_risk: 0.0,
            risk_score: 0.0,
            wiring_quality: 1.0,
            file_health_score: 1.0,
            delta_h: 0.0,
            percentiles: BTreeMap::new(),
        }
    }

    /// Percentile of `signal`, 0.0 when not computed.
    pub fn pctl(&self, signal: Signal) -> f64 {
        self.percentiles.get(&signal).copied().unwrap_or(0.0)
    }

    /// Value of a file-scope signal; `None` for module and global signals.
    pub fn get(&self, signal: Signal) -> Option<SignalValue> {
        use Signal::*;
        let value = match signal {
            Lines => self.lines.into(),
            FunctionCount => self.function_count.into(),
            ClassCount => self.class_count.into(),
            MaxNesting => self.max_nesting.into(),
            ImplGini => self.impl_gini.into(),
            StubRatio => self.stub_ratio.into(),
            ImportCount => self.import_count.into(),
            Signal::Role => SignalValue::Text(self.role.as_str().to_string()),
            ConceptCount => self.concept_count.into(),
            ConceptEntropy => self.concept_entropy.into(),
            NamingDrift => self.naming_drift.into(),
            TodoDensity => self.todo_density.into(),
            DocstringCoverage => self.docstring_coverage.into(),
            Pagerank => self.pagerank.into(),
            Betweenness => self.betweenness.into(),
            InDegree => self.in_degree.into(),
            OutDegree => self.out_degree.into(),
            BlastRadiusSize => self.blast_radius_size.into(),
            Depth => self.depth.into(),
            IsOrphan => self.is_orphan.into(),
            PhantomImportCount => self.phantom_import_count.into(),
            BrokenCallCount => self.broken_call_count.into(),
            Community => self.community.into(),
            CompressionRatio => self.compression_ratio.into(),
            SemanticCoherence => self.semantic_coherence.into(),
            CognitiveLoad => self.cognitive_load.into(),
            TotalChanges => self.total_changes.into(),
            ChurnTrajectory => SignalValue::Text(self.churn_trajectory.as_str().to_string()),
            ChurnSlope => self.churn_slope.into(),
            ChurnCv => self.churn_cv.into(),
            BusFactor => self.bus_factor.into(),
            AuthorEntropy => self.author_entropy.into(),
            FixRatio => self.fix_ratio.into(),
            RefactorRatio => self.refactor_ratio.into(),
            ChangeEntropy => self.change_entropy.into(),
            RawRisk => self.raw_risk.into(),
            RiskScore => self.risk_score.into(),
            WiringQuality => self.wiring_quality.into(),
            FileHealthScore => self.file_health_score.into(),
            DeltaH => self.delta_h.into(),
            Cohesion | Coupling | Instability | Abstractness | MainSeqDistance
            | BoundaryAlignment | LayerViolationCount | RoleConsistency | Velocity
            | CoordinationCost | KnowledgeGini | ModuleBusFactor | MeanCognitiveLoad
            | FileCount | HealthScore | Modularity | FiedlerValue | SpectralGap | CycleCount
            | CentralityGini | OrphanRatio | PhantomRatio | GlueDeficit | CloneRatio
            | ViolationRate | ConwayAlignment | TeamSize | WiringScore | ArchitectureHealth
            | TeamRisk | CodebaseHealth => return None,
        };
        Some(value)
    }
}

/// Every per-module signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSignals {
    pub path: String,
    /// Member file paths, sorted
    pub files: Vec<String>,

    pub cohesion: f64,
    pub coupling: f64,
    /// `None` for isolated modules
    pub instability: Option<f64>,
    pub abstractness: f64,
    pub main_seq_distance: f64,
    pub boundary_alignment: f64,
    pub layer_violation_count: usize,
    pub role_consistency: f64,

    /// Commits per week touching the module
    pub velocity: f64,
    /// Distinct authors per module commit
    pub coordination_cost: f64,
    pub knowledge_gini: f64,
    pub module_bus_factor: f64,
    pub mean_cognitive_load: f64,
    pub file_count: usize,

    // Directory aggregates over member files
    pub total_lines: usize,
    pub total_functions: usize,
    /// Mean `total_changes`
    pub mean_churn: f64,
    /// Mean `risk_score`
    pub mean_risk: f64,
    /// Most common role; ties go to the first file in path order
    pub dominant_role: Role,
    pub dominant_trajectory: Trajectory,
    /// Members changed more often than the codebase median
    pub hotspot_file_count: usize,
    /// Members with `risk_score` above 0.7
    pub high_risk_file_count: usize,

    pub health_score: f64,

    /// Empty in the ABSOLUTE tier
    pub percentiles: BTreeMap<Signal, f64>,
}

impl ModuleSignals {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            files: Vec::new(),
            cohesion: 0.0,
            coupling: 0.0,
            instability: None,
            abstractness: 0.0,
            main_seq_distance: 0.0,
            boundary_alignment: 0.0,
            layer_violation_count: 0,
            role_consistency: 0.0,
            velocity: 0.0,
            coordination_cost: 0.0,
            knowledge_gini: 0.0,
            module_bus_factor: 1.0,
            mean_cognitive_load: 0.0,
            file_count: 0,
            total_lines: 0,
            total_functions: 0,
            mean_churn: 0.0,
            mean_risk: 0.0,
            dominant_role: Role::Unknown,
            dominant_trajectory: Trajectory::Dormant,
            hotspot_file_count: 0,
            high_risk_file_count: 0,
            health_score: 0.0,
            percentiles: BTreeMap::new(),
        }
    }

    /// Percentile of `signal` among modules, 0.0 when not computed.
    pub fn pctl(&self, signal: Signal) -> f64 {
        self.percentiles.get(&signal).copied().unwrap_or(0.0)
    }

    pub fn is_isolated(&self) -> bool {
        self.instability.is_none()
    }

    pub fn get(&self, signal: Signal) -> Option<SignalValue> {
        use Signal::*;
        let value = match signal {
            Cohesion => self.cohesion.into(),
            Coupling => self.coupling.into(),
            Instability => self.instability.into(),
            Abstractness => self.abstractness.into(),
            MainSeqDistance => self.main_seq_distance.into(),
            BoundaryAlignment => self.boundary_alignment.into(),
            LayerViolationCount => self.layer_violation_count.into(),
            RoleConsistency => self.role_consistency.into(),
            Velocity => self.velocity.into(),
            CoordinationCost => self.coordination_cost.into(),
            KnowledgeGini => self.knowledge_gini.into(),
            ModuleBusFactor => self.module_bus_factor.into(),
            MeanCognitiveLoad => self.mean_cognitive_load.into(),
            FileCount => self.file_count.into(),
            HealthScore => self.health_score.into(),
            Lines | FunctionCount | ClassCount | MaxNesting | ImplGini | StubRatio
            | ImportCount | Signal::Role | ConceptCount | ConceptEntropy | NamingDrift | TodoDensity
            | DocstringCoverage | Pagerank | Betweenness | InDegree | OutDegree
            | BlastRadiusSize | Depth | IsOrphan | PhantomImportCount | BrokenCallCount
            | Community | CompressionRatio | SemanticCoherence | CognitiveLoad | TotalChanges
            | ChurnTrajectory | ChurnSlope | ChurnCv | BusFactor | AuthorEntropy | FixRatio
            | RefactorRatio | ChangeEntropy | RawRisk | RiskScore | WiringQuality
            | FileHealthScore | DeltaH | Modularity | FiedlerValue | SpectralGap
            | CycleCount | CentralityGini | OrphanRatio | PhantomRatio | GlueDeficit
            | CloneRatio | ViolationRate | ConwayAlignment | TeamSize | WiringScore
            | ArchitectureHealth | TeamRisk | CodebaseHealth => return None,
        };
        Some(value)
    }
}

/// Codebase-wide signals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalSignals {
    pub modularity: f64,
    pub fiedler_value: f64,
    pub spectral_gap: f64,
    pub cycle_count: usize,
    pub centrality_gini: f64,
    pub orphan_ratio: f64,
    pub phantom_ratio: f64,
    pub glue_deficit: f64,
    pub clone_ratio: f64,
    pub violation_rate: f64,
    pub conway_alignment: f64,
    pub team_size: usize,
    pub wiring_score: f64,
    pub architecture_health: f64,
    pub team_risk: f64,
    pub codebase_health: f64,
}

impl Default for GlobalSignals {
    fn default() -> Self {
        Self {
            modularity: 0.0,
            fiedler_value: 0.0,
            spectral_gap: 0.0,
            cycle_count: 0,
            centrality_gini: 0.0,
            orphan_ratio: 0.0,
            phantom_ratio: 0.0,
            glue_deficit: 0.0,
            clone_ratio: 0.0,
            violation_rate: 0.0,
            conway_alignment: 1.0,
            team_size: 1,
            wiring_score: 0.0,
            architecture_health: 0.0,
            team_risk: 0.0,
            codebase_health: 0.0,
        }
    }
}

impl GlobalSignals {
    pub fn get(&self, signal: Signal) -> Option<SignalValue> {
        use Signal::*;
        let value = match signal {
            Modularity => self.modularity.into(),
            FiedlerValue => self.fiedler_value.into(),
            SpectralGap => self.spectral_gap.into(),
            CycleCount => self.cycle_count.into(),
            CentralityGini => self.centrality_gini.into(),
            OrphanRatio => self.orphan_ratio.into(),
            PhantomRatio => self.phantom_ratio.into(),
            GlueDeficit => self.glue_deficit.into(),
            CloneRatio => self.clone_ratio.into(),
            ViolationRate => self.violation_rate.into(),
            ConwayAlignment => self.conway_alignment.into(),
            TeamSize => self.team_size.into(),
            WiringScore => self.wiring_score.into(),
            ArchitectureHealth => self.architecture_health.into(),
            TeamRisk => self.team_risk.into(),
            CodebaseHealth => self.codebase_health.into(),
            Lines | FunctionCount | ClassCount | MaxNesting | ImplGini | StubRatio
            | ImportCount | Signal::Role | ConceptCount | ConceptEntropy | NamingDrift | TodoDensity
            | DocstringCoverage | Pagerank | Betweenness | InDegree | OutDegree
            | BlastRadiusSize | Depth | IsOrphan | PhantomImportCount | BrokenCallCount
            | Community | CompressionRatio | SemanticCoherence | CognitiveLoad | TotalChanges
            | ChurnTrajectory | ChurnSlope | ChurnCv | BusFactor | AuthorEntropy | FixRatio
            | RefactorRatio | ChangeEntropy | RawRisk | RiskScore | WiringQuality
            | FileHealthScore | DeltaH | Cohesion | Coupling | Instability | Abstractness
            | MainSeqDistance | BoundaryAlignment | LayerViolationCount | RoleConsistency
            | Velocity | CoordinationCost | KnowledgeGini | ModuleBusFactor
            | MeanCognitiveLoad | FileCount | HealthScore => return None,
        };
        Some(value)
    }
}

/// One row of the flat representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub scope: Scope,
    /// File or module path; empty for global signals
    pub entity: String,
    pub signal: Signal,
    pub value: SignalValue,
}

/// The output tensor of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalField {
    tier: Tier,
    pub per_file: BTreeMap<String, FileSignals>,
    pub per_module: BTreeMap<String, ModuleSignals>,
    pub global: GlobalSignals,
    /// Health Laplacian per file
    pub delta_h: BTreeMap<String, f64>,
}

impl SignalField {
    /// An empty field for `file_count` files. The tier is fixed here.
    pub fn new(file_count: usize) -> Self {
        Self {
            tier: Tier::for_file_count(file_count),
            per_file: BTreeMap::new(),
            per_module: BTreeMap::new(),
            global: GlobalSignals::default(),
            delta_h: BTreeMap::new(),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn file(&self, path: &str) -> Option<&FileSignals> {
        self.per_file.get(path)
    }

    pub fn module(&self, path: &str) -> Option<&ModuleSignals> {
        self.per_module.get(path)
    }

    /// Top `n` files by `risk_score`, descending.
    pub fn top_files_by_risk(&self, n: usize) -> Vec<(&str, f64)> {
        let mut files: Vec<(&str, f64)> = self
            .per_file
            .iter()
            .map(|(p, fs)| (p.as_str(), fs.risk_score))
            .collect();
        files.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        files.truncate(n);
        files
    }

    /// Top `n` files by `delta_h`, descending. Positive means riskier than
    /// the neighbourhood.
    pub fn top_files_by_delta_h(&self, n: usize) -> Vec<(&str, f64)> {
        let mut files: Vec<(&str, f64)> =
            self.delta_h.iter().map(|(p, d)| (p.as_str(), *d)).collect();
        files.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        files.truncate(n);
        files
    }

    /// Files changed more often than `min_changes`, or than the median
    /// change count of changed files when `None`.
    pub fn hotspot_files(&self, min_changes: Option<u32>) -> Vec<&str> {
        let threshold = match min_changes {
            Some(t) => t,
            None => {
                let mut changes: Vec<u32> = self
                    .per_file
                    .values()
                    .map(|fs| fs.total_changes)
                    .filter(|&c| c > 0)
                    .collect();
                if changes.is_empty() {
                    return Vec::new();
                }
                changes.sort_unstable();
                changes[changes.len() / 2]
            }
        };
        self.per_file
            .iter()
            .filter(|(_, fs)| fs.total_changes > threshold)
            .map(|(p, _)| p.as_str())
            .collect()
    }

    /// Every registered signal for every entity, sorted by scope, entity
    /// and signal.
    pub fn flatten(&self, registry: &SignalRegistry) -> Vec<SignalRecord> {
        let file_signals = registry.by_scope(Scope::File);
        let module_signals = registry.by_scope(Scope::Module);
        let global_signals = registry.by_scope(Scope::Global);

        let mut records = Vec::with_capacity(
            self.per_file.len() * file_signals.len()
                + self.per_module.len() * module_signals.len()
                + global_signals.len(),
        );

        for (path, fs) in &self.per_file {
            for &signal in &file_signals {
                if let Some(value) = fs.get(signal) {
                    records.push(SignalRecord {
                        scope: Scope::File,
                        entity: path.clone(),
                        signal,
                        value,
                    });
                }
            }
        }
        for (path, ms) in &self.per_module {
            for &signal in &module_signals {
                if let Some(value) = ms.get(signal) {
                    records.push(SignalRecord {
                        scope: Scope::Module,
                        entity: path.clone(),
                        signal,
                        value,
                    });
                }
            }
        }
        for &signal in &global_signals {
            if let Some(value) = self.global.get(signal) {
                records.push(SignalRecord {
                    scope: Scope::Global,
                    entity: String::new(),
                    signal,
                    value,
                });
            }
        }

        records.sort_by(|a, b| {
            (a.scope, &a.entity, a.signal).cmp(&(b.scope, &b.entity, b.signal))
        });
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::registry::{signal_table, SignalRegistry};

    #[test]
    fn test_every_signal_has_exactly_one_accessor() {
        let file = FileSignals::new("src/a.py");
        let module = ModuleSignals::new("src");
        let global = GlobalSignals::default();
        for &signal in Signal::ALL {
            let hits = [
                file.get(signal).is_some(),
                module.get(signal).is_some(),
                global.get(signal).is_some(),
            ]
            .iter()
            .filter(|&&h| h)
            .count();
            assert_eq!(hits, 1, "{} must belong to exactly one scope", signal);
        }
    }

    #[test]
    fn test_accessor_scope_matches_registry() {
        let registry = SignalRegistry::build(&signal_table()).unwrap();
        let file = FileSignals::new("a.py");
        for signal in registry.by_scope(Scope::File) {
            assert!(file.get(signal).is_some(), "{}", signal);
        }
        let module = ModuleSignals::new(".");
        for signal in registry.by_scope(Scope::Module) {
            assert!(module.get(signal).is_some(), "{}", signal);
        }
    }

    #[test]
    fn test_nullable_values() {
        let module = ModuleSignals::new("core");
        assert_eq!(module.get(Signal::Instability), Some(SignalValue::Null));
        assert!(module.is_isolated());
        let file = FileSignals::new("core/a.py");
        assert_eq!(file.module, "core");
        assert_eq!(file.dir_depth, 1);
        assert_eq!(FileSignals::new("setup.py").dir_depth, 0);
        assert_eq!(file.get(Signal::DocstringCoverage), Some(SignalValue::Null));
        assert_eq!(SignalValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(SignalValue::Text("x".into()).as_f64(), None);
    }

    #[test]
    fn test_flatten_is_complete_and_sorted() {
        let registry = SignalRegistry::build(&signal_table()).unwrap();
        let mut field = SignalField::new(2);
        field.per_file.insert("b.py".into(), FileSignals::new("b.py"));
        field.per_file.insert("a.py".into(), FileSignals::new("a.py"));
        field.per_module.insert(".".into(), ModuleSignals::new("."));

        let records = field.flatten(&registry);
        let expected = 2 * registry.by_scope(Scope::File).len()
            + registry.by_scope(Scope::Module).len()
            + registry.by_scope(Scope::Global).len();
        assert_eq!(records.len(), expected);
        assert_eq!(records[0].entity, "a.py");
        assert!(records.windows(2).all(|w| {
            (w[0].scope, &w[0].entity, w[0].signal) <= (w[1].scope, &w[1].entity, w[1].signal)
        }));
        assert_eq!(records.last().map(|r| r.scope), Some(Scope::Global));
    }

    #[test]
    fn test_top_files_and_hotspots() {
        let mut field = SignalField::new(3);
        for (path, risk, changes) in [("a.py", 0.2, 1), ("b.py", 0.9, 10), ("c.py", 0.5, 4)] {
            let mut fs = FileSignals::new(path);
            fs.risk_score = risk;
            fs.total_changes = changes;
            field.per_file.insert(path.into(), fs);
            field.delta_h.insert(path.into(), -risk);
        }
        assert_eq!(
            field.top_files_by_risk(2),
            vec![("b.py", 0.9), ("c.py", 0.5)]
        );
        assert_eq!(field.top_files_by_delta_h(1), vec![("a.py", -0.2)]);
        assert_eq!(field.hotspot_files(None), vec!["b.py"]);
        assert_eq!(field.hotspot_files(Some(0)).len(), 3);
        assert_eq!(field.tier(), Tier::Absolute);
    }
}
