//! Signal registry
//!
//! Every signal the engine can emit is a variant of the closed [`Signal`]
//! enum, and every variant carries exactly one [`SignalMeta`] entry naming
//! its scope, value type, polarity and the single producer allowed to
//! compute it. The table is validated once by [`initialize_registry`] and
//! stored process-wide; a conflicting owner or a variant without metadata
//! is a startup error.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

macro_rules! define_signals {
    ($($variant:ident => $name:literal,)+) => {
        /// Every signal identifier, one variant each.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum Signal {
            $($variant,)+
        }

        impl Signal {
            pub const ALL: &'static [Signal] = &[$(Signal::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Signal::$variant => $name,)+
                }
            }
        }
    };
}

define_signals! {
    // Scanning
    Lines => "lines",
    FunctionCount => "function_count",
    ClassCount => "class_count",
    MaxNesting => "max_nesting",
    ImplGini => "impl_gini",
    StubRatio => "stub_ratio",
    ImportCount => "import_count",
    // Semantics
    Role => "role",
    ConceptCount => "concept_count",
    ConceptEntropy => "concept_entropy",
    NamingDrift => "naming_drift",
    TodoDensity => "todo_density",
    DocstringCoverage => "docstring_coverage",
    // Graph
    Pagerank => "pagerank",
    Betweenness => "betweenness",
    InDegree => "in_degree",
    OutDegree => "out_degree",
    BlastRadiusSize => "blast_radius_size",
    Depth => "depth",
    IsOrphan => "is_orphan",
    PhantomImportCount => "phantom_import_count",
    BrokenCallCount => "broken_call_count",
    Community => "community",
    CompressionRatio => "compression_ratio",
    SemanticCoherence => "semantic_coherence",
    CognitiveLoad => "cognitive_load",
    // Temporal
    TotalChanges => "total_changes",
    ChurnTrajectory => "churn_trajectory",
    ChurnSlope => "churn_slope",
    ChurnCv => "churn_cv",
    BusFactor => "bus_factor",
    AuthorEntropy => "author_entropy",
    FixRatio => "fix_ratio",
    RefactorRatio => "refactor_ratio",
    ChangeEntropy => "change_entropy",
    // File composites
    RawRisk => "raw_risk",
    RiskScore => "risk_score",
    WiringQuality => "wiring_quality",
    FileHealthScore => "file_health_score",
    DeltaH => "delta_h",
    // Module
    Cohesion => "cohesion",
    Coupling => "coupling",
    Instability => "instability",
    Abstractness => "abstractness",
    MainSeqDistance => "main_seq_distance",
    BoundaryAlignment => "boundary_alignment",
    LayerViolationCount => "layer_violation_count",
    RoleConsistency => "role_consistency",
    Velocity => "velocity",
    CoordinationCost => "coordination_cost",
    KnowledgeGini => "knowledge_gini",
    ModuleBusFactor => "module_bus_factor",
    MeanCognitiveLoad => "mean_cognitive_load",
    FileCount => "file_count",
    HealthScore => "health_score",
    // Global
    Modularity => "modularity",
    FiedlerValue => "fiedler_value",
    SpectralGap => "spectral_gap",
    CycleCount => "cycle_count",
    CentralityGini => "centrality_gini",
    OrphanRatio => "orphan_ratio",
    PhantomRatio => "phantom_ratio",
    GlueDeficit => "glue_deficit",
    CloneRatio => "clone_ratio",
    ViolationRate => "violation_rate",
    ConwayAlignment => "conway_alignment",
    TeamSize => "team_size",
    WiringScore => "wiring_score",
    ArchitectureHealth => "architecture_health",
    TeamRisk => "team_risk",
    CodebaseHealth => "codebase_health",
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signal::ALL
            .iter()
            .copied()
            .find(|sig| sig.as_str() == s)
            .ok_or_else(|| format!("unknown signal: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    File,
    Module,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HighIsBad,
    HighIsGood,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Int,
    Float,
    Bool,
    Text,
}

/// Metadata for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalMeta {
    pub signal: Signal,
    pub scope: Scope,
    pub value_type: ValueType,
    /// Participates in percentile normalization
    pub percentileable: bool,
    pub polarity: Polarity,
    /// Threshold used when the tier is too small for percentiles
    pub absolute_threshold: Option<f64>,
    /// The single producer allowed to compute this signal
    pub produced_by: &'static str,
    /// First pipeline phase after which the signal is available
    pub phase: u8,
    /// May be absent (e.g. instability of an isolated module)
    pub nullable: bool,
}

impl SignalMeta {
    #[allow(clippy::too_many_arguments)]
    const fn new(
        signal: Signal,
        scope: Scope,
        value_type: ValueType,
        percentileable: bool,
        polarity: Polarity,
        absolute_threshold: Option<f64>,
        produced_by: &'static str,
        phase: u8,
    ) -> Self {
        Self {
            signal,
            scope,
            value_type,
            percentileable,
            polarity,
            absolute_threshold,
            produced_by,
            phase,
            nullable: false,
        }
    }

    const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("signal {signal} already registered by {existing}, cannot register again from {attempted}")]
    ConflictingOwner {
        signal: Signal,
        existing: &'static str,
        attempted: &'static str,
    },

    #[error(
        "missing metadata for signals: {}",
        .0.iter().map(Signal::as_str).collect::<Vec<_>>().join(", ")
    )]
    MissingMetadata(Vec<Signal>),
}

pub const SCANNING: &str = "scanning/metrics";
pub const SEMANTICS_ROLES: &str = "semantics/roles";
pub const SEMANTICS_CONCEPTS: &str = "semantics/concepts";
pub const SEMANTICS_NAMING: &str = "semantics/naming";
pub const SEMANTICS_DOCS: &str = "semantics/docs";
pub const SEMANTICS_COHERENCE: &str = "semantics/coherence";
pub const GRAPH: &str = "graph/algorithms";
pub const ARCHITECTURE: &str = "architecture/metrics";
pub const TEMPORAL_CHURN: &str = "temporal/churn";
pub const TEMPORAL_AUTHORS: &str = "temporal/authors";
pub const TEMPORAL_MODULES: &str = "temporal/modules";
pub const COMPOSITES: &str = "signals/composites";
pub const LAPLACIAN: &str = "signals/laplacian";

/// The declarative metadata table.
pub fn signal_table() -> Vec<SignalMeta> {
    use Polarity::*;
    use Scope::*;
    use Signal::*;
    use ValueType::*;

    let m = SignalMeta::new;
    vec![
        m(Lines, File, Int, true, HighIsBad, Some(500.0), SCANNING, 0),
        m(FunctionCount, File, Int, true, HighIsBad, Some(30.0), SCANNING, 0),
        m(ClassCount, File, Int, true, Neutral, None, SCANNING, 0),
        m(MaxNesting, File, Int, true, HighIsBad, Some(4.0), SCANNING, 1),
        m(ImplGini, File, Float, true, HighIsBad, Some(0.6), SCANNING, 1),
        m(StubRatio, File, Float, true, HighIsBad, Some(0.5), SCANNING, 1),
        m(ImportCount, File, Int, true, Neutral, None, SCANNING, 0),
        m(Role, File, Text, false, Neutral, None, SEMANTICS_ROLES, 2),
        m(ConceptCount, File, Int, true, HighIsBad, None, SEMANTICS_CONCEPTS, 2),
        m(ConceptEntropy, File, Float, true, HighIsBad, Some(1.5), SEMANTICS_CONCEPTS, 2),
        m(NamingDrift, File, Float, true, HighIsBad, Some(0.7), SEMANTICS_NAMING, 2),
        m(TodoDensity, File, Float, true, HighIsBad, Some(0.05), SCANNING, 1),
        m(DocstringCoverage, File, Float, true, HighIsGood, None, SEMANTICS_DOCS, 2).nullable(),
        m(Pagerank, File, Float, true, HighIsBad, None, GRAPH, 0),
        m(Betweenness, File, Float, true, HighIsBad, None, GRAPH, 0),
        m(InDegree, File, Int, true, Neutral, None, GRAPH, 0),
        m(OutDegree, File, Int, true, Neutral, None, GRAPH, 0),
        m(BlastRadiusSize, File, Int, true, HighIsBad, None, GRAPH, 0),
        m(Depth, File, Int, true, Neutral, None, GRAPH, 3),
        m(IsOrphan, File, Bool, false, HighIsBad, None, GRAPH, 3),
        m(PhantomImportCount, File, Int, true, HighIsBad, Some(0.0), GRAPH, 3),
        m(BrokenCallCount, File, Int, true, HighIsBad, Some(0.0), GRAPH, 3),
        m(Community, File, Int, false, Neutral, None, GRAPH, 0),
        m(CompressionRatio, File, Float, true, Neutral, None, SCANNING, 0),
        m(SemanticCoherence, File, Float, true, HighIsGood, None, SEMANTICS_COHERENCE, 2),
        m(CognitiveLoad, File, Float, true, HighIsBad, None, COMPOSITES, 1),
        m(TotalChanges, File, Int, true, HighIsBad, None, TEMPORAL_CHURN, 3),
        m(ChurnTrajectory, File, Text, false, Neutral, None, TEMPORAL_CHURN, 3),
        m(ChurnSlope, File, Float, true, HighIsBad, None, TEMPORAL_CHURN, 3),
        m(ChurnCv, File, Float, true, HighIsBad, Some(1.0), TEMPORAL_CHURN, 3),
        m(BusFactor, File, Float, true, HighIsGood, Some(1.0), TEMPORAL_CHURN, 3),
        m(AuthorEntropy, File, Float, true, HighIsGood, None, TEMPORAL_CHURN, 3),
        m(FixRatio, File, Float, true, HighIsBad, Some(0.4), TEMPORAL_CHURN, 3),
        m(RefactorRatio, File, Float, true, HighIsGood, None, TEMPORAL_CHURN, 3),
        m(ChangeEntropy, File, Float, true, Neutral, None, TEMPORAL_CHURN, 3),
        m(RawRisk, File, Float, false, HighIsBad, None, COMPOSITES, 5),
        m(RiskScore, File, Float, false, HighIsBad, None, COMPOSITES, 5),
        m(WiringQuality, File, Float, false, HighIsGood, None, COMPOSITES, 5),
        m(FileHealthScore, File, Float, false, HighIsGood, None, COMPOSITES, 5),
        m(DeltaH, File, Float, false, HighIsBad, Some(0.4), LAPLACIAN, 5),
        m(Cohesion, Module, Float, true, HighIsGood, None, ARCHITECTURE, 4),
        m(Coupling, Module, Float, true, HighIsBad, None, ARCHITECTURE, 4),
        m(Instability, Module, Float, true, Neutral, None, ARCHITECTURE, 4).nullable(),
        m(Abstractness, Module, Float, true, Neutral, None, ARCHITECTURE, 4),
        m(MainSeqDistance, Module, Float, true, HighIsBad, None, ARCHITECTURE, 4),
        m(BoundaryAlignment, Module, Float, true, HighIsGood, None, ARCHITECTURE, 4),
        m(LayerViolationCount, Module, Int, true, HighIsBad, None, ARCHITECTURE, 4),
        m(RoleConsistency, Module, Float, true, HighIsGood, None, ARCHITECTURE, 4),
        m(Velocity, Module, Float, true, Neutral, None, TEMPORAL_MODULES, 5),
        m(CoordinationCost, Module, Float, true, HighIsBad, None, TEMPORAL_MODULES, 5),
        m(KnowledgeGini, Module, Float, true, HighIsBad, None, TEMPORAL_MODULES, 5),
        m(ModuleBusFactor, Module, Float, true, HighIsGood, None, TEMPORAL_MODULES, 5),
        m(MeanCognitiveLoad, Module, Float, true, HighIsBad, None, COMPOSITES, 5),
        m(FileCount, Module, Int, true, Neutral, None, ARCHITECTURE, 4),
        m(HealthScore, Module, Float, false, HighIsGood, None, COMPOSITES, 5),
        m(Modularity, Global, Float, false, HighIsGood, None, GRAPH, 0),
        m(FiedlerValue, Global, Float, false, HighIsGood, None, GRAPH, 0),
        m(SpectralGap, Global, Float, false, HighIsGood, None, GRAPH, 0),
        m(CycleCount, Global, Int, false, HighIsBad, None, GRAPH, 0),
        m(CentralityGini, Global, Float, false, HighIsBad, None, GRAPH, 3),
        m(OrphanRatio, Global, Float, false, HighIsBad, None, GRAPH, 3),
        m(PhantomRatio, Global, Float, false, HighIsBad, None, GRAPH, 3),
        m(GlueDeficit, Global, Float, false, HighIsBad, None, GRAPH, 3),
        m(CloneRatio, Global, Float, false, HighIsBad, None, SCANNING, 3),
        m(ViolationRate, Global, Float, false, HighIsBad, None, ARCHITECTURE, 4),
        m(ConwayAlignment, Global, Float, false, HighIsGood, None, TEMPORAL_AUTHORS, 3),
        m(TeamSize, Global, Int, false, Neutral, None, TEMPORAL_AUTHORS, 3),
        m(WiringScore, Global, Float, false, HighIsGood, None, COMPOSITES, 5),
        m(ArchitectureHealth, Global, Float, false, HighIsGood, None, COMPOSITES, 5),
        m(TeamRisk, Global, Float, false, HighIsBad, None, COMPOSITES, 5),
        m(CodebaseHealth, Global, Float, false, HighIsGood, None, COMPOSITES, 5),
    ]
}

/// Validated, read-only signal metadata.
#[derive(Debug, Clone, Default)]
pub struct SignalRegistry {
    entries: BTreeMap<Signal, SignalMeta>,
}

impl SignalRegistry {
    /// Register every entry of `table`, then check completeness.
    pub fn build(table: &[SignalMeta]) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for meta in table {
            registry.register(*meta)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Register one entry. Re-registration by the same producer is a no-op.
    pub fn register(&mut self, meta: SignalMeta) -> Result<(), RegistryError> {
        if let Some(existing) = self.entries.get(&meta.signal) {
            if existing.produced_by != meta.produced_by {
                return Err(RegistryError::ConflictingOwner {
                    signal: meta.signal,
                    existing: existing.produced_by,
                    attempted: meta.produced_by,
                });
            }
            return Ok(());
        }
        self.entries.insert(meta.signal, meta);
        Ok(())
    }

    /// Every [`Signal`] variant must have metadata.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let missing: Vec<Signal> = Signal::ALL
            .iter()
            .copied()
            .filter(|s| !self.entries.contains_key(s))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::MissingMetadata(missing))
        }
    }

    pub fn get(&self, signal: Signal) -> Option<&SignalMeta> {
        self.entries.get(&signal)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalMeta> {
        self.entries.values()
    }

    /// Signals safe for percentile normalization.
    pub fn percentileable(&self) -> Vec<Signal> {
        self.select(|m| m.percentileable)
    }

    /// Signals of `scope` that get per-entity percentiles.
    pub fn percentileable_in(&self, scope: Scope) -> Vec<Signal> {
        self.select(|m| m.percentileable && m.scope == scope)
    }

    pub fn by_scope(&self, scope: Scope) -> Vec<Signal> {
        self.select(|m| m.scope == scope)
    }

    /// Signals available once `phase` has completed.
    pub fn by_phase(&self, phase: u8) -> Vec<Signal> {
        self.select(|m| m.phase <= phase)
    }

    fn select(&self, pred: impl Fn(&SignalMeta) -> bool) -> Vec<Signal> {
        self.entries
            .values()
            .filter(|m| pred(m))
            .map(|m| m.signal)
            .collect()
    }
}

static REGISTRY: OnceLock<SignalRegistry> = OnceLock::new();

/// Validate the signal table and install it process-wide.
///
/// Idempotent: later calls return the registry built by the first one.
pub fn initialize_registry() -> Result<&'static SignalRegistry, RegistryError> {
    if let Some(registry) = REGISTRY.get() {
        return Ok(registry);
    }
    let built = SignalRegistry::build(&signal_table())?;
    debug!("Signal registry initialized with {} signals", built.len());
    Ok(REGISTRY.get_or_init(|| built))
}

/// The installed registry, if [`initialize_registry`] has succeeded.
pub fn registry() -> Option<&'static SignalRegistry> {
    REGISTRY.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_every_signal_once() {
        let table = signal_table();
        assert_eq!(table.len(), Signal::ALL.len());
        let registry = SignalRegistry::build(&table).unwrap();
        assert_eq!(registry.len(), Signal::ALL.len());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let a = initialize_registry().unwrap();
        let b = initialize_registry().unwrap();
        assert!(std::ptr::eq(a, b));
        assert!(registry().is_some());
    }

    #[test]
    fn test_conflicting_owner_is_rejected() {
        let mut registry = SignalRegistry::default();
        let meta = SignalMeta::new(
            Signal::Lines,
            Scope::File,
            ValueType::Int,
            true,
            Polarity::HighIsBad,
            None,
            SCANNING,
            0,
        );
        registry.register(meta).unwrap();
        // Same owner: no-op
        registry.register(meta).unwrap();
        assert_eq!(registry.len(), 1);

        let err = registry
            .register(SignalMeta {
                produced_by: GRAPH,
                ..meta
            })
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::ConflictingOwner {
                signal: Signal::Lines,
                existing: SCANNING,
                attempted: GRAPH,
            }
        );
    }

    #[test]
    fn test_missing_metadata_is_fatal() {
        let table: Vec<SignalMeta> = signal_table()
            .into_iter()
            .filter(|m| m.signal != Signal::DeltaH)
            .collect();
        let err = SignalRegistry::build(&table).unwrap_err();
        assert_eq!(err, RegistryError::MissingMetadata(vec![Signal::DeltaH]));
        assert!(err.to_string().contains("delta_h"));
    }

    #[test]
    fn test_phase_views_are_monotonic() {
        let registry = SignalRegistry::build(&signal_table()).unwrap();
        let mut previous = 0;
        for phase in 0..=5u8 {
            let available = registry.by_phase(phase);
            assert!(available.len() >= previous);
            if phase > 0 {
                let earlier = registry.by_phase(phase - 1);
                assert!(earlier.iter().all(|s| available.contains(s)));
            }
            previous = available.len();
        }
        assert_eq!(registry.by_phase(5).len(), Signal::ALL.len());
    }

    #[test]
    fn test_scope_and_percentile_views() {
        let registry = SignalRegistry::build(&signal_table()).unwrap();
        let total = registry.by_scope(Scope::File).len()
            + registry.by_scope(Scope::Module).len()
            + registry.by_scope(Scope::Global).len();
        assert_eq!(total, registry.len());

        let pctl = registry.percentileable_in(Scope::File);
        assert!(pctl.contains(&Signal::Pagerank));
        assert!(pctl.contains(&Signal::Depth));
        assert!(!pctl.contains(&Signal::Role));
        assert!(!pctl.contains(&Signal::RiskScore));
        let module_pctl = registry.percentileable_in(Scope::Module);
        assert!(module_pctl.contains(&Signal::Velocity));
        assert!(!module_pctl.contains(&Signal::HealthScore));
        assert!(registry.percentileable_in(Scope::Global).is_empty());
        assert!(registry
            .percentileable()
            .iter()
            .all(|s| registry.get(*s).is_some_and(|m| m.percentileable)));
    }

    #[test]
    fn test_names_round_trip() {
        for signal in Signal::ALL {
            assert_eq!(signal.as_str().parse::<Signal>().unwrap(), *signal);
            let json = serde_json::to_string(signal).unwrap();
            assert_eq!(json, format!("\"{}\"", signal.as_str()));
        }
        assert!("nope".parse::<Signal>().is_err());
    }
}
