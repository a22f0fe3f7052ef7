//! First fusion stage: gather every producer's output into a fresh field.

use std::collections::BTreeMap;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use super::FusionInputs;
use crate::git::conway_alignment;
use crate::math::clamp01;
use crate::models::{FileMetrics, MetricsError};
use crate::signals::{FileSignals, GlobalSignals, ModuleSignals, SignalField};

/// Composite cognitive load of one file.
///
/// `log2(lines + 1) * (1 + complexity/10) * (1 + nesting/5) * (1 + impl_gini)`
pub fn cognitive_load(lines: usize, complexity: f64, max_nesting: usize, impl_gini: f64) -> f64 {
    ((lines as f64) + 1.0).log2()
        * (1.0 + complexity / 10.0)
        * (1.0 + max_nesting as f64 / 5.0)
        * (1.0 + impl_gini)
}

pub(super) fn collect_field(inputs: &FusionInputs<'_>) -> SignalField {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let files: Vec<&FileMetrics> = inputs
        .files
        .iter()
        .filter(|f| !f.path.is_empty() && seen.insert(f.path.as_str()))
        .collect();

    let mut field = SignalField::new(files.len());
    debug!("Collecting signals for {} files ({} tier)", files.len(), field.tier());

    let per_file: Vec<FileSignals> = files.par_iter().map(|m| collect_file(inputs, m)).collect();
    for fs in per_file {
        field.per_file.insert(fs.path.clone(), fs);
    }
    fill_siblings(&mut field);

    field.per_module = collect_modules(inputs, &field);
    field.global = collect_global(inputs, &field);
    field
}

fn fill_siblings(field: &mut SignalField) {
    let mut dir_sizes: FxHashMap<String, usize> = FxHashMap::default();
    for fs in field.per_file.values() {
        *dir_sizes.entry(fs.module.clone()).or_insert(0) += 1;
    }
    for fs in field.per_file.values_mut() {
        fs.siblings_count = dir_sizes.get(&fs.module).map_or(0, |n| n - 1);
    }
}

fn collect_file(inputs: &FusionInputs<'_>, metrics: &FileMetrics) -> FileSignals {
    let mut fs = FileSignals::new(metrics.path.as_str());

    match metrics.validate() {
        Ok(()) => {
            fs.lines = metrics.lines;
            fs.function_count = metrics.function_count;
            fs.class_count = metrics.class_count;
            fs.max_nesting = metrics.max_nesting;
            fs.impl_gini = metrics.impl_gini();
            fs.stub_ratio = metrics.stub_ratio;
            fs.import_count = metrics.import_count();
            fs.broken_call_count = metrics.broken_call_count;
            fs.compression_ratio = metrics.compression_ratio;
            fs.todo_density = metrics.todo_density;
            fs.cognitive_load =
                cognitive_load(metrics.lines, metrics.complexity, metrics.max_nesting, fs.impl_gini);
        }
        Err(MetricsError::EmptyPath) => {}
        Err(e) => warn!("Keeping default scanning signals: {}", e),
    }

    if let Some(sem) = inputs.semantics.get(&metrics.path) {
        fs.role = sem.role;
        fs.concept_count = sem.concept_count;
        fs.concept_entropy = sem.concept_entropy;
        fs.naming_drift = sem.naming_drift;
        fs.docstring_coverage = sem.docstring_coverage;
        fs.semantic_coherence = sem.semantic_coherence;
    }

    if let Some(v) = inputs.graph.index_of(&metrics.path) {
        let a = inputs.analysis;
        fs.pagerank = a.pagerank.get(v).copied().unwrap_or(0.0);
        fs.betweenness = a.betweenness.get(v).copied().unwrap_or(0.0);
        fs.in_degree = inputs.graph.in_degree(v);
        fs.out_degree = inputs.graph.out_degree(v);
        fs.blast_radius_size = a.blast_radius.get(v).copied().unwrap_or(0);
        fs.depth = a.depth.get(v).copied().unwrap_or(-1);
        fs.is_orphan = a.is_orphan.get(v).copied().unwrap_or(false);
        fs.phantom_import_count = inputs.graph.phantom_count(v);
        fs.community = a
            .communities
            .assignment
            .get(v)
            .map_or(-1, |&c| c as i64);
    }

    if let Some(churn) = inputs.temporal.and_then(|t| t.churn.get(&metrics.path)) {
        fs.total_changes = churn.total_changes;
        fs.churn_trajectory = churn.trajectory;
        fs.churn_slope = churn.slope;
        fs.churn_cv = churn.cv;
        fs.bus_factor = churn.bus_factor;
        fs.author_entropy = churn.author_entropy;
        fs.fix_ratio = churn.fix_ratio;
        fs.refactor_ratio = churn.refactor_ratio;
        fs.change_entropy = churn.change_entropy;
    }

    fs
}

fn collect_modules(inputs: &FusionInputs<'_>, field: &SignalField) -> BTreeMap<String, ModuleSignals> {
    let mut modules = BTreeMap::new();
    for m in &inputs.architecture.modules {
        let mut ms = ModuleSignals::new(m.path.as_str());
        ms.files = m
            .files
            .iter()
            .map(|&v| inputs.graph.path(v))
            .filter(|p| field.per_file.contains_key(*p))
            .map(str::to_string)
            .collect();
        ms.files.sort();
        ms.file_count = ms.files.len();
        ms.cohesion = m.cohesion;
        ms.coupling = m.coupling;
        ms.instability = m.instability;
        ms.abstractness = m.abstractness;
        ms.main_seq_distance = m.main_seq_distance;
        ms.boundary_alignment = m.boundary_alignment;
        ms.layer_violation_count = m.layer_violation_count;
        ms.role_consistency = m.role_consistency;
        modules.insert(ms.path.clone(), ms);
    }
    modules
}

fn collect_global(inputs: &FusionInputs<'_>, field: &SignalField) -> GlobalSignals {
    let mut g = GlobalSignals {
        modularity: inputs.analysis.modularity(),
        cycle_count: inputs.analysis.cycle_count(),
        centrality_gini: inputs.analysis.centrality_gini,
        clone_ratio: clamp01(inputs.clone_ratio),
        violation_rate: inputs.architecture.violation_rate,
        ..Default::default()
    };
    if let Some(spectral) = &inputs.analysis.spectral {
        g.fiedler_value = spectral.fiedler_value;
        g.spectral_gap = spectral.spectral_gap;
    }

    let total = field.per_file.len();
    if total > 0 {
        let orphans = field.per_file.values().filter(|fs| fs.is_orphan).count();
        let phantoms = field
            .per_file
            .values()
            .filter(|fs| fs.phantom_import_count > 0)
            .count();
        g.orphan_ratio = orphans as f64 / total as f64;
        g.phantom_ratio = phantoms as f64 / total as f64;
    }
    g.glue_deficit = glue_deficit(field);

    if let Some(temporal) = inputs.temporal {
        g.team_size = temporal.team_size.max(1);
        g.conway_alignment = team_alignment(inputs, temporal);
    }
    g
}

/// `1 - glue / max(sqrt(modules), 1)`, where glue files sit above the median
/// in both betweenness and out-degree.
pub fn glue_deficit(field: &SignalField) -> f64 {
    if field.per_file.is_empty() {
        return 0.0;
    }
    let mut betweenness: Vec<f64> = field.per_file.values().map(|fs| fs.betweenness).collect();
    let mut out_degree: Vec<usize> = field.per_file.values().map(|fs| fs.out_degree).collect();
    betweenness.sort_by(f64::total_cmp);
    out_degree.sort_unstable();
    let median_b = betweenness[betweenness.len() / 2];
    let median_out = out_degree[out_degree.len() / 2];

    let glue = field
        .per_file
        .values()
        .filter(|fs| fs.betweenness > median_b && fs.out_degree > median_out)
        .count();
    let expected = (field.per_module.len().max(1) as f64).sqrt();
    clamp01(1.0 - glue as f64 / expected.max(1.0))
}

fn team_alignment(inputs: &FusionInputs<'_>, temporal: &crate::git::TemporalAnalysis) -> f64 {
    let arch = inputs.architecture;
    let mut file_module: FxHashMap<&str, usize> = FxHashMap::default();
    for (v, &m) in arch.module_index.iter().enumerate() {
        file_module.insert(inputs.graph.path(v), m);
    }
    let coupled: FxHashSet<(usize, usize)> = inputs
        .graph
        .edges()
        .filter_map(|(s, d)| {
            let (ms, md) = (*arch.module_index.get(s)?, *arch.module_index.get(d)?);
            (ms != md).then_some((ms, md))
        })
        .collect();
    conway_alignment(&temporal.author_distances, &file_module, &coupled)
}
