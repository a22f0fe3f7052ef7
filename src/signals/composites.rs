//! Composite scores.
//!
//! Each composite is a fixed weighted sum over already-computed signals. Every
//! weight vector sums to 1.0 and every output is clamped to `[0, 1]`.
//! Composites need percentiles, so they are only computed in the BAYESIAN
//! and FULL tiers; the ABSOLUTE tier keeps the field defaults.

use tracing::debug;

use super::field::{FileSignals, ModuleSignals, SignalField};
use super::registry::Signal;
use crate::git::Trajectory;
use crate::math::{clamp01, mean};

/// pagerank, blast radius, cognitive load, churn, bus factor
pub const RISK_WEIGHTS: [f64; 5] = [0.25, 0.20, 0.20, 0.20, 0.15];

/// orphan, stub, phantom, broken calls (penalties)
pub const WIRING_QUALITY_WEIGHTS: [f64; 4] = [0.30, 0.25, 0.25, 0.20];

/// risk, wiring deficit, cognitive load, stub, orphan (penalties)
pub const FILE_HEALTH_WEIGHTS: [f64; 5] = [0.25, 0.25, 0.20, 0.15, 0.15];

/// cohesion, decoupling, main-sequence fit, boundary, role consistency,
/// implementation completeness
pub const MODULE_HEALTH_WEIGHTS: [f64; 6] = [0.20, 0.15, 0.20, 0.15, 0.15, 0.15];

/// Risk score above which a file counts as high risk.
pub const HIGH_RISK: f64 = 0.7;

/// Position of the main-sequence term, dropped for isolated modules.
const MODULE_HEALTH_DISTANCE: usize = 2;

/// orphan ratio, phantom ratio, glue deficit, stub, clones (penalties)
pub const WIRING_SCORE_WEIGHTS: [f64; 5] = [0.25, 0.25, 0.20, 0.15, 0.15];

/// violations, cohesion, coupling, main-sequence distance, boundary
pub const ARCHITECTURE_WEIGHTS: [f64; 5] = [0.25, 0.20, 0.20, 0.20, 0.15];

/// bus factor, knowledge spread, coordination, Conway alignment
pub const TEAM_RISK_WEIGHTS: [f64; 4] = [0.30, 0.25, 0.25, 0.20];

/// architecture, wiring, bus factor, modularity
pub const CODEBASE_WEIGHTS: [f64; 4] = [0.30, 0.30, 0.20, 0.20];

const CRITICAL_PAGERANK_PCTL: f64 = 0.75;
const VOLATILE_CHURN_FACTOR: f64 = 1.0;
const CALM_CHURN_FACTOR: f64 = 0.3;
const BUS_FACTOR_CAP: f64 = 3.0;
const COORDINATION_CAP: f64 = 5.0;

/// Churn term shared by the risk formulas.
pub(crate) fn churn_factor(trajectory: Trajectory) -> f64 {
    if trajectory.is_volatile() {
        VOLATILE_CHURN_FACTOR
    } else {
        CALM_CHURN_FACTOR
    }
}

fn weighted(weights: &[f64], terms: &[f64]) -> f64 {
    weights.iter().zip(terms).map(|(w, t)| w * t).sum()
}

/// Per-file risk from percentiles. Files that never changed carry no risk.
pub fn risk_score(fs: &FileSignals, max_bus_factor: f64) -> f64 {
    if fs.total_changes == 0 {
        return 0.0;
    }
    let terms = [
        fs.pctl(Signal::Pagerank),
        fs.pctl(Signal::BlastRadiusSize),
        fs.pctl(Signal::CognitiveLoad),
        churn_factor(fs.churn_trajectory),
        1.0 - fs.bus_factor / max_bus_factor.max(1.0),
    ];
    clamp01(weighted(&RISK_WEIGHTS, &terms))
}

pub fn wiring_quality(fs: &FileSignals) -> f64 {
    let orphan = if fs.is_orphan { 1.0 } else { 0.0 };
    let terms = [
        orphan,
        fs.stub_ratio,
        fs.phantom_import_count as f64 / fs.import_count.max(1) as f64,
        fs.broken_call_count as f64 / (fs.in_degree + fs.out_degree).max(1) as f64,
    ];
    clamp01(1.0 - weighted(&WIRING_QUALITY_WEIGHTS, &terms))
}

/// Needs `risk_score` and `wiring_quality` already set on `fs`.
pub fn file_health(fs: &FileSignals) -> f64 {
    let orphan = if fs.is_orphan { 1.0 } else { 0.0 };
    let terms = [
        fs.risk_score,
        1.0 - fs.wiring_quality,
        fs.pctl(Signal::CognitiveLoad),
        fs.stub_ratio,
        orphan,
    ];
    clamp01(1.0 - weighted(&FILE_HEALTH_WEIGHTS, &terms))
}

/// Module health. Isolated modules have no main-sequence distance, so that
/// term is dropped and the remaining weights rescaled to sum to 1.
pub fn module_health(
    cohesion: f64,
    coupling: f64,
    main_seq_distance: Option<f64>,
    boundary_alignment: f64,
    role_consistency: f64,
    mean_stub: f64,
) -> f64 {
    let mut terms = [
        cohesion,
        1.0 - coupling,
        1.0 - main_seq_distance.unwrap_or(0.0),
        boundary_alignment,
        role_consistency,
        1.0 - mean_stub,
    ];
    let score = match main_seq_distance {
        Some(_) => weighted(&MODULE_HEALTH_WEIGHTS, &terms),
        None => {
            terms[MODULE_HEALTH_DISTANCE] = 0.0;
            let kept = 1.0 - MODULE_HEALTH_WEIGHTS[MODULE_HEALTH_DISTANCE];
            weighted(&MODULE_HEALTH_WEIGHTS, &terms) / kept
        }
    };
    clamp01(score)
}

/// Lowest bus factor among critical files (pagerank percentile above 0.75),
/// or among all files when none is critical. 1.0 for an empty field.
pub fn critical_bus_factor(field: &SignalField) -> f64 {
    field
        .per_file
        .values()
        .filter(|fs| fs.pctl(Signal::Pagerank) > CRITICAL_PAGERANK_PCTL)
        .map(|fs| fs.bus_factor)
        .reduce(f64::min)
        .or_else(|| field.per_file.values().map(|fs| fs.bus_factor).reduce(f64::min))
        .unwrap_or(1.0)
}

/// Fill every composite signal. No-op in the ABSOLUTE tier.
pub fn compute_composites(field: &mut SignalField) {
    if !field.tier().is_normalized() {
        debug!("{} tier: composites keep their defaults", field.tier());
        return;
    }

    let max_bus_factor = field
        .per_file
        .values()
        .map(|fs| fs.bus_factor)
        .fold(0.0, f64::max);
    for fs in field.per_file.values_mut() {
        fs.risk_score = risk_score(fs, max_bus_factor);
        fs.wiring_quality = wiring_quality(fs);
        fs.file_health_score = file_health(fs);
    }

    let per_file = &field.per_file;
    for ms in field.per_module.values_mut() {
        let members: Vec<&FileSignals> = ms.files.iter().filter_map(|p| per_file.get(p)).collect();
        let risks: Vec<f64> = members.iter().map(|fs| fs.risk_score).collect();
        ms.mean_risk = mean(&risks).unwrap_or(0.0);
        ms.high_risk_file_count = risks.iter().filter(|&&r| r > HIGH_RISK).count();

        let stubs: Vec<f64> = members.iter().map(|fs| fs.stub_ratio).collect();
        let distance = ms.instability.map(|_| ms.main_seq_distance);
        ms.health_score = module_health(
            ms.cohesion,
            ms.coupling,
            distance,
            ms.boundary_alignment,
            ms.role_consistency,
            mean(&stubs).unwrap_or(0.0),
        );
    }

    let bf_crit = critical_bus_factor(field);
    let stubs: Vec<f64> = field.per_file.values().map(|fs| fs.stub_ratio).collect();
    let mean_stub = mean(&stubs).unwrap_or(0.0);

    let modules: Vec<&ModuleSignals> = field.per_module.values().collect();
    let module_mean = |f: &dyn Fn(&ModuleSignals) -> f64| {
        let values: Vec<f64> = modules.iter().map(|&m| f(m)).collect();
        mean(&values).unwrap_or(0.0)
    };
    let connected_distance: Vec<f64> = modules
        .iter()
        .filter(|m| !m.is_isolated())
        .map(|m| m.main_seq_distance)
        .collect();
    let architecture_health = if modules.is_empty() {
        0.0
    } else {
        clamp01(weighted(
            &ARCHITECTURE_WEIGHTS,
            &[
                1.0 - field.global.violation_rate,
                module_mean(&|m| m.cohesion),
                1.0 - module_mean(&|m| m.coupling),
                1.0 - mean(&connected_distance).unwrap_or(0.0),
                module_mean(&|m| m.boundary_alignment),
            ],
        ))
    };
    let max_knowledge_gini = modules
        .iter()
        .map(|m| m.knowledge_gini)
        .fold(0.0, f64::max);
    let mean_coordination = module_mean(&|m| m.coordination_cost);

    let g = &mut field.global;
    g.wiring_score = clamp01(
        1.0 - weighted(
            &WIRING_SCORE_WEIGHTS,
            &[
                g.orphan_ratio,
                g.phantom_ratio,
                g.glue_deficit,
                mean_stub,
                g.clone_ratio,
            ],
        ),
    );
    g.architecture_health = architecture_health;
    g.team_risk = clamp01(
        1.0 - weighted(
            &TEAM_RISK_WEIGHTS,
            &[
                bf_crit.min(BUS_FACTOR_CAP) / BUS_FACTOR_CAP,
                1.0 - max_knowledge_gini,
                1.0 - mean_coordination.min(COORDINATION_CAP) / COORDINATION_CAP,
                g.conway_alignment,
            ],
        ),
    );
    let team = g.team_size.max(1) as f64;
    g.codebase_health = clamp01(weighted(
        &CODEBASE_WEIGHTS,
        &[
            g.architecture_health,
            g.wiring_score,
            bf_crit.min(team) / team,
            g.modularity,
        ],
    ));

    debug!(
        "Composites: architecture {:.3}, wiring {:.3}, team risk {:.3}, codebase {:.3}",
        g.architecture_health, g.wiring_score, g.team_risk, g.codebase_health
    );
}
