//! Percentile normalization.
//!
//! Percentiles are only meaningful with enough files, so the ABSOLUTE tier
//! (<15 files) gets none. Otherwise `pctl(x) = |{v : v <= x}| / N`; the
//! inclusive comparison keeps tied values at the same, highest rank.

use std::collections::BTreeMap;

use tracing::debug;

use super::field::{FileSignals, ModuleSignals, SignalField};
use super::registry::{Scope, Signal, SignalRegistry};

/// Raw values below these floors are forced to percentile 0 regardless of
/// rank, so that a cluster of trivially small values cannot rank high.
pub const ABSOLUTE_FLOORS: &[(Signal, f64)] = &[
    (Signal::Pagerank, 0.005),
    (Signal::BlastRadiusSize, 5.0),
    (Signal::CognitiveLoad, 10.0),
    (Signal::Lines, 100.0),
];

/// `|{v in sorted : v <= value}| / |sorted|`; 0.0 for an empty sample.
pub fn percentile(value: f64, sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = sorted.partition_point(|&v| v <= value);
    rank as f64 / sorted.len() as f64
}

/// Apply the absolute floor for `signal`, if any.
pub fn effective_percentile(signal: Signal, raw: f64, pctl: f64) -> f64 {
    match ABSOLUTE_FLOORS.iter().find(|(s, _)| *s == signal) {
        Some(&(_, floor)) if raw < floor => 0.0,
        _ => pctl,
    }
}

/// Anything that carries its own percentile map.
trait Ranked {
    fn raw(&self, signal: Signal) -> Option<f64>;
    fn percentiles_mut(&mut self) -> &mut BTreeMap<Signal, f64>;
}

impl Ranked for FileSignals {
    fn raw(&self, signal: Signal) -> Option<f64> {
        self.get(signal)?.as_f64()
    }

    fn percentiles_mut(&mut self) -> &mut BTreeMap<Signal, f64> {
        &mut self.percentiles
    }
}

impl Ranked for ModuleSignals {
    fn raw(&self, signal: Signal) -> Option<f64> {
        self.get(signal)?.as_f64()
    }

    fn percentiles_mut(&mut self) -> &mut BTreeMap<Signal, f64> {
        &mut self.percentiles
    }
}

/// Rank every entity against its peers. Null values neither get a
/// percentile nor enter the sample.
fn rank<T: Ranked>(entities: &mut BTreeMap<String, T>, signals: &[Signal]) {
    for &signal in signals {
        let mut sorted: Vec<f64> = entities.values().filter_map(|e| e.raw(signal)).collect();
        if sorted.is_empty() {
            continue;
        }
        sorted.sort_by(f64::total_cmp);

        for entity in entities.values_mut() {
            if let Some(value) = entity.raw(signal) {
                let pctl = effective_percentile(signal, value, percentile(value, &sorted));
                entity.percentiles_mut().insert(signal, pctl);
            }
        }
    }
}

/// Fill `percentiles` for every file over every percentileable file signal.
pub fn normalize(field: &mut SignalField, registry: &SignalRegistry) {
    if !field.tier().is_normalized() {
        debug!("{} tier: skipping percentile normalization", field.tier());
        return;
    }
    rank(&mut field.per_file, &registry.percentileable_in(Scope::File));
}

/// Fill module `percentiles`, ranking each module against the others.
///
/// Runs once module aggregation is complete. The tier is still decided by
/// the file count.
pub fn normalize_modules(field: &mut SignalField, registry: &SignalRegistry) {
    if !field.tier().is_normalized() {
        return;
    }
    rank(&mut field.per_module, &registry.percentileable_in(Scope::Module));
}
