//! Module-level aggregation of file and temporal signals.
//!
//! Runs after normalization: the module bus factor needs the pagerank
//! percentile to find critical files. A module is a directory, so the
//! per-directory aggregates live here as well.

use std::collections::BTreeMap;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::git::GitHistory;
use crate::math::{gini, mean};
use crate::signals::{Signal, SignalField};

const CRITICAL_PAGERANK_PCTL: f64 = 0.75;

/// Most frequent item; ties go to the one seen first.
fn dominant<T: Copy + Eq + Hash>(items: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts: FxHashMap<T, usize> = FxHashMap::default();
    let mut order = Vec::new();
    for item in items {
        let count = counts.entry(item).or_insert(0);
        if *count == 0 {
            order.push(item);
        }
        *count += 1;
    }
    let mut best: Option<(T, usize)> = None;
    for item in order {
        let count = counts[&item];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((item, count));
        }
    }
    best.map(|(item, _)| item)
}

/// Median `total_changes` over every file, 0 for an empty field.
fn median_changes(field: &SignalField) -> u32 {
    let mut changes: Vec<u32> = field.per_file.values().map(|fs| fs.total_changes).collect();
    changes.sort_unstable();
    changes.get(changes.len() / 2).copied().unwrap_or(0)
}

pub(super) fn fill_module_temporal(field: &mut SignalField, history: Option<&GitHistory>) {
    let median = median_changes(field);
    let per_file = &field.per_file;
    for ms in field.per_module.values_mut() {
        let members: Vec<_> = ms.files.iter().filter_map(|p| per_file.get(p)).collect();

        let loads: Vec<f64> = members.iter().map(|fs| fs.cognitive_load).collect();
        ms.mean_cognitive_load = mean(&loads).unwrap_or(0.0);
        ms.total_lines = members.iter().map(|fs| fs.lines).sum();
        ms.total_functions = members.iter().map(|fs| fs.function_count).sum();
        let churn: Vec<f64> = members.iter().map(|fs| f64::from(fs.total_changes)).collect();
        ms.mean_churn = mean(&churn).unwrap_or(0.0);
        ms.dominant_role = dominant(members.iter().map(|fs| fs.role)).unwrap_or_default();
        ms.dominant_trajectory =
            dominant(members.iter().map(|fs| fs.churn_trajectory)).unwrap_or_default();
        ms.hotspot_file_count = members.iter().filter(|fs| fs.total_changes > median).count();

        let Some(history) = history else {
            continue;
        };

        let files: FxHashSet<&str> = ms.files.iter().map(String::as_str).collect();
        let mut author_commits: BTreeMap<&str, usize> = BTreeMap::new();
        let mut commits = 0usize;
        for commit in history.commits() {
            if commit.files.iter().any(|f| files.contains(f.as_str())) {
                commits += 1;
                *author_commits.entry(commit.author.as_str()).or_insert(0) += 1;
            }
        }

        let weeks = (history.span_days() as f64 / 7.0).max(1.0);
        ms.velocity = commits as f64 / weeks;
        if commits > 0 {
            ms.coordination_cost = author_commits.len() as f64 / commits as f64;
        }
        if author_commits.len() > 1 {
            let counts: Vec<f64> = author_commits.values().map(|&c| c as f64).collect();
            ms.knowledge_gini = gini(&counts);
        }

        let critical = members
            .iter()
            .filter(|fs| fs.pctl(Signal::Pagerank) > CRITICAL_PAGERANK_PCTL)
            .map(|fs| fs.bus_factor)
            .reduce(f64::min);
        ms.module_bus_factor = match critical {
            Some(bf) => bf,
            None => {
                let all: Vec<f64> = members.iter().map(|fs| fs.bus_factor).collect();
                mean(&all).unwrap_or(1.0)
            }
        };
    }
}
