//! Authorship overlap between files.

use std::collections::BTreeMap;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::debug;

use super::history::GitHistory;

/// Weighted Jaccard distance between the author distributions of two files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorDistance {
    pub file_a: String,
    pub file_b: String,
    /// 0.0 = identical ownership, 1.0 = disjoint
    pub distance: f64,
}

/// Per-file author shares (commits by author / commits on file).
fn author_shares<'h>(
    history: &'h GitHistory,
    files: &FxHashSet<&str>,
) -> BTreeMap<&'h str, BTreeMap<&'h str, f64>> {
    let mut counts: BTreeMap<&str, BTreeMap<&str, u32>> = BTreeMap::new();
    for commit in history.commits() {
        for file in &commit.files {
            if files.contains(file.as_str()) {
                *counts
                    .entry(file.as_str())
                    .or_default()
                    .entry(commit.author.as_str())
                    .or_insert(0) += 1;
            }
        }
    }

    counts
        .into_iter()
        .map(|(file, by_author)| {
            let total: u32 = by_author.values().sum();
            let shares = by_author
                .into_iter()
                .map(|(a, c)| (a, c as f64 / total.max(1) as f64))
                .collect();
            (file, shares)
        })
        .collect()
}

fn weighted_jaccard_distance(a: &BTreeMap<&str, f64>, b: &BTreeMap<&str, f64>) -> f64 {
    let mut min_sum = 0.0;
    let mut max_sum = 0.0;
    for (author, &wa) in a {
        let wb = b.get(author).copied().unwrap_or(0.0);
        min_sum += wa.min(wb);
        max_sum += wa.max(wb);
    }
    for (author, &wb) in b {
        if !a.contains_key(author) {
            max_sum += wb;
        }
    }
    if max_sum > 0.0 {
        1.0 - min_sum / max_sum
    } else {
        1.0
    }
}

/// Distances for every pair of `files` sharing at least one author.
///
/// Returns nothing for histories with fewer than two distinct authors.
/// Pairs are ordered `file_a < file_b` and sorted.
pub fn compute_author_distances(
    history: &GitHistory,
    files: &FxHashSet<&str>,
) -> Vec<AuthorDistance> {
    if history.authors().len() < 2 {
        return Vec::new();
    }

    let shares = author_shares(history, files);
    let ordered: Vec<(&str, &BTreeMap<&str, f64>)> =
        shares.iter().map(|(f, s)| (*f, s)).collect();
    let mut author_files: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    for (i, (_, s)) in ordered.iter().enumerate() {
        for author in s.keys() {
            author_files.entry(*author).or_default().push(i);
        }
    }

    let distances: Vec<AuthorDistance> = ordered
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, (file_a, shares_a))| {
            let mut partners: Vec<usize> = shares_a
                .keys()
                .filter_map(|author| author_files.get(author))
                .flatten()
                .copied()
                .filter(|&j| j > i)
                .collect();
            partners.sort_unstable();
            partners.dedup();

            partners
                .into_iter()
                .map(|j| {
                    let (file_b, shares_b) = ordered[j];
                    AuthorDistance {
                        file_a: file_a.to_string(),
                        file_b: file_b.to_string(),
                        distance: weighted_jaccard_distance(shares_a, shares_b),
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();

    debug!(
        "Computed {} author distances over {} files",
        distances.len(),
        ordered.len()
    );
    distances
}

/// Alignment of team structure with module structure.
///
/// `1 − mean(distance)` over author-distance pairs that cross module
/// boundaries between structurally coupled modules. `coupled` holds
/// directed module pairs; either direction counts. 1.0 when no pair
/// qualifies.
pub fn conway_alignment(
    distances: &[AuthorDistance],
    file_module: &FxHashMap<&str, usize>,
    coupled: &FxHashSet<(usize, usize)>,
) -> f64 {
    let crossing: Vec<f64> = distances
        .iter()
        .filter_map(|d| {
            let ma = *file_module.get(d.file_a.as_str())?;
            let mb = *file_module.get(d.file_b.as_str())?;
            (ma != mb && (coupled.contains(&(ma, mb)) || coupled.contains(&(mb, ma))))
                .then_some(d.distance)
        })
        .collect();

    if crossing.is_empty() {
        return 1.0;
    }
    let mean = crossing.iter().sum::<f64>() / crossing.len() as f64;
    (1.0 - mean).max(0.0)
}

/// Distinct authors in the history, at least 1.
pub fn team_size(history: &GitHistory) -> usize {
    history.authors().len().max(1)
}
