//! Temporally-decayed co-change matrix.
//!
//! Two files that keep changing in the same commits are coupled whether or
//! not an import connects them. Each commit contributes a weight that halves
//! every `half_life_days` going back from the newest commit, so recent
//! coupling dominates.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Serialize, Serializer};
use tracing::debug;

use super::history::GitHistory;
use crate::config::TemporalConfig;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Statistics for one unordered file pair (`file_a < file_b`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoChangePair {
    pub file_a: String,
    pub file_b: String,
    /// Undecayed number of commits touching both files
    pub cochange_count: u32,
    /// Decayed weight of the pair
    pub weight: f64,
    /// Decayed weight of all counted commits touching `file_a`
    pub total_a: f64,
    pub total_b: f64,
    /// P(B changed | A changed), decayed
    pub confidence_a_b: f64,
    pub confidence_b_a: f64,
    /// Observed over expected co-occurrence under independence
    pub lift: f64,
}

impl CoChangePair {
    /// The larger of the two directional confidences.
    pub fn max_confidence(&self) -> f64 {
        self.confidence_a_b.max(self.confidence_b_a)
    }
}

// JSON object keys must be strings
fn pairs_as_list<S: Serializer>(
    pairs: &BTreeMap<(String, String), CoChangePair>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(pairs.values())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoChangeMatrix {
    /// Keyed by `(file_a, file_b)` with `file_a < file_b`
    #[serde(serialize_with = "pairs_as_list")]
    pub pairs: BTreeMap<(String, String), CoChangePair>,
    /// Commits that survived the known-file and bulk filters
    pub total_commits: usize,
    /// Decayed weight of those commits
    pub total_weight: f64,
    /// Undecayed per-file change counts over counted commits
    pub file_change_counts: BTreeMap<String, u32>,
}

impl CoChangeMatrix {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Look up a pair in either order.
    pub fn get(&self, a: &str, b: &str) -> Option<&CoChangePair> {
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        self.pairs.get(&key)
    }

    /// Pairs involving `path`, strongest lift first.
    pub fn partners(&self, path: &str) -> Vec<&CoChangePair> {
        let mut found: Vec<&CoChangePair> = self
            .pairs
            .values()
            .filter(|p| p.file_a == path || p.file_b == path)
            .collect();
        found.sort_by(|x, y| y.lift.total_cmp(&x.lift));
        found
    }
}

/// Options for [`build_cochange_matrix`].
#[derive(Debug, Clone, Copy)]
pub struct CoChangeOptions {
    pub min_cochanges: usize,
    pub max_files_per_commit: usize,
    pub half_life_days: f64,
}

impl Default for CoChangeOptions {
    fn default() -> Self {
        Self {
            min_cochanges: 2,
            max_files_per_commit: 30,
            half_life_days: 90.0,
        }
    }
}

impl From<&TemporalConfig> for CoChangeOptions {
    fn from(config: &TemporalConfig) -> Self {
        Self {
            min_cochanges: config.min_cochanges,
            max_files_per_commit: config.max_files_per_commit,
            half_life_days: config.half_life_days,
        }
    }
}

/// `exp(-ln2 / half_life · age_days)`, 1.0 for a non-positive half-life.
pub fn decay_weight(age_days: f64, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return 1.0;
    }
    (-std::f64::consts::LN_2 / half_life_days * age_days.max(0.0)).exp()
}

pub fn build_cochange_matrix(
    history: &GitHistory,
    known_files: &FxHashSet<&str>,
    options: CoChangeOptions,
) -> CoChangeMatrix {
    let Some(newest) = history.newest_timestamp() else {
        return CoChangeMatrix::default();
    };

    let mut file_weight: FxHashMap<&str, f64> = FxHashMap::default();
    let mut file_count: FxHashMap<&str, u32> = FxHashMap::default();
    let mut pair_weight: FxHashMap<(&str, &str), f64> = FxHashMap::default();
    let mut pair_count: FxHashMap<(&str, &str), u32> = FxHashMap::default();
    let mut total_weight = 0.0;
    let mut total_commits = 0usize;
    let mut skipped_bulk = 0usize;

    for commit in history.commits() {
        let mut relevant: Vec<&str> = commit
            .files
            .iter()
            .map(String::as_str)
            .filter(|f| known_files.contains(f))
            .collect();
        relevant.sort_unstable();
        relevant.dedup();

        if relevant.is_empty() {
            continue;
        }
        if relevant.len() > options.max_files_per_commit {
            skipped_bulk += 1;
            continue;
        }

        let age_days = (newest - commit.timestamp) as f64 / SECONDS_PER_DAY;
        let w = decay_weight(age_days, options.half_life_days);
        total_weight += w;
        total_commits += 1;

        for &f in &relevant {
            *file_weight.entry(f).or_insert(0.0) += w;
            *file_count.entry(f).or_insert(0) += 1;
        }
        for (i, &a) in relevant.iter().enumerate() {
            for &b in &relevant[i + 1..] {
                *pair_weight.entry((a, b)).or_insert(0.0) += w;
                *pair_count.entry((a, b)).or_insert(0) += 1;
            }
        }
    }

    if skipped_bulk > 0 {
        debug!(
            "Skipped {} bulk commits touching more than {} files",
            skipped_bulk, options.max_files_per_commit
        );
    }

    let mut pairs = BTreeMap::new();
    for (&(a, b), &count) in &pair_count {
        if (count as usize) < options.min_cochanges {
            continue;
        }
        let w_ab = pair_weight.get(&(a, b)).copied().unwrap_or(0.0);
        let w_a = file_weight.get(a).copied().unwrap_or(0.0);
        let w_b = file_weight.get(b).copied().unwrap_or(0.0);

        let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
        let expected = if total_weight > 0.0 {
            w_a * w_b / total_weight
        } else {
            0.0
        };

        pairs.insert(
            (a.to_string(), b.to_string()),
            CoChangePair {
                file_a: a.to_string(),
                file_b: b.to_string(),
                cochange_count: count,
                weight: w_ab,
                total_a: w_a,
                total_b: w_b,
                confidence_a_b: ratio(w_ab, w_a),
                confidence_b_a: ratio(w_ab, w_b),
                lift: ratio(w_ab, expected),
            },
        );
    }

    debug!(
        "Co-change matrix: {} pairs from {} commits",
        pairs.len(),
        total_commits
    );

    CoChangeMatrix {
        pairs,
        total_commits,
        total_weight,
        file_change_counts: file_count
            .into_iter()
            .map(|(f, c)| (f.to_string(), c))
            .collect(),
    }
}
