//! Per-file churn time series and trajectory classification.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::Serialize;

use super::history::GitHistory;
use crate::math;

pub const FIX_KEYWORDS: &[&str] = &["fix", "bug", "patch", "hotfix", "bugfix", "repair", "issue"];
pub const REFACTOR_KEYWORDS: &[&str] = &[
    "refactor",
    "cleanup",
    "clean up",
    "reorganize",
    "restructure",
    "rename",
];

const SLOPE_THRESHOLD: f64 = 0.1;
const CV_THRESHOLD: f64 = 0.5;
const SECONDS_PER_WEEK: i64 = 7 * 86_400;

/// Shape of a file's change history over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trajectory {
    /// At most one change, or perfectly even activity
    #[default]
    Dormant,
    /// Declining and steady
    Stabilizing,
    /// Rising and erratic
    Spiking,
    /// Erratic with no clear trend
    Churning,
    Stable,
}

impl Trajectory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trajectory::Dormant => "DORMANT",
            Trajectory::Stabilizing => "STABILIZING",
            Trajectory::Spiking => "SPIKING",
            Trajectory::Churning => "CHURNING",
            Trajectory::Stable => "STABLE",
        }
    }

    /// Churning and spiking files count as unstable in risk scoring.
    pub fn is_volatile(&self) -> bool {
        matches!(self, Trajectory::Churning | Trajectory::Spiking)
    }
}

impl std::fmt::Display for Trajectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChurnSeries {
    pub window_counts: Vec<u32>,
    pub total_changes: u32,
    pub trajectory: Trajectory,
    pub slope: f64,
    pub cv: f64,
    /// Effective number of authors, 2^H
    pub bus_factor: f64,
    pub author_entropy: f64,
    pub fix_ratio: f64,
    pub refactor_ratio: f64,
    /// Entropy of the window distribution
    pub change_entropy: f64,
    /// Commits per author
    pub authors: BTreeMap<String, u32>,
}

fn subject_matches(subject_lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| subject_lower.contains(kw))
}

/// Classify a window series.
///
/// DORMANT if total ≤ 1 or cv = 0; otherwise STABILIZING (slope < −0.1,
/// cv < 0.5), SPIKING (slope > 0.1, cv > 0.5), CHURNING (cv > 0.5) or
/// STABLE.
pub fn classify_trajectory(window_counts: &[u32]) -> Trajectory {
    let values: Vec<f64> = window_counts.iter().map(|&c| c as f64).collect();
    let total: u32 = window_counts.iter().sum();
    classify(
        total,
        math::linear_slope(&values),
        math::coefficient_of_variation(&values),
    )
}

fn classify(total: u32, slope: f64, cv: f64) -> Trajectory {
    if total <= 1 || cv == 0.0 {
        Trajectory::Dormant
    } else if slope < -SLOPE_THRESHOLD && cv < CV_THRESHOLD {
        Trajectory::Stabilizing
    } else if slope > SLOPE_THRESHOLD && cv > CV_THRESHOLD {
        Trajectory::Spiking
    } else if cv > CV_THRESHOLD {
        Trajectory::Churning
    } else {
        Trajectory::Stable
    }
}

/// Bucket each known file's changes into `window_weeks`-wide windows
/// starting at the oldest commit and summarise them.
///
/// Files never touched by a commit get no entry.
pub fn build_churn_series(
    history: &GitHistory,
    known_files: &FxHashSet<&str>,
    window_weeks: u32,
) -> BTreeMap<String, ChurnSeries> {
    let (Some(min_ts), Some(max_ts)) = (history.oldest_timestamp(), history.newest_timestamp())
    else {
        return BTreeMap::new();
    };
    let window_secs = i64::from(window_weeks) * SECONDS_PER_WEEK;
    if window_secs == 0 {
        return BTreeMap::new();
    }
    let num_windows = ((max_ts - min_ts) / window_secs + 1).max(1) as usize;

    #[derive(Default)]
    struct Acc {
        windows: Vec<u32>,
        authors: BTreeMap<String, u32>,
        commits: u32,
        fixes: u32,
        refactors: u32,
    }

    let mut acc: BTreeMap<&str, Acc> = BTreeMap::new();
    for commit in history.commits() {
        let window = (((commit.timestamp - min_ts) / window_secs) as usize).min(num_windows - 1);
        let subject = commit.subject.to_lowercase();
        let is_fix = subject_matches(&subject, FIX_KEYWORDS);
        let is_refactor = subject_matches(&subject, REFACTOR_KEYWORDS);

        for file in &commit.files {
            if !known_files.contains(file.as_str()) {
                continue;
            }
            let entry = acc.entry(file.as_str()).or_insert_with(|| Acc {
                windows: vec![0; num_windows],
                ..Default::default()
            });
            entry.windows[window] += 1;
            *entry.authors.entry(commit.author.clone()).or_insert(0) += 1;
            entry.commits += 1;
            if is_fix {
                entry.fixes += 1;
            }
            if is_refactor {
                entry.refactors += 1;
            }
        }
    }

    acc.into_iter()
        .map(|(path, a)| {
            let values: Vec<f64> = a.windows.iter().map(|&c| c as f64).collect();
            let total: u32 = a.windows.iter().sum();
            let slope = math::linear_slope(&values);
            let cv = math::coefficient_of_variation(&values);
            let author_entropy = math::entropy(a.authors.values().copied());
            let ratio = |n: u32| {
                if a.commits > 0 {
                    n as f64 / a.commits as f64
                } else {
                    0.0
                }
            };
            let series = ChurnSeries {
                trajectory: classify(total, slope, cv),
                change_entropy: math::entropy(a.windows.iter().copied()),
                total_changes: total,
                slope,
                cv,
                bus_factor: 2f64.powf(author_entropy),
                author_entropy,
                fix_ratio: ratio(a.fixes),
                refactor_ratio: ratio(a.refactors),
                window_counts: a.windows,
                authors: a.authors,
            };
            (path.to_string(), series)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::history::Commit;

    const WEEK: i64 = SECONDS_PER_WEEK;

    fn commit(ts: i64, author: &str, subject: &str, files: &[&str]) -> Commit {
        Commit {
            hash: format!("{:040x}", ts),
            timestamp: ts,
            author: author.to_string(),
            files: files.iter().map(|s| s.to_string()).collect(),
            subject: subject.to_string(),
        }
    }

    #[test]
    fn test_trajectory_rules() {
        assert_eq!(classify_trajectory(&[10, 8, 6, 4]), Trajectory::Stabilizing);
        assert_eq!(classify_trajectory(&[0, 0, 0, 0]), Trajectory::Dormant);
        assert_eq!(classify_trajectory(&[1, 2, 3, 15]), Trajectory::Spiking);
        assert_eq!(classify_trajectory(&[0, 1, 0, 0]), Trajectory::Dormant);
        assert_eq!(classify_trajectory(&[5, 5, 5, 5]), Trajectory::Dormant);
        assert_eq!(classify_trajectory(&[6, 0, 6, 0]), Trajectory::Churning);
        assert_eq!(classify_trajectory(&[4, 5, 4, 5]), Trajectory::Stable);
        assert!(Trajectory::Spiking.is_volatile());
        assert!(!Trajectory::Stable.is_volatile());
    }

    #[test]
    fn test_build_series_windows_and_ratios() {
        let history = GitHistory::new(vec![
            commit(9 * WEEK, "bob", "Refactor parser", &["a.py"]),
            commit(5 * WEEK, "alice", "Fix bug in loader", &["a.py", "b.py"]),
            commit(WEEK, "alice", "add feature", &["a.py", "vendor/x.py"]),
            commit(0, "alice", "HOTFIX crash", &["a.py"]),
        ]);
        let known: FxHashSet<&str> = ["a.py", "b.py"].into_iter().collect();
        let series = build_churn_series(&history, &known, 4);

        assert_eq!(series.len(), 2);
        let a = &series["a.py"];
        // 9 weeks span with 4-week windows: 3 windows
        assert_eq!(a.window_counts, vec![2, 1, 1]);
        assert_eq!(a.total_changes, 4);
        assert!((a.fix_ratio - 0.5).abs() < 1e-12);
        assert!((a.refactor_ratio - 0.25).abs() < 1e-12);
        assert_eq!(a.authors["alice"], 3);
        // shares 3/4 and 1/4
        let h = -(0.75f64 * 0.75f64.log2() + 0.25 * 0.25f64.log2());
        assert!((a.author_entropy - h).abs() < 1e-12);
        assert!((a.bus_factor - 2f64.powf(h)).abs() < 1e-12);

        let b = &series["b.py"];
        assert_eq!(b.total_changes, 1);
        assert_eq!(b.trajectory, Trajectory::Dormant);
        assert_eq!(b.bus_factor, 1.0);
    }

    #[test]
    fn test_empty_history() {
        let known: FxHashSet<&str> = FxHashSet::default();
        assert!(build_churn_series(&GitHistory::default(), &known, 4).is_empty());
    }
}
