//! Temporal analysis over an extracted history.

use std::collections::BTreeMap;
use std::path::Path;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::info;

use super::authors::{compute_author_distances, team_size, AuthorDistance};
use super::churn::{build_churn_series, ChurnSeries};
use super::cochange::{build_cochange_matrix, CoChangeMatrix, CoChangeOptions};
use super::history::{GitExtractor, GitHistory};
use crate::config::TemporalConfig;

/// Everything mined from one history, restricted to the analysed files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemporalAnalysis {
    pub history: GitHistory,
    pub churn: BTreeMap<String, ChurnSeries>,
    pub cochange: CoChangeMatrix,
    pub author_distances: Vec<AuthorDistance>,
    pub team_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TemporalEngine {
    config: TemporalConfig,
}

impl TemporalEngine {
    pub fn new(config: TemporalConfig) -> Self {
        Self { config }
    }

    /// Extract history from `repo` and analyze it.
    ///
    /// `None` when temporal analysis is disabled or history is unavailable.
    pub fn extract_and_analyze(
        &self,
        repo: &Path,
        known_files: &FxHashSet<&str>,
    ) -> Option<TemporalAnalysis> {
        if !self.config.enabled {
            info!("Temporal analysis disabled by configuration");
            return None;
        }
        let history = GitExtractor::from_config(repo, &self.config)
            .extract()
            .into_history()?;
        Some(self.analyze(history, known_files))
    }

    pub fn analyze(&self, history: GitHistory, known_files: &FxHashSet<&str>) -> TemporalAnalysis {
        let churn = build_churn_series(&history, known_files, self.config.window_weeks);
        let cochange =
            build_cochange_matrix(&history, known_files, CoChangeOptions::from(&self.config));
        let author_distances = compute_author_distances(&history, known_files);
        let team_size = team_size(&history);

        info!(
            "Temporal analysis: {} commits, {} files with churn, {} co-change pairs, {} authors",
            history.total_commits(),
            churn.len(),
            cochange.len(),
            team_size
        );

        TemporalAnalysis {
            history,
            churn,
            cochange,
            author_distances,
            team_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::history::Commit;
    use tempfile::tempdir;

    fn commit(ts: i64, author: &str, files: &[&str]) -> Commit {
        Commit {
            hash: format!("{:040x}", ts),
            timestamp: ts,
            author: author.to_string(),
            files: files.iter().map(|s| s.to_string()).collect(),
            subject: "update".to_string(),
        }
    }

    #[test]
    fn test_analyze_restricts_to_known_files() {
        let history = GitHistory::new(vec![
            commit(3, "alice", &["a.py", "b.py", "gone.py"]),
            commit(2, "bob", &["a.py", "b.py"]),
            commit(1, "alice", &["a.py"]),
        ]);
        let known: FxHashSet<&str> = ["a.py", "b.py"].into_iter().collect();
        let t = TemporalEngine::default().analyze(history, &known);

        assert_eq!(t.churn.len(), 2);
        assert!(!t.churn.contains_key("gone.py"));
        assert_eq!(t.cochange.len(), 1);
        assert_eq!(t.team_size, 2);
        assert_eq!(t.author_distances.len(), 1);
    }

    #[test]
    fn test_disabled_engine_returns_none() {
        let dir = tempdir().unwrap();
        let engine = TemporalEngine::new(TemporalConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(engine
            .extract_and_analyze(dir.path(), &FxHashSet::default())
            .is_none());
    }
}
