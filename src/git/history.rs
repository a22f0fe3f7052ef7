//! Git history extraction via the git CLI
//!
//! Runs `git log` as a subprocess under a hard timeout and parses its
//! output into an immutable [`GitHistory`]. Anything that prevents a usable
//! history (not a repository, git missing, timeout, too few commits) yields
//! [`GitExtraction::Unavailable`] rather than an error, so callers simply
//! skip temporal signals.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::command::run_with_timeout;
use crate::config::TemporalConfig;

/// Maximum `git log` output kept in memory.
pub const MAX_LOG_OUTPUT_BYTES: usize = 50 * 1024 * 1024;

const SECONDS_PER_DAY: i64 = 86_400;

static HEADER: OnceLock<Regex> = OnceLock::new();

/// `<40-hex hash>|<epoch seconds>|<author>[|<subject>]`
fn header_pattern() -> &'static Regex {
    HEADER.get_or_init(|| {
        Regex::new(r"^[0-9a-f]{40}\|\d+\|[^|]+(\|.*)?$").expect("commit header pattern is valid")
    })
}

/// A single commit as seen by `git log --name-only`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub hash: String,
    /// Unix timestamp (author time)
    pub timestamp: i64,
    /// Author identity (email)
    pub author: String,
    pub files: Vec<String>,
    /// First line of the commit message
    pub subject: String,
}

impl Commit {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
    }
}

/// Ordered commit history, newest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GitHistory {
    commits: Vec<Commit>,
    file_set: BTreeSet<String>,
    span_days: i64,
}

impl GitHistory {
    pub fn new(commits: Vec<Commit>) -> Self {
        let file_set = commits
            .iter()
            .flat_map(|c| c.files.iter().cloned())
            .collect();

        let span_days = match (
            commits.iter().map(|c| c.timestamp).max(),
            commits.iter().map(|c| c.timestamp).min(),
        ) {
            (Some(newest), Some(oldest)) if commits.len() >= 2 => {
                ((newest - oldest) / SECONDS_PER_DAY).max(1)
            }
            _ => 0,
        };

        Self {
            commits,
            file_set,
            span_days,
        }
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub fn total_commits(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Every path touched by any commit.
    pub fn file_set(&self) -> &BTreeSet<String> {
        &self.file_set
    }

    /// Days between the oldest and newest commit; at least 1 once there are
    /// two commits, 0 otherwise.
    pub fn span_days(&self) -> i64 {
        self.span_days
    }

    pub fn newest_timestamp(&self) -> Option<i64> {
        self.commits.iter().map(|c| c.timestamp).max()
    }

    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.commits.iter().map(|c| c.timestamp).min()
    }

    pub fn authors(&self) -> BTreeSet<&str> {
        self.commits.iter().map(|c| c.author.as_str()).collect()
    }
}

/// Outcome of a history extraction.
#[derive(Debug, Clone)]
pub enum GitExtraction {
    Available(GitHistory),
    /// History could not be used; the reason is for logs only
    Unavailable(String),
}

impl GitExtraction {
    pub fn history(&self) -> Option<&GitHistory> {
        match self {
            GitExtraction::Available(h) => Some(h),
            GitExtraction::Unavailable(_) => None,
        }
    }

    pub fn into_history(self) -> Option<GitHistory> {
        match self {
            GitExtraction::Available(h) => Some(h),
            GitExtraction::Unavailable(_) => None,
        }
    }
}

/// Extracts [`GitHistory`] from a repository through the git CLI.
#[derive(Debug, Clone)]
pub struct GitExtractor {
    repo_path: PathBuf,
    max_commits: usize,
    min_commits: usize,
    log_timeout: Duration,
    probe_timeout: Duration,
}

impl GitExtractor {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self::from_config(repo_path, &TemporalConfig::default())
    }

    pub fn from_config(repo_path: impl Into<PathBuf>, config: &TemporalConfig) -> Self {
        Self {
            repo_path: repo_path.into(),
            max_commits: config.max_commits,
            min_commits: config.min_commits,
            log_timeout: config.log_timeout(),
            probe_timeout: config.probe_timeout(),
        }
    }

    pub fn with_max_commits(mut self, max_commits: usize) -> Self {
        self.max_commits = max_commits;
        self
    }

    pub fn with_min_commits(mut self, min_commits: usize) -> Self {
        self.min_commits = min_commits;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.log_timeout = timeout;
        self
    }

    /// Whether `git rev-parse --git-dir` succeeds in the repository.
    pub fn is_git_repo(&self) -> bool {
        let repo = self.repo_path.to_string_lossy().into_owned();
        let out = run_with_timeout(
            "git",
            &["-C", repo.as_str(), "rev-parse", "--git-dir"],
            None,
            self.probe_timeout,
            64 * 1024,
        );
        out.exited_cleanly()
    }

    pub fn extract(&self) -> GitExtraction {
        if !self.is_git_repo() {
            info!(
                "{} is not a git repository, skipping temporal analysis",
                self.repo_path.display()
            );
            return GitExtraction::Unavailable("not a git repository".to_string());
        }

        let repo = self.repo_path.to_string_lossy().into_owned();
        let limit = format!("-n{}", self.max_commits);
        let out = run_with_timeout(
            "git",
            &[
                "-C",
                repo.as_str(),
                "log",
                "--format=%H|%at|%ae|%s",
                "--name-only",
                limit.as_str(),
            ],
            None,
            self.log_timeout,
            MAX_LOG_OUTPUT_BYTES,
        );
        if !out.exited_cleanly() {
            let reason = out.failure_reason();
            warn!("git log failed: {}", reason);
            return GitExtraction::Unavailable(reason);
        }

        let commits = parse_log(&out.stdout);
        if commits.len() < self.min_commits {
            info!(
                "Only {} commits with file changes (need {}), skipping temporal analysis",
                commits.len(),
                self.min_commits
            );
            return GitExtraction::Unavailable(format!(
                "{} commits is below the minimum of {}",
                commits.len(),
                self.min_commits
            ));
        }

        let history = GitHistory::new(commits);
        debug!(
            "Extracted {} commits over {} days touching {} files",
            history.total_commits(),
            history.span_days(),
            history.file_set().len()
        );
        GitExtraction::Available(history)
    }
}

/// Extract history from `repo` with default limits except those given.
pub fn extract(repo: &Path, max_commits: usize, timeout: Duration) -> GitExtraction {
    GitExtractor::new(repo)
        .with_max_commits(max_commits)
        .with_timeout(timeout)
        .extract()
}

/// Parse `git log --format=%H|%at|%ae|%s --name-only` output.
///
/// Header lines are recognised by pattern, so merge commits (a header
/// followed directly by another header) and missing blank separators are
/// handled. Commits without files are dropped. The subject may itself
/// contain `|`.
pub fn parse_log(raw: &str) -> Vec<Commit> {
    let mut commits = Vec::new();
    let mut current: Option<Commit> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if header_pattern().is_match(line) {
            if let Some(commit) = current.take() {
                if !commit.files.is_empty() {
                    commits.push(commit);
                }
            }
            let mut parts = line.splitn(4, '|');
            let hash = parts.next().unwrap_or_default();
            let Some(timestamp) = parts.next().and_then(|t| t.parse::<i64>().ok()) else {
                continue;
            };
            let author = parts.next().unwrap_or_default();
            let subject = parts.next().unwrap_or_default();
            current = Some(Commit {
                hash: hash.to_string(),
                timestamp,
                author: author.to_string(),
                files: Vec::new(),
                subject: subject.to_string(),
            });
        } else if let Some(commit) = current.as_mut() {
            commit.files.push(line.to_string());
        }
    }

    if let Some(commit) = current {
        if !commit.files.is_empty() {
            commits.push(commit);
        }
    }
    commits
}
