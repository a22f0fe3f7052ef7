//! History extraction against real repositories built with git2.
//!
//! The extractor shells out to the git CLI; tests are skipped when it is not
//! installed.

use std::path::Path;
use std::process::Command;

use git2::{Repository, Signature, Time};
use rustc_hash::FxHashSet;
use tempfile::TempDir;

use repotoire_signals::config::TemporalConfig;
use repotoire_signals::git::{GitExtraction, GitExtractor, TemporalEngine, Trajectory};

const DAY: i64 = 86_400;
const START: i64 = 1_700_000_000;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Commit `files` (path, content) as `author` at `START + day * DAY`.
fn commit(repo: &Repository, author: &str, day: i64, subject: &str, files: &[(&str, &str)]) {
    let workdir = repo.workdir().unwrap();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full = workdir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, content).unwrap();
        index.add_path(Path::new(path)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let email = format!("{}@example.com", author);
    let sig = Signature::new(author, &email, &Time::new(START + day * DAY, 0)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, subject, &tree, &parents)
        .unwrap();
}

fn fixture_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    commit(&repo, "alice", 0, "initial", &[("core/db.py", "v0"), ("core/api.py", "v0")]);
    commit(&repo, "alice", 7, "add handler", &[("core/db.py", "v1"), ("core/api.py", "v1")]);
    commit(&repo, "bob", 14, "fix crash in db", &[("core/db.py", "v2")]);
    commit(&repo, "bob", 21, "refactor api", &[("core/db.py", "v3"), ("core/api.py", "v2")]);
    commit(&repo, "carol", 28, "docs", &[("README.md", "hello")]);
    dir
}

#[test]
fn extracts_commits_from_a_real_repository() {
    if !git_available() {
        eprintln!("git CLI not available, skipping");
        return;
    }
    let dir = fixture_repo();
    let extraction = GitExtractor::new(dir.path()).with_min_commits(1).extract();
    let history = extraction.history().expect("history available");

    assert_eq!(history.total_commits(), 5);
    // newest first
    assert_eq!(history.commits()[0].subject, "docs");
    assert_eq!(history.commits()[0].author, "carol@example.com");
    assert_eq!(history.span_days(), 28);
    assert!(history.file_set().contains("core/db.py"));
}

#[test]
fn too_few_commits_is_unavailable() {
    if !git_available() {
        return;
    }
    let dir = fixture_repo();
    let extraction = GitExtractor::new(dir.path()).with_min_commits(10).extract();
    assert!(matches!(extraction, GitExtraction::Unavailable(_)));
}

#[test]
fn non_repository_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let extraction = GitExtractor::new(dir.path()).extract();
    assert!(extraction.history().is_none());
}

#[test]
fn temporal_engine_end_to_end() {
    if !git_available() {
        return;
    }
    let dir = fixture_repo();
    let config = TemporalConfig {
        min_commits: 1,
        window_weeks: 1,
        ..Default::default()
    };
    let known: FxHashSet<&str> = ["core/db.py", "core/api.py"].into_iter().collect();
    let temporal = TemporalEngine::new(config)
        .extract_and_analyze(dir.path(), &known)
        .expect("temporal analysis");

    let db = &temporal.churn["core/db.py"];
    assert_eq!(db.total_changes, 4);
    assert_eq!(db.window_counts.len(), 5);
    assert!((db.fix_ratio - 0.25).abs() < 1e-9);
    assert!((db.refactor_ratio - 0.25).abs() < 1e-9);
    assert!((db.bus_factor - 2.0).abs() < 1e-9);
    assert_ne!(db.trajectory, Trajectory::Dormant);
    assert!(!temporal.churn.contains_key("README.md"));

    // Three commits touch both files
    let pair = temporal.cochange.get("core/db.py", "core/api.py").expect("co-change pair");
    assert_eq!(pair.cochange_count, 3);
    // every api.py change came with db.py, not the other way round
    assert_eq!(pair.file_a, "core/api.py");
    assert!((pair.confidence_a_b - 1.0).abs() < 1e-9);
    assert!(pair.confidence_b_a < 1.0);

    assert_eq!(temporal.team_size, 3);
}
