//! Git history analysis module
//!
//! Mines version-control history through the git CLI into the temporal
//! signals used by fusion:
//!
//! - Commit history extraction under a hard subprocess timeout
//! - Per-file churn series and trajectory classification
//! - A temporally-decayed co-change matrix
//! - Author-distribution distances and team alignment
//!
//! # Example
//!
//! ```no_run
//! use repotoire_signals::git::{build_churn_series, GitExtractor};
//! use rustc_hash::FxHashSet;
//!
//! let extraction = GitExtractor::new("/path/to/repo").extract();
//! if let Some(history) = extraction.history() {
//!     let known: FxHashSet<&str> = ["src/main.py"].into_iter().collect();
//!     let churn = build_churn_series(history, &known, 4);
//!     println!("{} files changed", churn.len());
//! }
//! ```

pub mod authors;
pub mod churn;
pub mod cochange;
pub mod command;
pub mod engine;
pub mod history;

pub use authors::{compute_author_distances, conway_alignment, team_size, AuthorDistance};
pub use churn::{build_churn_series, classify_trajectory, ChurnSeries, Trajectory};
pub use cochange::{build_cochange_matrix, CoChangeMatrix, CoChangeOptions, CoChangePair};
pub use engine::{TemporalAnalysis, TemporalEngine};
pub use history::{extract, Commit, GitExtraction, GitExtractor, GitHistory};
