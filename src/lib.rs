//! Repotoire signals - graph analytics and signal fusion
//!
//! Turns per-file scanner metrics, semantic classifications and version
//! control history into a single [`signals::SignalField`]: per-file,
//! per-module and codebase-wide signals with percentile normalization,
//! composite health scores and a Health Laplacian.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! use repotoire_signals::config::AnalysisConfig;
//! use repotoire_signals::models::FileMetrics;
//!
//! let files = vec![FileMetrics::new("src/app.py"), FileMetrics::new("src/db.py")];
//! let field = repotoire_signals::pipeline::run(
//!     Path::new("."),
//!     &files,
//!     &BTreeMap::new(),
//!     &AnalysisConfig::default(),
//!     true,
//! )?;
//! for (path, risk) in field.top_files_by_risk(10) {
//!     println!("{path}: {risk:.2}");
//! }
//! # Ok::<(), repotoire_signals::signals::RegistryError>(())
//! ```

pub mod config;
pub mod git;
pub mod graph;
pub mod math;
pub mod models;
pub mod pipeline;
pub mod signals;
