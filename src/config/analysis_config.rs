//! Analysis configuration support
//!
//! Loads per-repository tuning from `signals.toml` in the repository root.
//! Every field has a default, so a partial file (or none at all) is valid.
//!
//! # Configuration Format
//!
//! ```toml
//! # signals.toml
//!
//! [graph]
//! damping = 0.85
//! tolerance = 1e-6
//! max_iterations = 100
//! max_spectral_nodes = 2000
//!
//! [temporal]
//! enabled = true
//! max_commits = 5000
//! min_commits = 10
//! window_weeks = 4
//! min_cochanges = 2
//! max_files_per_commit = 30
//! half_life_days = 90.0
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// File name looked up in the repository root.
pub const CONFIG_FILE_NAME: &str = "signals.toml";

/// Invalid configuration values. Fatal before any analysis runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("graph.damping must be within [0, 1], got {0}")]
    Damping(f64),

    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

/// Top-level analysis configuration.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub graph: GraphConfig,
    pub temporal: TemporalConfig,
}

/// Dependency-graph algorithm parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GraphConfig {
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Dense eigen-decomposition is skipped above this node count
    #[serde(default = "default_max_spectral_nodes")]
    pub max_spectral_nodes: usize,
}

fn default_damping() -> f64 {
    0.85
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_max_iterations() -> usize {
    100
}

fn default_max_spectral_nodes() -> usize {
    2000
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            max_spectral_nodes: default_max_spectral_nodes(),
        }
    }
}

/// Version-control mining parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TemporalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_commits")]
    pub max_commits: usize,
    /// Histories shorter than this are reported as unavailable
    #[serde(default = "default_min_commits")]
    pub min_commits: usize,
    #[serde(default = "default_log_timeout_secs")]
    pub log_timeout_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_window_weeks")]
    pub window_weeks: u32,
    #[serde(default = "default_min_cochanges")]
    pub min_cochanges: usize,
    #[serde(default = "default_max_files_per_commit")]
    pub max_files_per_commit: usize,
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
}

fn default_true() -> bool {
    true
}

fn default_max_commits() -> usize {
    5000
}

fn default_min_commits() -> usize {
    10
}

fn default_log_timeout_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_window_weeks() -> u32 {
    4
}

fn default_min_cochanges() -> usize {
    2
}

fn default_max_files_per_commit() -> usize {
    30
}

fn default_half_life_days() -> f64 {
    90.0
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_commits: default_max_commits(),
            min_commits: default_min_commits(),
            log_timeout_secs: default_log_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            window_weeks: default_window_weeks(),
            min_cochanges: default_min_cochanges(),
            max_files_per_commit: default_max_files_per_commit(),
            half_life_days: default_half_life_days(),
        }
    }
}

impl TemporalConfig {
    pub fn log_timeout(&self) -> Duration {
        Duration::from_secs(self.log_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl AnalysisConfig {
    /// Reject values the algorithms cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.graph;
        if !(0.0..=1.0).contains(&g.damping) {
            return Err(ConfigError::Damping(g.damping));
        }
        if g.tolerance.is_nan() || g.tolerance <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "graph.tolerance",
                value: g.tolerance,
            });
        }
        if g.max_iterations == 0 {
            return Err(ConfigError::Zero("graph.max_iterations"));
        }

        let t = &self.temporal;
        if t.half_life_days.is_nan() || t.half_life_days <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "temporal.half_life_days",
                value: t.half_life_days,
            });
        }
        if t.window_weeks == 0 {
            return Err(ConfigError::Zero("temporal.window_weeks"));
        }
        if t.max_commits == 0 {
            return Err(ConfigError::Zero("temporal.max_commits"));
        }
        if t.max_files_per_commit == 0 {
            return Err(ConfigError::Zero("temporal.max_files_per_commit"));
        }
        Ok(())
    }
}

/// Load analysis configuration from `signals.toml` in `repo_path`.
///
/// Falls back to defaults when the file is absent or unreadable. Values are
/// not validated here; call [`AnalysisConfig::validate`] before use.
pub fn load_analysis_config(repo_path: &Path) -> AnalysisConfig {
    let toml_path = repo_path.join(CONFIG_FILE_NAME);
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded analysis config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    debug!("No analysis config found, using defaults");
    AnalysisConfig::default()
}

fn load_toml_config(path: &Path) -> anyhow::Result<AnalysisConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AnalysisConfig = toml::from_str(&content)?;
    Ok(config)
}
