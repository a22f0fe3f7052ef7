//! Configuration module
//!
//! This module handles per-repository analysis tuning (`signals.toml`):
//! graph algorithm parameters and version-control mining limits.

mod analysis_config;

pub use analysis_config::{
    load_analysis_config, AnalysisConfig, ConfigError, GraphConfig, TemporalConfig,
    CONFIG_FILE_NAME,
};
