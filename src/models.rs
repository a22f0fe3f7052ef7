//! Core data models for the signal engine
//!
//! These are the inputs handed over by external collaborators (the
//! per-language scanner and the semantic classifier) plus the small enums
//! shared by every stage of the fusion pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math;

/// Files below this count are scored on absolute thresholds only.
pub const BAYESIAN_TIER_MIN_FILES: usize = 15;
/// Files at or above this count get full percentile normalization.
pub const FULL_TIER_MIN_FILES: usize = 50;

/// Normalization tier, fixed once per run from the file count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    #[default]
    Absolute,
    Bayesian,
    Full,
}

impl Tier {
    pub fn for_file_count(n: usize) -> Self {
        if n < BAYESIAN_TIER_MIN_FILES {
            Tier::Absolute
        } else if n < FULL_TIER_MIN_FILES {
            Tier::Bayesian
        } else {
            Tier::Full
        }
    }

    /// Whether percentiles and composites are computed in this tier.
    pub fn is_normalized(&self) -> bool {
        !matches!(self, Tier::Absolute)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Absolute => write!(f, "ABSOLUTE"),
            Tier::Bayesian => write!(f, "BAYESIAN"),
            Tier::Full => write!(f, "FULL"),
        }
    }
}

/// File role as assigned by the semantic classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Test,
    EntryPoint,
    Interface,
    Constant,
    Exception,
    Model,
    Cli,
    Service,
    Migration,
    Utility,
    Config,
    #[default]
    Unknown,
}

impl Role {
    /// Roles that are legitimately never imported by another file.
    pub fn may_be_unreferenced(&self) -> bool {
        matches!(
            self,
            Role::EntryPoint
                | Role::Test
                | Role::Config
                | Role::Interface
                | Role::Exception
                | Role::Utility
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Test => "test",
            Role::EntryPoint => "entry_point",
            Role::Interface => "interface",
            Role::Constant => "constant",
            Role::Exception => "exception",
            Role::Model => "model",
            Role::Cli => "cli",
            Role::Service => "service",
            Role::Migration => "migration",
            Role::Utility => "utility",
            Role::Config => "config",
            Role::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An import statement as seen by the scanner.
///
/// `resolved` holds the in-repo target path when the scanner could map the
/// import to a file; `None` means the import is unresolved (phantom).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ImportRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub resolved: Option<String>,
}

impl ImportRef {
    pub fn resolved(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: Some(target.into()),
        }
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: None,
        }
    }
}

/// Raw syntactic metrics for one file, produced by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileMetrics {
    pub path: String,
    pub lines: usize,
    pub function_count: usize,
    pub class_count: usize,
    pub max_nesting: usize,
    /// Mean cyclomatic complexity per function
    pub complexity: f64,
    /// Body size of every function, used for implementation Gini
    pub function_sizes: Vec<usize>,
    pub imports: Vec<ImportRef>,
    pub stub_ratio: f64,
    /// Share of abstract declarations (interfaces, abstract classes)
    pub abstract_ratio: f64,
    pub broken_call_count: usize,
    pub compression_ratio: f64,
    pub todo_density: f64,
}

/// Errors from validating a single file's metrics.
///
/// These never abort a run; the offending file keeps default scanning
/// signals and a warning is logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("file metrics with empty path")]
    EmptyPath,

    #[error("{path}: {field} must be within [0, 1], got {value}")]
    OutOfUnitRange {
        path: String,
        field: &'static str,
        value: f64,
    },

    #[error("{path}: {field} must be finite and non-negative, got {value}")]
    Invalid {
        path: String,
        field: &'static str,
        value: f64,
    },
}

impl FileMetrics {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.path.is_empty() {
            return Err(MetricsError::EmptyPath);
        }
        for (field, value) in [
            ("stub_ratio", self.stub_ratio),
            ("abstract_ratio", self.abstract_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MetricsError::OutOfUnitRange {
                    path: self.path.clone(),
                    field,
                    value,
                });
            }
        }
        for (field, value) in [
            ("complexity", self.complexity),
            ("compression_ratio", self.compression_ratio),
            ("todo_density", self.todo_density),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MetricsError::Invalid {
                    path: self.path.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Gini coefficient of function body sizes.
    pub fn impl_gini(&self) -> f64 {
        let sizes: Vec<f64> = self.function_sizes.iter().map(|&s| s as f64).collect();
        math::gini(&sizes)
    }

    pub fn resolved_imports(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().filter_map(|i| i.resolved.as_deref())
    }

    pub fn import_count(&self) -> usize {
        self.imports.len()
    }
}

/// Per-file outputs of the semantic classifier. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SemanticInputs {
    pub role: Role,
    pub concept_count: usize,
    pub concept_entropy: f64,
    pub naming_drift: f64,
    pub docstring_coverage: Option<f64>,
    pub semantic_coherence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::for_file_count(0), Tier::Absolute);
        assert_eq!(Tier::for_file_count(14), Tier::Absolute);
        assert_eq!(Tier::for_file_count(15), Tier::Bayesian);
        assert_eq!(Tier::for_file_count(49), Tier::Bayesian);
        assert_eq!(Tier::for_file_count(50), Tier::Full);
        assert!(!Tier::Absolute.is_normalized());
        assert!(Tier::Full.is_normalized());
    }

    #[test]
    fn test_validate_rejects_bad_ratios() {
        let mut m = FileMetrics::new("a.py");
        assert!(m.validate().is_ok());

        m.stub_ratio = 1.5;
        assert!(matches!(
            m.validate(),
            Err(MetricsError::OutOfUnitRange { field: "stub_ratio", .. })
        ));

        m.stub_ratio = 0.2;
        m.complexity = f64::NAN;
        assert!(matches!(m.validate(), Err(MetricsError::Invalid { .. })));

        assert_eq!(FileMetrics::default().validate(), Err(MetricsError::EmptyPath));
    }

    #[test]
    fn test_metrics_deserialize_with_defaults() {
        let json = r#"{"path": "src/a.py", "lines": 120,
            "imports": [{"name": "b", "resolved": "src/b.py"}, {"name": "requests"}]}"#;
        let m: FileMetrics = serde_json::from_str(json).unwrap();
        assert_eq!(m.lines, 120);
        assert_eq!(m.function_count, 0);
        assert_eq!(m.resolved_imports().collect::<Vec<_>>(), vec!["src/b.py"]);
        assert_eq!(m.import_count(), 2);
    }

    #[test]
    fn test_role_serde_names() {
        let r: Role = serde_json::from_str("\"entry_point\"").unwrap();
        assert_eq!(r, Role::EntryPoint);
        assert!(r.may_be_unreferenced());
        assert!(!Role::Service.may_be_unreferenced());
        assert_eq!(Role::default().as_str(), "unknown");
    }
}
