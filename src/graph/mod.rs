//! Dependency-graph analytics
//!
//! Builds the file-level import graph and computes its topology signals:
//! centrality, blast radius, cycles, communities, spectral structure and
//! module-level architecture metrics.

pub mod centrality;
pub mod community;
pub mod components;
pub mod engine;
pub mod model;
pub mod modules;
pub mod spectral;

pub use engine::{GraphAnalysis, GraphEngine};
pub use model::DependencyGraph;
pub use modules::{analyze_modules, module_of, ArchitectureAnalysis, ModuleMetrics};
pub use spectral::SpectralSummary;
