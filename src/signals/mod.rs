//! The signal field and everything computed over it
//!
//! - `registry`: the closed set of signal identifiers and their metadata
//! - `field`: the per-file / per-module / global signal tensor
//! - `normalization`: tiered percentile ranks
//! - `composites`: weighted health and risk scores
//! - `laplacian`: risk relative to structural neighbours

pub mod composites;
pub mod field;
pub mod laplacian;
pub mod normalization;
pub mod registry;

pub use composites::compute_composites;
pub use field::{FileSignals, GlobalSignals, ModuleSignals, SignalField, SignalRecord, SignalValue};
pub use laplacian::{compute_raw_risks, health_laplacian};
pub use normalization::{normalize, normalize_modules, percentile, ABSOLUTE_FLOORS};
pub use registry::{
    initialize_registry, registry, Polarity, RegistryError, Scope, Signal, SignalMeta,
    SignalRegistry, ValueType,
};
