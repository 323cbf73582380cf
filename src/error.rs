//! # Error Types
//!
//! Errors raised by the automaton engine, its compute backends and the
//! configuration layer.

use thiserror::Error;

/// Main error type for engine operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaError {
    /// Rule number outside 0..=255. Never wrapped modulo 256.
    #[error("Invalid rule number: {0} (expected 0..=255)")]
    InvalidRule(i64),

    /// Non-positive grid dimensions
    #[error("Invalid dimensions: {cols}x{rows}")]
    Dimension { cols: usize, rows: usize },

    /// The compute backend failed to produce the next generation
    #[error("Backend compute error: {0}")]
    Backend(#[from] BackendError),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Failures reported by a [`ComputeBackend`](crate::compute::ComputeBackend).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("No suitable GPU adapter found")]
    AdapterUnavailable,

    #[error("Failed to create device: {0}")]
    DeviceRequest(String),

    /// The context pool has no free slot
    #[error("GPU context limit reached ({limit} active)")]
    ContextLimit { limit: usize },

    #[error("GPU validation error: {0}")]
    Validation(String),

    #[error("Readback failed: {0}")]
    Readback(String),

    /// The backend returned a row whose length differs from its input
    #[error("Row length mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Worker thread disconnected")]
    WorkerDisconnected,

    #[error("{0}")]
    Failed(String),
}

/// Errors raised while loading a [`Config`](crate::config::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] CaError),
}
