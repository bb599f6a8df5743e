//! Error types for the Framewatch engine.
//!
//! Sparse or degenerate telemetry is never an error: those paths return
//! neutral results. The variants here cover caller contract violations and
//! configuration loading only.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Series length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Failure of a single forecasting model.
///
/// Only the ensemble consumes these; they never escape
/// [`crate::prediction::PredictionEngine::predict_with_ensemble`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("{model} needs at least {required} data points, got {available}")]
    InsufficientData {
        model: &'static str,
        required: usize,
        available: usize,
    },

    #[error("{model} produced a non-positive score ({score:.2})")]
    NonPositiveScore { model: &'static str, score: f64 },
}

pub type Result<T> = std::result::Result<T, EngineError>;
