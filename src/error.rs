//! Error types for the alignment engine

use thiserror::Error;

/// Errors surfaced to the caller.
///
/// Per-frame conditions (unscoreable frames, queue drops) are not errors; they
/// are absorbed by the pipeline and exposed as data. Everything here aborts
/// setup or an explicit operation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Session worker failed: {0}")]
    Worker(String),
}
