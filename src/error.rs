//! Error types for rust_biomarker

use thiserror::Error;

/// Main error type for biomarker discovery operations
#[derive(Error, Debug)]
pub enum BiomarkerError {
    /// Malformed or inconsistent input (duplicate IDs, mismatched sample sets, unknown names)
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    /// Too few samples/replicates for a fit, zero-variance covariate, all-missing sample
    #[error("Degenerate input: {reason}")]
    DegenerateInput { reason: String },

    #[error("Cannot stratify {folds} folds: class '{class}' has only {count} member(s)")]
    Stratification {
        class: String,
        count: usize,
        folds: usize,
    },

    #[error("{operation} did not converge: {reason}")]
    Convergence { operation: String, reason: String },

    #[error("Operation cancelled before all cross-validation units completed")]
    Cancelled,

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid date '{value}': {source}")]
    DateParse {
        value: String,
        source: chrono::ParseError,
    },
}

impl BiomarkerError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        BiomarkerError::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        BiomarkerError::DegenerateInput {
            reason: reason.into(),
        }
    }
}

/// Result type alias for biomarker operations
pub type Result<T> = std::result::Result<T, BiomarkerError>;
