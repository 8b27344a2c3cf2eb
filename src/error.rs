//! Error types for the meter-anomaly library.

use thiserror::Error;

/// Result type alias for anomaly scoring operations.
pub type Result<T> = std::result::Result<T, AnomalyError>;

/// Errors that can occur while loading, featurizing or scoring a series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnomalyError {
    /// A column required by the dataset dialect is absent.
    #[error("missing column '{column}' for {dialect} data")]
    Schema { column: String, dialect: String },

    /// A timestamp or numeric field could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration. Fatal for the whole run.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A detector cannot produce a result for this series.
    #[error("detector {detector} unavailable: {reason}")]
    DetectorUnavailable { detector: String, reason: String },

    /// A persisted model blob is missing or corrupt.
    #[error("could not load model {name}: {reason}")]
    ModelLoad { name: String, reason: String },

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Detector has not been fitted yet.
    #[error("detector must be fitted before scoring")]
    FitRequired,

    /// Filesystem or CSV reader failure.
    #[error("i/o error: {0}")]
    Io(String),
}

impl AnomalyError {
    /// Errors that only invalidate the current input file.
    pub fn is_file_recoverable(&self) -> bool {
        matches!(
            self,
            AnomalyError::Schema { .. } | AnomalyError::Parse(_) | AnomalyError::Io(_)
        )
    }

    /// Errors that must abort the run before any file is processed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnomalyError::Config(_))
    }

    pub(crate) fn unavailable(detector: impl Into<String>, reason: impl Into<String>) -> Self {
        AnomalyError::DetectorUnavailable {
            detector: detector.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for AnomalyError {
    fn from(err: std::io::Error) -> Self {
        AnomalyError::Io(err.to_string())
    }
}

impl From<csv::Error> for AnomalyError {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Io(_) => AnomalyError::Io(err.to_string()),
            _ => AnomalyError::Parse(err.to_string()),
        }
    }
}
