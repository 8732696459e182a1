//! Error types for the reconciliation service.
//!
//! The core (normalizer, key extractor, engine, formatter) recovers locally
//! and never fails on well-formed record sequences. Only a few conditions
//! surface as errors:
//!
//! - [`CsvError`] - ingestion of uploaded tabular files
//! - [`StoreError`] - report lookups that miss
//! - [`ReconcileError`] - cancelled reconciliation runs
//! - [`FormatError`] - writer failures while rendering delimited text
//! - [`ConfigError`] - invalid environment settings
//! - [`PipelineError`] - ingestion + reconciliation orchestration
//! - [`ServerError`] - transport-level failures
//!
//! Conversions are provided via `From` so `?` works across boundaries.

use thiserror::Error;

// =============================================================================
// Ingestion Errors
// =============================================================================

/// Errors while reading an uploaded tabular file into records.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed delimited text.
    #[error("Invalid CSV format at line {line}: {message}")]
    ParseError { line: u64, message: String },
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        CsvError::ParseError {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Report Store Errors
// =============================================================================

/// Errors from the report store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No report was ever issued under this identifier.
    #[error("Report not found: {0}")]
    NotFound(String),
}

// =============================================================================
// Engine Errors
// =============================================================================

/// Errors from a reconciliation run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// The caller cancelled the run before it finished.
    #[error("Reconciliation cancelled during {phase}")]
    Cancelled { phase: &'static str },
}

// =============================================================================
// Formatter Errors
// =============================================================================

/// Errors while rendering a report.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Delimited-text writer failed.
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Flushing the in-memory writer failed.
    #[error("Failed to flush CSV output: {0}")]
    Io(#[from] std::io::Error),

    /// Rendered bytes were not UTF-8.
    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

// =============================================================================
// Pipeline Errors
// =============================================================================

/// Errors from the upload-to-report pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// One of the inputs could not be ingested.
    #[error("{side} file: {source}")]
    Csv {
        side: crate::models::Side,
        #[source]
        source: CsvError,
    },

    /// Reconciliation did not complete.
    #[error("{0}")]
    Reconcile(#[from] ReconcileError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Upload could not be ingested.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Report lookup failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Reconciliation did not complete.
    #[error("{0}")]
    Reconcile(#[from] ReconcileError),

    /// Report could not be rendered.
    #[error("{0}")]
    Format(#[from] FormatError),

    /// Upload pipeline failed.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for ingestion.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for store lookups.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for reconciliation runs.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Result type for rendering.
pub type FormatResult<T> = Result<T, FormatError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline runs.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let store_err = StoreError::NotFound("42".into());
        let server_err: ServerError = store_err.into();
        assert!(server_err.to_string().contains("42"));

        let cancel = ReconcileError::Cancelled { phase: "index" };
        let server_err: ServerError = cancel.into();
        assert!(server_err.to_string().contains("cancelled"));

        let pipeline_err = PipelineError::Csv {
            side: crate::models::Side::Target,
            source: CsvError::ParseError { line: 3, message: "bad quote".into() },
        };
        let server_err: ServerError = pipeline_err.into();
        assert!(server_err.to_string().starts_with("target file:"));
    }

    #[test]
    fn test_parse_error_format() {
        let err = CsvError::ParseError {
            line: 7,
            message: "unequal lengths".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 7"));
        assert!(msg.contains("unequal lengths"));
    }
}
