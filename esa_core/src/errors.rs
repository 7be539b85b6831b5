//! # Error Types
//!
//! Structured error types for esa_core. Every failure carries enough
//! context (which file, which session call, which field) to be reported
//! back to whoever requested the analysis without re-reading logs.
//!
//! ## Example
//!
//! ```rust
//! use esa_core::errors::{EsaError, EsaResult};
//!
//! fn require_name(name: &str) -> EsaResult<()> {
//!     if name.trim().is_empty() {
//!         return Err(EsaError::missing_field("material.name"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_name("").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for esa_core operations
pub type EsaResult<T> = Result<T, EsaError>;

/// Structured error type for request building and job execution.
///
/// Variants are serializable so a job runner can hand them back to the
/// requester as JSON.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum EsaError {
    /// An input value is invalid (empty, malformed, out of range)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A required field is missing
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A call against the analysis session failed
    #[error("Session call {call} failed: {reason}")]
    SessionFailed { call: String, reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// Working directory is locked by another user/process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    /// The batch launcher could not be started or exited with failure
    #[error("Analysis submission failed ({command}): {reason}. See '{log_file}' for details")]
    SubmissionFailed {
        command: String,
        log_file: String,
        reason: String,
    },

    /// The analysis ran but did not produce its expected outputs
    #[error("Analysis failed: {reason}")]
    AnalysisFailed { reason: String },

    /// The analysis did not finish in time
    #[error("Timed out after {waited_secs} s waiting for analysis output in '{directory}'")]
    Timeout { waited_secs: u64, directory: String },

    /// A result value could not be located in an output file
    #[error("Cannot find {quantity} in output file '{file}'")]
    ResultNotFound { quantity: String, file: String },
}

impl EsaError {
    /// Create an InvalidInput error
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        EsaError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        EsaError::MissingField {
            field: field.into(),
        }
    }

    /// Create a SessionFailed error
    pub fn session_failed(call: impl Into<String>, reason: impl Into<String>) -> Self {
        EsaError::SessionFailed {
            call: call.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(
        operation: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        EsaError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(
        path: impl Into<String>,
        locked_by: impl Into<String>,
        locked_at: impl Into<String>,
    ) -> Self {
        EsaError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Create an AnalysisFailed error
    pub fn analysis_failed(reason: impl Into<String>) -> Self {
        EsaError::AnalysisFailed {
            reason: reason.into(),
        }
    }

    /// Create a ResultNotFound error
    pub fn result_not_found(quantity: impl Into<String>, file: impl Into<String>) -> Self {
        EsaError::ResultNotFound {
            quantity: quantity.into(),
            file: file.into(),
        }
    }

    /// Check if this is a recoverable error (e.g., can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EsaError::FileLocked { .. } | EsaError::Timeout { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            EsaError::InvalidInput { .. } => "INVALID_INPUT",
            EsaError::MissingField { .. } => "MISSING_FIELD",
            EsaError::SessionFailed { .. } => "SESSION_FAILED",
            EsaError::FileError { .. } => "FILE_ERROR",
            EsaError::FileLocked { .. } => "FILE_LOCKED",
            EsaError::SerializationError { .. } => "SERIALIZATION_ERROR",
            EsaError::VersionMismatch { .. } => "VERSION_MISMATCH",
            EsaError::SubmissionFailed { .. } => "SUBMISSION_FAILED",
            EsaError::AnalysisFailed { .. } => "ANALYSIS_FAILED",
            EsaError::Timeout { .. } => "TIMEOUT",
            EsaError::ResultNotFound { .. } => "RESULT_NOT_FOUND",
        }
    }
}

impl From<serde_json::Error> for EsaError {
    fn from(e: serde_json::Error) -> Self {
        EsaError::SerializationError {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = EsaError::session_failed("RunAllAnalysis", "engine crashed");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"SessionFailed\""));
        let roundtrip: EsaError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(EsaError::missing_field("test").error_code(), "MISSING_FIELD");
        assert_eq!(
            EsaError::result_not_found("equivalent stress", "a.csv").error_code(),
            "RESULT_NOT_FOUND"
        );
    }

    #[test]
    fn test_recoverable_errors() {
        let locked = EsaError::file_locked("/tmp/job", "someone", "now");
        let timeout = EsaError::Timeout {
            waited_secs: 10,
            directory: "/tmp/job".to_string(),
        };
        assert!(locked.is_recoverable());
        assert!(timeout.is_recoverable());
        assert!(!EsaError::analysis_failed("no html").is_recoverable());
    }

    #[test]
    fn test_display_mentions_log_file() {
        let error = EsaError::SubmissionFailed {
            command: "bsub.isami".to_string(),
            log_file: "submission.log".to_string(),
            reason: "exit status 1".to_string(),
        };
        assert!(error.to_string().contains("submission.log"));
    }
}
