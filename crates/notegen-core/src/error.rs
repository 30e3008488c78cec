//! Error types for notegen.

use thiserror::Error;
use uuid::Uuid;

use crate::models::JobStatus;

/// Result type alias using notegen's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for notegen operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generation job not found
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// Source note not found (or not owned by the caller)
    #[error("Note not found: {0}")]
    NoteNotFound(Uuid),

    /// Source audio not found (or not owned by the caller)
    #[error("Audio not found: {0}")]
    AudioNotFound(Uuid),

    /// An external AI service call failed.
    ///
    /// `retryable` records whether the failure class (timeout, 429, 5xx) is
    /// worth another attempt with identical parameters.
    #[error("{provider} error: {message}")]
    Provider {
        provider: String,
        message: String,
        retryable: bool,
    },

    /// Inference/generation failed outside a specific provider call
    #[error("Inference error: {0}")]
    Inference(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Illegal job status transition
    #[error("Invalid status transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a provider error.
    pub fn provider(
        provider: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Whether another attempt with identical parameters may succeed.
    ///
    /// Network-level failures are retryable; configuration, input, and
    /// state errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider { retryable, .. } => *retryable,
            Error::Request(_) | Error::Inference(_) | Error::Io(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_provider() {
        let err = Error::provider("whisper", "request timed out", true);
        assert_eq!(err.to_string(), "whisper error: request timed out");
    }

    #[test]
    fn test_error_display_job_not_found() {
        let id = Uuid::nil();
        let err = Error::JobNotFound(id);
        assert_eq!(err.to_string(), format!("Job not found: {}", id));
    }

    #[test]
    fn test_error_display_invalid_transition() {
        let id = Uuid::nil();
        let err = Error::InvalidTransition {
            job_id: id,
            from: JobStatus::Processed,
            to: JobStatus::Processing,
        };
        assert_eq!(
            err.to_string(),
            format!("Invalid status transition for job {}: PROCESSED -> PROCESSING", id)
        );
    }

    #[test]
    fn test_provider_retryable_flag() {
        assert!(Error::provider("openai", "503", true).is_retryable());
        assert!(!Error::provider("openai", "401", false).is_retryable());
    }

    #[test]
    fn test_network_errors_are_retryable() {
        assert!(Error::Request("connection reset".into()).is_retryable());
        assert!(Error::Inference("empty completion".into()).is_retryable());
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        assert!(Error::Io(io).is_retryable());
    }

    #[test]
    fn test_state_errors_are_not_retryable() {
        assert!(!Error::Config("missing key".into()).is_retryable());
        assert!(!Error::InvalidInput("bad".into()).is_retryable());
        assert!(!Error::NoteNotFound(Uuid::nil()).is_retryable());
        assert!(!Error::Serialization("bad json".into()).is_retryable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
