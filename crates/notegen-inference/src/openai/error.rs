//! Provider error classification.
//!
//! Every failed call becomes an `Error::Provider` carrying whether the failure
//! class is worth another attempt: timeouts, connection errors, 429 and 5xx
//! are retryable; authentication and other 4xx request errors are not.

use notegen_core::Error;

/// OpenAI-compatible error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Request too large.
    ContextLengthExceeded,
    /// Malformed or rejected request.
    InvalidRequest,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) | (403, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (400..=499, _) => Self::InvalidRequest,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::AuthenticationError => "Authentication failed",
            Self::RateLimitExceeded => "Rate limit exceeded",
            Self::ModelNotFound => "Model not found",
            Self::ContextLengthExceeded => "Context too long",
            Self::InvalidRequest => "Invalid request",
            Self::ServerError => "Server error",
            Self::Unknown => "Unexpected response",
        }
    }
}

/// Convert an HTTP error response into a provider error.
pub fn to_provider_error(provider: &str, code: OpenAIErrorCode, status: u16, message: &str) -> Error {
    Error::provider(
        provider,
        format!("{} ({}): {}", code.label(), status, message),
        code.is_retryable(),
    )
}

/// Convert a transport-level failure into a provider error.
pub fn request_error(provider: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::provider(provider, format!("request timed out: {}", err), true)
    } else if err.is_connect() {
        Error::provider(provider, format!("connection failed: {}", err), true)
    } else if err.is_builder() {
        Error::provider(provider, format!("invalid request: {}", err), false)
    } else {
        Error::provider(provider, format!("request failed: {}", err), true)
    }
}
