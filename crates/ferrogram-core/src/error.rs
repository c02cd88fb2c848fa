//! Unified error types for the ferrogram core.
//!
//! Framework-level errors (dispatch, rule and store failures) live in
//! `ferrogram-framework`; runtime errors live in `ferrogram-runtime`.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised while moving bytes to and from the remote platform.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request to '{method}' failed: {reason}")]
    RequestFailed {
        /// The API method being called.
        method: String,
        /// Reason for failure.
        reason: String,
    },

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Error type for remote API calls.
///
/// The remote platform reports failures as `{ok: false, error_code, description}`.
/// Codes `401` and `404` mean the token is invalid or revoked and are mapped to
/// the dedicated [`Unauthorized`](ApiError::Unauthorized) and
/// [`NotFound`](ApiError::NotFound) variants; [`is_fatal`](ApiError::is_fatal)
/// reports them as unrecoverable.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The token was rejected.
    #[error("unauthorized: {description}")]
    Unauthorized { description: String },

    /// The bot endpoint does not exist (usually a malformed or revoked token).
    #[error("not found: {description}")]
    NotFound { description: String },

    /// Flood control; the platform asks to wait before retrying.
    #[error("too many requests, retry after {retry_after}s")]
    TooManyRequests { retry_after: u64 },

    /// The API returned an error.
    #[error("API error ({code}): {description}")]
    Api { code: i64, description: String },

    /// The call timed out.
    #[error("API call timed out")]
    Timeout,

    /// Failed to serialize/deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Builds an error from an `error_code` / `description` pair.
    pub fn from_code(code: i64, description: impl Into<String>) -> Self {
        let description = description.into();
        match code {
            401 => Self::Unauthorized { description },
            404 => Self::NotFound { description },
            _ => Self::Api { code, description },
        }
    }

    /// Returns `true` for errors that will never succeed on retry.
    ///
    /// An invalid or revoked token surfaces as `401` or `404`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::NotFound { .. })
    }

    /// Returns the server-requested retry delay, if any.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::TooManyRequests { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
