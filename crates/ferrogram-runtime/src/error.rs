//! Runtime error types.

use ferrogram_core::{ApiError, TransportError};
use ferrogram_framework::DispatchError;
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that stop the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The API rejected the bot (invalid or revoked token), or an error was
    /// raised in raise mode.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A dispatch failure raised by the error handler.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// No API client was supplied and none can be built.
    #[error("no API client available: {0}")]
    NoClient(&'static str),

    /// The poll loop was already stopped.
    #[error("poll loop is stopped")]
    Stopped,
}

impl RuntimeError {
    /// Whether the error came from an invalid or revoked token.
    pub fn is_fatal_api(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_fatal())
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
