//! Error types for the ferrogram framework.

use std::fmt;

use thiserror::Error;
pub use tower::BoxError;

use ferrogram_core::ValueTypeError;

/// Errors that can occur during context extraction.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The update kind does not carry the requested payload.
    #[error("update kind mismatch: expected '{expected}', got '{got}'")]
    UpdateKindMismatch {
        /// Expected payload name.
        expected: &'static str,
        /// Actual update kind.
        got: &'static str,
    },

    /// A declared binding was not produced by any rule or middleware.
    #[error("binding '{0}' is missing from the context")]
    MissingBinding(&'static str),

    /// A binding exists but has the wrong type.
    #[error("binding '{key}' has the wrong type: {source}")]
    BindingType {
        key: &'static str,
        #[source]
        source: ValueTypeError,
    },

    /// The update has no conversation key, so no state can be attached.
    #[error("update has no conversation state")]
    NoState,

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors raised by a state store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The update has no conversation key to store state under.
    #[error("no conversation key for this update")]
    NoConversationKey,

    /// Backend failure (connection, serialization, ...).
    #[error("state backend error: {0}")]
    Backend(String),
}

/// Result type for state store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The middleware phase in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => f.write_str("pre"),
            Self::Post => f.write_str("post"),
        }
    }
}

/// A failure while one view processed one update.
///
/// Produced at the view boundary; the original error is kept as
/// [`source`](std::error::Error::source) so error handlers can match on it.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Loading the conversation state failed.
    #[error("view '{view}': failed to load state")]
    State {
        view: String,
        #[source]
        source: StoreError,
    },

    /// A rule returned an error.
    #[error("view '{view}': rule of handler '{handler}' failed")]
    Rule {
        view: String,
        handler: String,
        #[source]
        source: BoxError,
    },

    /// A handler callback returned an error.
    #[error("view '{view}': handler '{handler}' failed")]
    Handler {
        view: String,
        handler: String,
        #[source]
        source: BoxError,
    },

    /// A middleware `pre` or `post` call returned an error.
    #[error("view '{view}': middleware '{middleware}' failed in {phase}")]
    Middleware {
        view: String,
        middleware: String,
        phase: Phase,
        #[source]
        source: BoxError,
    },

    /// A view panicked while handling an update.
    #[error("view '{view}' panicked: {message}")]
    Panicked { view: String, message: String },
}

impl DispatchError {
    /// Returns the name of the view the failure happened in.
    pub fn view(&self) -> &str {
        match self {
            Self::State { view, .. }
            | Self::Rule { view, .. }
            | Self::Handler { view, .. }
            | Self::Middleware { view, .. }
            | Self::Panicked { view, .. } => view,
        }
    }
}

/// Errors raised while building a router.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// A view with this name is already registered.
    #[error("view '{0}' is already registered")]
    DuplicateView(String),
}

/// Errors raised while constructing a rule.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The regular expression failed to compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
