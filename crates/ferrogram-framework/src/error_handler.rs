//! Error reporting for failures caught at the view boundary.
//!
//! Handlers are registered per concrete error type. When an error is
//! reported, its [`source`](std::error::Error::source) chain is walked from
//! the root cause outwards, and at each link the registered handlers are
//! tried in registration order. The first handler whose type matches wins,
//! so a handler for an application error type takes precedence over one for
//! the [`DispatchError`](crate::error::DispatchError) wrapping it. Unmatched
//! errors go to the fallback, or are logged.

use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

type ErrorRef<'a> = &'a (dyn Error + 'static);

/// What happens after an error has been reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Log and continue.
    #[default]
    Swallow,
    /// Hand the error back to the caller (fail fast).
    Raise,
}

impl FromStr for ErrorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "swallow" => Ok(Self::Swallow),
            "raise" => Ok(Self::Raise),
            other => Err(format!("unknown error mode '{other}'")),
        }
    }
}

struct Entry {
    type_name: &'static str,
    try_handle: Arc<dyn Fn(ErrorRef<'_>) -> bool + Send + Sync>,
}

/// Type-matched error reporting with a fallback.
#[derive(Clone, Default)]
pub struct ErrorHandler {
    entries: Vec<Arc<Entry>>,
    fallback: Option<Arc<dyn Fn(ErrorRef<'_>) + Send + Sync>>,
    mode: ErrorMode,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: ErrorMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn set_mode(&mut self, mode: ErrorMode) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// Registers a handler for errors of type `E`.
    pub fn register<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: Error + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.entries.push(Arc::new(Entry {
            type_name: std::any::type_name::<E>(),
            try_handle: Arc::new(move |err: &(dyn Error + 'static)| match err.downcast_ref::<E>() {
                Some(e) => {
                    handler(e);
                    true
                }
                None => false,
            }),
        }));
        self
    }

    /// Registers the handler for errors no typed handler matched.
    pub fn register_fallback<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&(dyn Error + 'static)) + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// Reports `err`, then either swallows it or hands it back.
    pub fn handle<E>(&self, err: E) -> Result<(), E>
    where
        E: Error + Send + Sync + 'static,
    {
        self.report(&err);
        match self.mode {
            ErrorMode::Swallow => Ok(()),
            ErrorMode::Raise => Err(err),
        }
    }

    /// Runs the matching handler for `err` without applying the mode.
    ///
    /// Returns `true` when a typed handler matched.
    pub fn report(&self, err: &(dyn Error + 'static)) -> bool {
        let mut chain: Vec<ErrorRef<'_>> = Vec::new();
        let mut current = Some(err);
        while let Some(link) = current {
            chain.push(link);
            current = link.source();
        }

        for link in chain.iter().rev() {
            for entry in &self.entries {
                if (entry.try_handle)(*link) {
                    debug!(error_type = entry.type_name, "Error handled");
                    return true;
                }
            }
        }

        match &self.fallback {
            Some(fallback) => fallback(err),
            None => error!(error = %DisplayChain(err), "Unhandled error"),
        }
        false
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field(
                "handlers",
                &self.entries.iter().map(|e| e.type_name).collect::<Vec<_>>(),
            )
            .field("fallback", &self.fallback.is_some())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Formats an error with its causes: `outer: middle: root`.
pub struct DisplayChain<'a>(pub &'a (dyn Error + 'static));

impl fmt::Display for DisplayChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::DispatchError;

    #[derive(Debug, thiserror::Error)]
    #[error("quota exceeded")]
    struct QuotaError;

    fn handler_failure() -> DispatchError {
        DispatchError::Handler {
            view: "message".into(),
            handler: "buy".into(),
            source: Box::new(QuotaError),
        }
    }

    #[test]
    fn test_root_cause_handler_wins() {
        let quota = Arc::new(AtomicUsize::new(0));
        let dispatch = Arc::new(AtomicUsize::new(0));
        let (q, d) = (Arc::clone(&quota), Arc::clone(&dispatch));

        let mut handler = ErrorHandler::new();
        handler
            .register::<DispatchError, _>(move |_| {
                d.fetch_add(1, Ordering::SeqCst);
            })
            .register::<QuotaError, _>(move |_| {
                q.fetch_add(1, Ordering::SeqCst);
            });

        assert!(handler.report(&handler_failure()));
        assert_eq!(quota.load(Ordering::SeqCst), 1);
        assert_eq!(dispatch.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let first = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&first);

        let mut handler = ErrorHandler::new();
        handler
            .register::<QuotaError, _>(move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .register::<QuotaError, _>(|_| panic!("second handler must not run"));

        handler.report(&QuotaError);
        assert_eq!(first.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fallback_and_modes() {
        let fallback = Arc::new(AtomicUsize::new(0));
        let fb = Arc::clone(&fallback);

        let mut handler = ErrorHandler::new();
        handler.register_fallback(move |_| {
            fb.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handler.handle(handler_failure()).is_ok());
        assert_eq!(fallback.load(Ordering::SeqCst), 1);

        handler.set_mode(ErrorMode::Raise);
        let err = handler.handle(handler_failure()).unwrap_err();
        assert_eq!(err.view(), "message");
        assert_eq!(fallback.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_display_chain() {
        let err = handler_failure();
        assert_eq!(
            DisplayChain(&err).to_string(),
            "view 'message': handler 'buy' failed: quota exceeded"
        );
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("RAISE".parse::<ErrorMode>().unwrap(), ErrorMode::Raise);
        assert!("loud".parse::<ErrorMode>().is_err());
    }
}
