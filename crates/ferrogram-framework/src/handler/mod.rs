//! Rule-gated handlers.
//!
//! A [`Handler`] couples an ordered, conjunctive list of rules with a
//! callback. The owning [`View`](crate::view::View) asks each handler in turn
//! whether it accepts the update ([`Handler::filter`]) and, if so, runs it
//! ([`Handler::handle`]).
//!
//! - **Callback** ([`callback`]): the [`Callback`] trait adapting async
//!   functions with extractor parameters
//! - **Response** ([`response`]): the [`HandlerResponse`] reply convention
//!
//! ```rust,ignore
//! let start = Handler::new("start", |msg: Message| async move {
//!     format!("Hello, {}!", msg.from.map(|u| u.first_name).unwrap_or_default())
//! })
//! .rule(Command::new(["start"]));
//!
//! let audit = Handler::new("audit", log_everything).blocking(false);
//! ```

pub mod callback;
pub mod response;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use ferrogram_core::Context;

use crate::context::DispatchContext;
use crate::error::BoxError;
use crate::rules::{BoxedRule, MatchResult, Rule};

pub use callback::{BoxedCallback, Callback, into_callback};
pub use response::{HandlerResponse, Reply};

/// One handler's recorded result, handed to `post` middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    /// Name of the handler that ran.
    pub handler: String,
    /// Value recorded by the reply convention, if any.
    pub response: Option<Value>,
}

/// A rule-gated callback.
///
/// Handlers are blocking by default: once a blocking handler matched, later
/// handlers of the same view do not see the update.
#[derive(Clone)]
pub struct Handler {
    name: String,
    rules: Vec<BoxedRule>,
    callback: BoxedCallback,
    blocking: bool,
}

impl Handler {
    /// Creates a handler with no rules; it accepts every update of its view.
    pub fn new<F, T>(name: impl Into<String>, callback: F) -> Self
    where
        F: Callback<T>,
        T: 'static,
    {
        Self::from_boxed(name, into_callback(callback))
    }

    /// Creates a handler from a pre-built boxed callback.
    pub fn from_boxed(name: impl Into<String>, callback: BoxedCallback) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            callback,
            blocking: true,
        }
    }

    /// Appends a rule. All rules must match.
    pub fn rule(mut self, rule: impl Rule) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Appends several boxed rules.
    pub fn rules(mut self, rules: impl IntoIterator<Item = BoxedRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Sets whether a match stops later handlers of the view.
    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Checks the rules in order, stopping at the first non-match.
    ///
    /// Bindings are merged into `ctx` only when every rule matched; a
    /// rejected update leaves the bindings untouched.
    pub async fn filter(&self, ctx: &DispatchContext) -> Result<bool, BoxError> {
        let mut extracted = Context::new();
        for rule in &self.rules {
            match rule.check(ctx).await? {
                MatchResult::False => {
                    trace!(handler = %self.name, rule = %rule.describe(), "Rule rejected update");
                    return Ok(false);
                }
                MatchResult::True => {}
                MatchResult::Bindings(bindings) => extracted.merge(bindings),
            }
        }
        ctx.merge_bindings(extracted);
        Ok(true)
    }

    /// Runs the callback.
    pub async fn handle(&self, ctx: Arc<DispatchContext>) -> Result<Option<Value>, BoxError> {
        (self.callback)(ctx).await
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("rules", &self.rules.len())
            .field("blocking", &self.blocking)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::extractor::{Binding, keys};
    use crate::rules::{Command, Text};
    use crate::testing::message_ctx;
    use ferrogram_core::Message;

    #[tokio::test]
    async fn test_filter_is_conjunctive_and_merges_on_success() {
        let ctx = message_ctx("/start now");
        let handler = Handler::new("h", || async {})
            .rule(Command::new(["start"]))
            .rule(Text::new(["nope"]));
        assert!(!handler.filter(&ctx).await.unwrap());
        assert!(ctx.binding("command").is_none());

        let handler = Handler::new("h", || async {}).rule(Command::new(["start"]));
        assert!(handler.filter(&ctx).await.unwrap());
        assert_eq!(
            ctx.binding("command").and_then(|v| v.as_str().map(String::from)),
            Some("start".to_string())
        );
    }

    #[tokio::test]
    async fn test_handler_without_rules_accepts() {
        let ctx = message_ctx("anything");
        assert!(Handler::new("all", || async {}).filter(&ctx).await.unwrap());
    }

    #[tokio::test]
    async fn test_handle_injects_declared_parameters() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let handler = Handler::new(
            "echo",
            move |msg: Message, args: Binding<keys::Args>| {
                let seen = Arc::clone(&seen_clone);
                async move {
                    seen.fetch_add(args.len(), Ordering::SeqCst);
                    msg.text
                }
            },
        )
        .rule(Command::new(["echo"]));

        let ctx = Arc::new(message_ctx("/echo a b"));
        assert!(handler.filter(&ctx).await.unwrap());
        let response = handler.handle(Arc::clone(&ctx)).await.unwrap();
        assert_eq!(response, Some(Value::String("/echo a b".into())));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_an_error() {
        let handler = Handler::new("needs_args", |_args: Binding<keys::Args>| async {});
        let ctx = Arc::new(message_ctx("plain"));
        assert!(handler.handle(ctx).await.is_err());
    }

    #[test]
    fn test_blocking_defaults_to_true() {
        let handler = Handler::new("h", || async {});
        assert!(handler.is_blocking());
        assert!(!handler.blocking(false).is_blocking());
    }
}
