//! Middleware pipeline.
//!
//! Middleware wraps the handler loop of one [`View`](crate::view::View):
//!
//! ```text
//! pre(m1) → pre(m2) → … → handlers → post(m1) → post(m2) → …
//! ```
//!
//! Both phases run in registration order. A `pre` returning `Ok(false)` vetoes
//! the update for that view: no handler and no `post` runs, and nothing is
//! reported. An `Err` from either phase also stops processing, but is
//! reported to the router's error handler.
//!
//! Middleware objects are shared by every concurrently dispatched update, so
//! per-update data belongs in the [`DispatchContext`] bindings
//! ([`DispatchContext::bind`]), never in `self`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::DispatchContext;
use crate::error::BoxError;
use crate::handler::HandlerOutcome;

/// A pre/post wrapper around a view's handlers.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs and error reports.
    fn name(&self) -> &str {
        let name = std::any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name)
    }

    /// Runs before the handlers. Return `Ok(false)` to veto the update.
    async fn pre(&self, _ctx: &DispatchContext) -> Result<bool, BoxError> {
        Ok(true)
    }

    /// Runs after the handlers with what each matched handler returned.
    async fn post(
        &self,
        _ctx: &DispatchContext,
        _outcomes: &[HandlerOutcome],
    ) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A type-erased, shareable middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Middleware built from a `pre` closure only.
///
/// ```rust,ignore
/// view.middleware(FnMiddleware::new("private_only", |ctx: &DispatchContext| {
///     ctx.update().chat().is_some_and(|c| c.kind == ChatType::Private)
/// }));
/// ```
pub struct FnMiddleware<F> {
    name: String,
    pre: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&DispatchContext) -> bool + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, pre: F) -> Self {
        Self {
            name: name.into(),
            pre,
        }
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&DispatchContext) -> bool + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn pre(&self, ctx: &DispatchContext) -> Result<bool, BoxError> {
        Ok((self.pre)(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::message_ctx;

    struct Noop;

    #[async_trait]
    impl Middleware for Noop {}

    #[tokio::test]
    async fn test_defaults() {
        let ctx = message_ctx("x");
        assert_eq!(Noop.name(), "Noop");
        assert!(Noop.pre(&ctx).await.unwrap());
        assert!(Noop.post(&ctx, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_fn_middleware() {
        let mw = FnMiddleware::new("only_hi", |ctx: &DispatchContext| {
            ctx.update().text() == Some("hi")
        });
        assert_eq!(mw.name(), "only_hi");
        assert!(mw.pre(&message_ctx("hi")).await.unwrap());
        assert!(!mw.pre(&message_ctx("bye")).await.unwrap());
    }
}
