//! # Ferrogram Framework
//!
//! Update routing for ferrogram bots: rules, handlers, middleware, views,
//! conversation state and the router tying them together.
//!
//! ```text
//! Router ──▶ View (per update kind)
//!              ├─ resolve conversation state   (StateStore)
//!              ├─ Middleware::pre  × n         (veto / bind values)
//!              ├─ Handler::filter → handle     (Rules, extractors, reply)
//!              └─ Middleware::post × n         (inspect outcomes)
//! ```
//!
//! - **Rules** ([`rules`]): composable predicates producing bindings
//! - **Handlers** ([`handler`]): rule-gated callbacks with parameter injection
//! - **Extractors** ([`extractor`]): what a callback can ask for
//! - **Middleware** ([`middleware`]): pre/post wrappers around a view
//! - **State** ([`state`]): per-conversation FSM storage
//! - **Errors** ([`error_handler`]): reporting of failures caught at views
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrogram_framework::prelude::*;
//!
//! async fn start(user: User) -> String {
//!     format!("Hello, {}!", user.first_name)
//! }
//!
//! let mut router = Router::new();
//! router.register_view(
//!     View::message().with_handler(Handler::new("start", start).rule(Command::new(["start"]))),
//! )?;
//! ```

pub mod context;
pub mod error;
pub mod error_handler;
pub mod extractor;
pub mod handler;
pub mod middleware;
pub mod router;
pub mod rules;
pub mod state;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use context::DispatchContext;
pub use error::{
    BoxError, DispatchError, ExtractError, ExtractResult, Phase, RouterError, RuleError,
    StoreError, StoreResult,
};
pub use error_handler::{DisplayChain, ErrorHandler, ErrorMode};
pub use extractor::{Binding, BindingKey, Bindings, FromContext, FsmContext, keys};
pub use handler::{Callback, Handler, HandlerOutcome, HandlerResponse, Reply};
pub use middleware::{BoxedMiddleware, FnMiddleware, Middleware};
pub use router::{RouteReport, Router};
pub use rules::{BoxedRule, MatchResult, Rule, RuleExt, Rules};
pub use state::{
    ExpiringStore, MemoryExpiringStore, MemoryStateStore, StateRepr, StateStore, state_label,
};
pub use view::{DispatchEnv, View, ViewOutcome, ViewService, ViewStatus};

/// Prelude for common imports.
pub mod prelude {
    pub use super::context::DispatchContext;
    pub use super::error::BoxError;
    pub use super::error_handler::{ErrorHandler, ErrorMode};
    pub use super::extractor::{Binding, Bindings, FsmContext, keys};
    pub use super::handler::{Handler, HandlerOutcome, Reply};
    pub use super::middleware::Middleware;
    pub use super::router::Router;
    pub use super::rules::{
        CallbackData, ChatTypeIs, Command, Contains, FnRule, FromUser, Fuzzy, HasField, InChat,
        Regex, Rule, RuleExt, Rules, StartsWith, State, StateGroup, Text,
    };
    pub use super::state::{StateRepr, StateStore, state_label};
    pub use super::view::View;
    pub use ferrogram_core::prelude::*;
}
