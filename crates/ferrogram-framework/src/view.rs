//! Views: the routing unit for one family of update kinds.
//!
//! A [`View`] owns an ordered handler list and an ordered middleware list for
//! the update kinds in its `matches` set. For every update the router hands
//! it, the view:
//!
//! 1. resolves the conversation key and loads its [`StateRepr`]
//! 2. runs every middleware `pre` in order; a veto ends processing silently
//! 3. walks the handlers in order, running each one whose rules match; the
//!    first *blocking* match stops the walk
//! 4. runs every middleware `post` in order with the recorded outcomes
//!
//! Any error raised along the way stops processing of the update in this view
//! and is reported to the [`ErrorHandler`]. The view is the only place such
//! errors are caught.
//!
//! # Tower Service Integration
//!
//! [`ViewService`] exposes a view as a `tower::Service<Arc<Update>>`, so
//! standard layers can wrap it:
//!
//! ```rust,ignore
//! let service = ServiceBuilder::new()
//!     .layer(TimeoutLayer::new(Duration::from_secs(10)))
//!     .service(ViewService::new(view, env));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;
use tracing::{Instrument, debug, debug_span, trace};

use ferrogram_core::{BoxedClient, Update, UpdateType};

use crate::context::DispatchContext;
use crate::error::{BoxError, DispatchError, Phase};
use crate::error_handler::ErrorHandler;
use crate::handler::{Handler, HandlerOutcome};
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::state::{StateKeyFn, StateRepr, StateStore, default_state_key};

/// Shared collaborators a view needs to process an update.
#[derive(Clone)]
pub struct DispatchEnv {
    pub client: BoxedClient,
    pub store: Arc<dyn StateStore>,
    pub errors: Arc<ErrorHandler>,
    pub bot_username: Option<Arc<str>>,
}

impl fmt::Debug for DispatchEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEnv")
            .field("errors", &self.errors)
            .field("bot_username", &self.bot_username)
            .finish_non_exhaustive()
    }
}

/// How processing of one update ended in one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    /// Middleware and handlers ran to the end (possibly with no handler
    /// matching).
    Completed,
    /// A middleware `pre` vetoed the update.
    Vetoed { middleware: String },
    /// An error was raised and reported.
    Failed,
}

/// Result of one view processing one update.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewOutcome {
    pub view: String,
    pub status: ViewStatus,
    /// Handlers that ran, in order, with their recorded responses.
    pub outcomes: Vec<HandlerOutcome>,
}

impl ViewOutcome {
    fn new(view: &str, status: ViewStatus, outcomes: Vec<HandlerOutcome>) -> Self {
        Self {
            view: view.to_string(),
            status,
            outcomes,
        }
    }

    /// Whether at least one handler ran.
    pub fn handled(&self) -> bool {
        !self.outcomes.is_empty()
    }
}

/// Handlers and middleware for a set of update kinds.
#[derive(Clone)]
pub struct View {
    name: String,
    matches: BTreeSet<UpdateType>,
    handlers: Vec<Handler>,
    middlewares: Vec<BoxedMiddleware>,
    state_key: Option<StateKeyFn>,
}

macro_rules! view_constructors {
    ($($(#[$meta:meta])* $fn_name:ident => $kind:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $fn_name() -> Self {
                Self::new(UpdateType::$kind.as_str(), [UpdateType::$kind])
            }
        )*
    };
}

impl View {
    /// Creates a view named `name` handling the given update kinds.
    ///
    /// The conversation key defaults to [`default_state_key`].
    pub fn new(name: impl Into<String>, matches: impl IntoIterator<Item = UpdateType>) -> Self {
        Self {
            name: name.into(),
            matches: matches.into_iter().collect(),
            handlers: Vec::new(),
            middlewares: Vec::new(),
            state_key: Some(Arc::new(default_state_key) as StateKeyFn),
        }
    }

    view_constructors! {
        /// View for new messages.
        message => Message,
        edited_message => EditedMessage,
        channel_post => ChannelPost,
        edited_channel_post => EditedChannelPost,
        /// View for inline keyboard presses.
        callback_query => CallbackQuery,
        inline_query => InlineQuery,
        chosen_inline_result => ChosenInlineResult,
        shipping_query => ShippingQuery,
        pre_checkout_query => PreCheckoutQuery,
        poll => Poll,
        poll_answer => PollAnswer,
        my_chat_member => MyChatMember,
        chat_member => ChatMember,
        chat_join_request => ChatJoinRequest,
    }

    /// Replaces the function deriving the conversation key.
    pub fn state_key<F>(mut self, f: F) -> Self
    where
        F: Fn(&Update) -> Option<String> + Send + Sync + 'static,
    {
        self.state_key = Some(Arc::new(f) as StateKeyFn);
        self
    }

    /// Disables state lookup for this view.
    pub fn without_state(mut self) -> Self {
        self.state_key = None;
        self
    }

    /// Appends a handler.
    pub fn register(&mut self, handler: Handler) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Appends a middleware.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Builder-style [`middleware`](Self::middleware).
    pub fn with_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The update kinds this view handles.
    pub fn matches(&self) -> impl Iterator<Item = UpdateType> + '_ {
        self.matches.iter().copied()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }

    /// Whether the update's kind belongs to this view.
    pub fn filter(&self, update: &Update) -> bool {
        self.matches.contains(&update.update_type())
    }

    /// Processes one update, reporting any failure to `env.errors`.
    ///
    /// Returns `Err` only when the error handler is in raise mode.
    pub async fn handle(
        &self,
        update: Arc<Update>,
        env: &DispatchEnv,
    ) -> Result<ViewOutcome, DispatchError> {
        let span = debug_span!("view", view = %self.name);
        match self.run(update, env).instrument(span).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                env.errors.handle(err)?;
                Ok(ViewOutcome::new(&self.name, ViewStatus::Failed, Vec::new()))
            }
        }
    }

    async fn run(&self, update: Arc<Update>, env: &DispatchEnv) -> Result<ViewOutcome, DispatchError> {
        let key = self.state_key.as_ref().and_then(|f| f(&update));
        let state = self.load_state(key.as_deref(), env).await?;

        let ctx = Arc::new(
            DispatchContext::new(update, env.client.clone(), Arc::clone(&env.store))
                .with_state(key, state)
                .with_bot_username(env.bot_username.clone()),
        );

        for middleware in &self.middlewares {
            let proceed = middleware
                .pre(&ctx)
                .await
                .map_err(|source| self.middleware_error(middleware.name(), Phase::Pre, source))?;
            if !proceed {
                debug!(middleware = middleware.name(), "Middleware vetoed update");
                return Ok(ViewOutcome::new(
                    &self.name,
                    ViewStatus::Vetoed {
                        middleware: middleware.name().to_string(),
                    },
                    Vec::new(),
                ));
            }
        }

        let mut outcomes = Vec::new();
        for handler in &self.handlers {
            let matched = handler
                .filter(&ctx)
                .await
                .map_err(|source| DispatchError::Rule {
                    view: self.name.clone(),
                    handler: handler.name().to_string(),
                    source,
                })?;
            if !matched {
                continue;
            }

            trace!(handler = handler.name(), "Running handler");
            let response = handler
                .handle(Arc::clone(&ctx))
                .await
                .map_err(|source| DispatchError::Handler {
                    view: self.name.clone(),
                    handler: handler.name().to_string(),
                    source,
                })?;
            outcomes.push(HandlerOutcome {
                handler: handler.name().to_string(),
                response,
            });

            if handler.is_blocking() {
                debug!(handler = handler.name(), "Blocking handler matched");
                break;
            }
        }

        for middleware in &self.middlewares {
            middleware
                .post(&ctx, &outcomes)
                .await
                .map_err(|source| self.middleware_error(middleware.name(), Phase::Post, source))?;
        }

        Ok(ViewOutcome::new(&self.name, ViewStatus::Completed, outcomes))
    }

    async fn load_state(
        &self,
        key: Option<&str>,
        env: &DispatchEnv,
    ) -> Result<Option<StateRepr>, DispatchError> {
        let Some(key) = key else {
            return Ok(None);
        };
        env.store
            .get(key)
            .await
            .map_err(|source| DispatchError::State {
                view: self.name.clone(),
                source,
            })
    }

    fn middleware_error(&self, middleware: &str, phase: Phase, source: BoxError) -> DispatchError {
        DispatchError::Middleware {
            view: self.name.clone(),
            middleware: middleware.to_string(),
            phase,
            source,
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("matches", &self.matches)
            .field("handlers", &self.handlers)
            .field(
                "middlewares",
                &self.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A [`View`] bound to its collaborators, usable as a tower service.
#[derive(Clone)]
pub struct ViewService {
    view: Arc<View>,
    env: DispatchEnv,
}

impl ViewService {
    pub fn new(view: impl Into<Arc<View>>, env: DispatchEnv) -> Self {
        Self {
            view: view.into(),
            env,
        }
    }
}

impl Service<Arc<Update>> for ViewService {
    type Response = Option<ViewOutcome>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    /// Resolves to `None` when the update is not for this view.
    fn call(&mut self, update: Arc<Update>) -> Self::Future {
        let view = Arc::clone(&self.view);
        let env = self.env.clone();
        async move {
            if !view.filter(&update) {
                return Ok(None);
            }
            Ok(Some(view.handle(update, &env).await?))
        }
        .boxed()
    }
}
