//! The router: fan-out of updates to views.
//!
//! The [`Router`] holds every registered [`View`] together with the shared
//! [`StateStore`] and [`ErrorHandler`]. For each update it asks every view,
//! in registration order, whether the update belongs to it and, if so, lets
//! the view process it. Views run one after another; a failing or panicking
//! view never prevents the next one from seeing the update.
//!
//! ```rust,ignore
//! let mut router = Router::new();
//!
//! let mut messages = View::message();
//! messages.register(Handler::new("start", start).rule(Command::new(["start"])));
//! router.register_view(messages)?;
//!
//! let report = router.route(update, client).await?;
//! ```

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, debug, debug_span, error};

use ferrogram_core::{BoxedClient, Update, UpdateType};

use crate::error::{DispatchError, RouterError};
use crate::error_handler::ErrorHandler;
use crate::state::{MemoryStateStore, StateStore};
use crate::view::{DispatchEnv, View, ViewOutcome, ViewStatus};

/// What happened to one update across all views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteReport {
    pub update_id: i64,
    /// One entry per view whose kinds matched, in registration order.
    pub views: Vec<ViewOutcome>,
}

impl RouteReport {
    /// Names of the views that processed the update.
    pub fn matched_views(&self) -> impl Iterator<Item = &str> {
        self.views.iter().map(|v| v.view.as_str())
    }

    /// Names of the views that failed on the update.
    pub fn failed_views(&self) -> impl Iterator<Item = &str> {
        self.views
            .iter()
            .filter(|v| v.status == ViewStatus::Failed)
            .map(|v| v.view.as_str())
    }

    /// Whether any handler ran.
    pub fn handled(&self) -> bool {
        self.views.iter().any(ViewOutcome::handled)
    }
}

/// Registry of views plus the collaborators they share.
#[derive(Clone)]
pub struct Router {
    views: Vec<Arc<View>>,
    store: Arc<dyn StateStore>,
    errors: Arc<ErrorHandler>,
    bot_username: Option<Arc<str>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a router with an in-memory state store and a swallowing
    /// error handler.
    pub fn new() -> Self {
        Self {
            views: Vec::new(),
            store: Arc::new(MemoryStateStore::new()),
            errors: Arc::new(ErrorHandler::new()),
            bot_username: None,
        }
    }

    /// Replaces the state store.
    pub fn with_store(mut self, store: impl StateStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Replaces the state store with a shared one.
    pub fn with_shared_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_error_handler(mut self, errors: ErrorHandler) -> Self {
        self.errors = Arc::new(errors);
        self
    }

    /// Sets the bot's own username for `@mention` checks.
    pub fn with_bot_username(mut self, username: impl AsRef<str>) -> Self {
        self.set_bot_username(username);
        self
    }

    pub fn set_bot_username(&mut self, username: impl AsRef<str>) {
        let username = username.as_ref().trim_start_matches('@');
        self.bot_username = (!username.is_empty()).then(|| Arc::from(username));
    }

    pub fn bot_username(&self) -> Option<&str> {
        self.bot_username.as_deref()
    }

    /// Mutable access to the error handler, for registering handlers.
    pub fn error_handler_mut(&mut self) -> &mut ErrorHandler {
        Arc::make_mut(&mut self.errors)
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.errors
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Registers a view. View names are unique.
    pub fn register_view(&mut self, view: View) -> Result<&mut Self, RouterError> {
        if self.views.iter().any(|v| v.name() == view.name()) {
            return Err(RouterError::DuplicateView(view.name().to_string()));
        }
        debug!(view = view.name(), "Registering view");
        self.views.push(Arc::new(view));
        Ok(self)
    }

    /// Mutable access to a registered view.
    pub fn view_mut(&mut self, name: &str) -> Option<&mut View> {
        self.views
            .iter_mut()
            .find(|v| v.name() == name)
            .map(Arc::make_mut)
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name() == name).map(|v| &**v)
    }

    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.iter().map(|v| &**v)
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Union of the update kinds handled by all views, in wire order.
    pub fn allowed_updates(&self) -> Vec<UpdateType> {
        let kinds: BTreeSet<UpdateType> = self.views.iter().flat_map(|v| v.matches()).collect();
        kinds.into_iter().collect()
    }

    fn env(&self, client: BoxedClient) -> DispatchEnv {
        DispatchEnv {
            client,
            store: Arc::clone(&self.store),
            errors: Arc::clone(&self.errors),
            bot_username: self.bot_username.clone(),
        }
    }

    /// Routes one update through every matching view.
    ///
    /// Failures are reported per view and do not stop later views. `Err` is
    /// returned only when the error handler is in raise mode.
    pub async fn route(
        &self,
        update: impl Into<Arc<Update>>,
        client: BoxedClient,
    ) -> Result<RouteReport, DispatchError> {
        let update = update.into();
        let span = debug_span!(
            "dispatch",
            update_id = update.update_id,
            kind = %update.update_type()
        );
        self.route_inner(update, client).instrument(span).await
    }

    async fn route_inner(
        &self,
        update: Arc<Update>,
        client: BoxedClient,
    ) -> Result<RouteReport, DispatchError> {
        let env = self.env(client);
        let mut report = RouteReport {
            update_id: update.update_id,
            views: Vec::new(),
        };

        for view in self.views.iter().filter(|v| v.filter(&update)) {
            let handled = AssertUnwindSafe(view.handle(Arc::clone(&update), &env))
                .catch_unwind()
                .await;

            let outcome = match handled {
                Ok(result) => result?,
                Err(panic) => {
                    let err = DispatchError::Panicked {
                        view: view.name().to_string(),
                        message: panic_message(&*panic),
                    };
                    error!(view = view.name(), "View panicked");
                    self.errors.handle(err)?;
                    ViewOutcome {
                        view: view.name().to_string(),
                        status: ViewStatus::Failed,
                        outcomes: Vec::new(),
                    }
                }
            };
            report.views.push(outcome);
        }

        if report.views.is_empty() {
            debug!("No view matched update");
        }
        Ok(report)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("views", &self.views.iter().map(|v| v.name()).collect::<Vec<_>>())
            .field("errors", &self.errors)
            .field("bot_username", &self.bot_username)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::error_handler::ErrorMode;
    use crate::handler::Handler;
    use crate::error::StoreError;
    use crate::extractor::FsmContext;
    use crate::rules::{Command, State};
    use crate::state::state_label;
    use crate::testing::{RecordingClient, callback, client, group_message, text_message};
    use ferrogram_core::Message;

    fn counting(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = Arc::clone(counter);
        Handler::new("count", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    #[test]
    fn test_duplicate_view_rejected() {
        let mut router = Router::new();
        assert_ok!(router.register_view(View::message()));
        let err = assert_err!(router.register_view(View::message()));
        assert!(matches!(err, RouterError::DuplicateView(name) if name == "message"));
    }

    #[test]
    fn test_allowed_updates_is_union() {
        let mut router = Router::new();
        router.register_view(View::callback_query()).unwrap();
        router.register_view(View::message()).unwrap();
        router
            .register_view(View::new("all_messages", [UpdateType::Message, UpdateType::EditedMessage]))
            .unwrap();
        assert_eq!(
            router.allowed_updates(),
            vec![
                UpdateType::Message,
                UpdateType::EditedMessage,
                UpdateType::CallbackQuery
            ]
        );
    }

    #[tokio::test]
    async fn test_route_only_to_matching_views() {
        let messages = Arc::new(AtomicUsize::new(0));
        let callbacks = Arc::new(AtomicUsize::new(0));

        let mut router = Router::new();
        router
            .register_view(View::message().with_handler(counting(&messages)))
            .unwrap();
        router
            .register_view(View::callback_query().with_handler(counting(&callbacks)))
            .unwrap();

        let report = router.route(text_message("x"), client()).await.unwrap();
        assert_eq!(report.matched_views().collect::<Vec<_>>(), ["message"]);
        assert!(report.handled());

        router.route(callback("y"), client()).await.unwrap();
        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(callbacks.load(Ordering::SeqCst), 1);
    }

    async fn explode() {
        panic!("handler exploded");
    }

    #[tokio::test]
    async fn test_failing_view_does_not_block_others() {
        let counter = Arc::new(AtomicUsize::new(0));

        let mut router = Router::new();
        router
            .register_view(View::new("panics", [UpdateType::Message]).with_handler(
                Handler::new("boom", explode),
            ))
            .unwrap();
        router
            .register_view(View::new("errors", [UpdateType::Message]).with_handler(
                Handler::new("err", || async { Err::<(), _>(std::io::Error::other("nope")) }),
            ))
            .unwrap();
        router
            .register_view(View::new("works", [UpdateType::Message]).with_handler(counting(&counter)))
            .unwrap();

        let report = router.route(text_message("x"), client()).await.unwrap();
        assert_eq!(report.failed_views().collect::<Vec<_>>(), ["panics", "errors"]);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_raise_mode_propagates() {
        let mut router = Router::new().with_error_handler(ErrorHandler::with_mode(ErrorMode::Raise));
        router
            .register_view(View::message().with_handler(Handler::new("err", || async {
                Err::<(), _>(std::io::Error::other("nope"))
            })))
            .unwrap();

        let err = router.route(text_message("x"), client()).await.unwrap_err();
        assert_eq!(err.view(), "message");
    }

    #[tokio::test]
    async fn test_bot_username_reaches_rules() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new().with_bot_username("@MyBot");
        assert_eq!(router.bot_username(), Some("MyBot"));
        router
            .register_view(
                View::message().with_handler(counting(&counter).rule(Command::new(["start"]))),
            )
            .unwrap();

        router.route(group_message("/start@mybot"), client()).await.unwrap();
        router.route(group_message("/start@otherbot"), client()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_view_mut_after_registration() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router.register_view(View::message()).unwrap();
        router
            .view_mut("message")
            .unwrap()
            .register(counting(&counter));
        assert!(router.view_mut("missing").is_none());

        router.route(text_message("x"), client()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(router.view("message").map(View::handler_count), Some(1));
    }

    #[tokio::test]
    async fn test_conversation_spans_updates() {
        let mut router = Router::new();
        router
            .register_view(
                View::message()
                    .with_handler(
                        Handler::new("begin", |fsm: FsmContext| async move {
                            fsm.set(&state_label("order", "item")).await?;
                            Ok::<_, StoreError>("What item?")
                        })
                        .rule(Command::new(["order"]))
                        .rule(State::none()),
                    )
                    .with_handler(
                        Handler::new("item", |msg: Message, fsm: FsmContext| async move {
                            fsm.finish().await?;
                            Ok::<_, StoreError>(format!("Ordered {}", msg.text.unwrap_or_default()))
                        })
                        .rule(State::new([state_label("order", "item")])),
                    ),
            )
            .unwrap();

        let recorder = Arc::new(RecordingClient::default());
        let api: BoxedClient = recorder.clone();

        let idle = router.route(text_message("tea"), Arc::clone(&api)).await.unwrap();
        assert!(!idle.handled());

        router.route(text_message("/order"), Arc::clone(&api)).await.unwrap();
        let stored = router.store().get("100:100").await.unwrap().unwrap();
        assert_eq!(stored.state, "order:item");

        router.route(text_message("tea"), Arc::clone(&api)).await.unwrap();
        assert!(router.store().get("100:100").await.unwrap().is_none());

        let replies: Vec<_> = recorder
            .calls
            .lock()
            .iter()
            .filter(|(method, _)| method == "sendMessage")
            .map(|(_, params)| params["text"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(replies, ["What item?", "Ordered tea"]);
    }
}
