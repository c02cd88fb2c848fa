//! Per-update dispatch context.
//!
//! One [`DispatchContext`] is created for every (update, view) pair. It bundles
//! the immutable inputs (update, API client, resolved conversation state) with
//! the bindings map that rules and middleware fill in while the view runs.
//! Rules, middleware and extractors all see the same instance, shared through
//! an `Arc`.

use std::sync::Arc;

use parking_lot::Mutex;

use ferrogram_core::{BoxedClient, Context, ContextValue, Update};

use crate::state::{StateRepr, StateStore};

/// Everything known about one update while one view processes it.
pub struct DispatchContext {
    update: Arc<Update>,
    client: BoxedClient,
    store: Arc<dyn StateStore>,
    state_key: Option<String>,
    state: Option<StateRepr>,
    bot_username: Option<Arc<str>>,
    bindings: Mutex<Context>,
}

impl DispatchContext {
    pub fn new(update: Arc<Update>, client: BoxedClient, store: Arc<dyn StateStore>) -> Self {
        Self {
            update,
            client,
            store,
            state_key: None,
            state: None,
            bot_username: None,
            bindings: Mutex::new(Context::new()),
        }
    }

    /// Attaches the conversation key and the state loaded for it.
    pub fn with_state(mut self, key: Option<String>, state: Option<StateRepr>) -> Self {
        self.state_key = key;
        self.state = state;
        self
    }

    /// Sets the bot's own username, used by mention checks.
    pub fn with_bot_username(mut self, username: Option<Arc<str>>) -> Self {
        self.bot_username = username;
        self
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn update_arc(&self) -> Arc<Update> {
        Arc::clone(&self.update)
    }

    pub fn client(&self) -> &BoxedClient {
        &self.client
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Conversation key of this update, if the view defines one for it.
    pub fn state_key(&self) -> Option<&str> {
        self.state_key.as_deref()
    }

    /// State loaded for the conversation before any rule ran.
    ///
    /// This is a snapshot: writes through [`FsmContext`](crate::extractor::FsmContext)
    /// are visible to the next update, not to the rest of this one.
    pub fn state(&self) -> Option<&StateRepr> {
        self.state.as_ref()
    }

    pub fn bot_username(&self) -> Option<&str> {
        self.bot_username.as_deref()
    }

    /// Returns a copy of one binding.
    pub fn binding(&self, key: &str) -> Option<ContextValue> {
        self.bindings.lock().get(key).cloned()
    }

    /// Returns a copy of all bindings.
    pub fn bindings(&self) -> Context {
        self.bindings.lock().clone()
    }

    /// Publishes a single binding for later middleware and handlers.
    pub fn bind(&self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.bindings.lock().insert(key, value);
    }

    /// Merges bindings; existing keys are overwritten.
    pub fn merge_bindings(&self, other: Context) {
        if !other.is_empty() {
            self.bindings.lock().merge(other);
        }
    }
}

impl std::fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchContext")
            .field("update_id", &self.update.update_id)
            .field("kind", &self.update.update_type())
            .field("state_key", &self.state_key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
