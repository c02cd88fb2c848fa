use std::sync::Arc;

use async_trait::async_trait;

use ferrogram_core::Context;

use super::FromContext;
use crate::context::DispatchContext;
use crate::error::{ExtractError, ExtractResult, StoreResult};
use crate::state::{StateRepr, StateStore};

/// The state loaded for this update's conversation.
///
/// Fails with [`ExtractError::NoState`] when the conversation has none; use
/// `Option<StateRepr>` to accept both.
#[async_trait]
impl FromContext for StateRepr {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        ctx.state().cloned().ok_or(ExtractError::NoState)
    }
}

/// Handle on the current conversation's state.
///
/// Bound to the conversation key of the update being handled; writes go
/// straight to the router's [`StateStore`] and become visible to the next
/// update of the same conversation.
#[derive(Clone)]
pub struct FsmContext {
    key: String,
    store: Arc<dyn StateStore>,
}

impl FsmContext {
    pub fn new(key: impl Into<String>, store: Arc<dyn StateStore>) -> Self {
        Self {
            key: key.into(),
            store,
        }
    }

    /// The conversation key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the current state from the store.
    pub async fn get(&self) -> StoreResult<Option<StateRepr>> {
        self.store.get(&self.key).await
    }

    /// Moves to `state`, keeping the stored payload.
    pub async fn set(&self, state: &str) -> StoreResult<()> {
        let payload = self
            .get()
            .await?
            .map(|repr| repr.payload)
            .unwrap_or_default();
        self.store.set(&self.key, state, payload).await
    }

    /// Moves to `state` and replaces the payload.
    pub async fn set_with(&self, state: &str, payload: Context) -> StoreResult<()> {
        self.store.set(&self.key, state, payload).await
    }

    /// Merges `values` into the stored payload without changing the label.
    ///
    /// Returns `false` (and stores nothing) when the conversation has no state.
    pub async fn update_payload(&self, values: Context) -> StoreResult<bool> {
        let Some(mut repr) = self.get().await? else {
            return Ok(false);
        };
        repr.payload.merge(values);
        self.store.set(&self.key, &repr.state, repr.payload).await?;
        Ok(true)
    }

    /// Clears the conversation's state.
    pub async fn finish(&self) -> StoreResult<()> {
        self.store.clear(&self.key).await
    }
}

impl std::fmt::Debug for FsmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsmContext")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FromContext for FsmContext {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        let key = ctx.state_key().ok_or(ExtractError::NoState)?;
        Ok(Self::new(key, Arc::clone(ctx.store())))
    }
}
