//! Per-conversation state.
//!
//! Two narrow interfaces live here:
//!
//! - [`StateStore`]: durable conversation state (`key -> StateRepr`), used by
//!   the FSM rules and the [`FsmContext`](crate::extractor::FsmContext)
//!   extractor. No expiry.
//! - [`ExpiringStore`]: ephemeral flags with an explicit time-to-live on every
//!   write (rate-limit windows, cooldowns).
//!
//! Both must be safe to share across concurrently dispatched updates. Neither
//! offers read-modify-write atomicity.

mod expiring;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ferrogram_core::{Context, Update};

use crate::error::StoreResult;

pub use expiring::{ExpiringStore, MemoryExpiringStore};
pub use memory::MemoryStateStore;

/// Separator between the group and the value of a state label.
pub const GROUP_SEPARATOR: char = ':';

/// Builds a conventional `"<group>:<value>"` state label.
pub fn state_label(group: &str, value: &str) -> String {
    format!("{group}{GROUP_SEPARATOR}{value}")
}

/// The stored state of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRepr {
    /// Conversation key this state belongs to.
    pub key: String,
    /// Opaque state label, conventionally `"<group>:<value>"`.
    pub state: String,
    /// Auxiliary data carried alongside the label.
    #[serde(default)]
    pub payload: Context,
}

impl StateRepr {
    pub fn new(key: impl Into<String>, state: impl Into<String>, payload: Context) -> Self {
        Self {
            key: key.into(),
            state: state.into(),
            payload,
        }
    }

    /// Returns the group prefix of the label, if it has one.
    pub fn group(&self) -> Option<&str> {
        self.state
            .split_once(GROUP_SEPARATOR)
            .map(|(group, _)| group)
    }
}

/// Keyed storage of conversation state.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Returns the state stored under `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<StateRepr>>;

    /// Stores `state` with `payload` under `key`, replacing what was there.
    async fn set(&self, key: &str, state: &str, payload: Context) -> StoreResult<()>;

    /// Removes any state stored under `key`.
    async fn clear(&self, key: &str) -> StoreResult<()>;
}

/// Function deriving the conversation key of an update.
pub type StateKeyFn = std::sync::Arc<dyn Fn(&Update) -> Option<String> + Send + Sync>;

/// Default conversation key: `"<chat_id>:<user_id>"`.
///
/// Updates that carry a sender but no chat (inline queries, ...) use the
/// sender for both halves. Updates without a sender have no key.
pub fn default_state_key(update: &Update) -> Option<String> {
    let user = update.from()?;
    let chat_id = update.chat().map_or(user.id, |chat| chat.id);
    Some(format!("{chat_id}:{}", user.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_label_and_group() {
        let repr = StateRepr::new("1:1", state_label("order", "address"), Context::new());
        assert_eq!(repr.state, "order:address");
        assert_eq!(repr.group(), Some("order"));

        let flat = StateRepr::new("1:1", "idle", Context::new());
        assert_eq!(flat.group(), None);
    }

    #[test]
    fn test_default_state_key() {
        let msg = Update::from_value(json!({
            "update_id": 1,
            "message": {"message_id": 1, "chat": {"id": -5, "type": "group"}, "from": {"id": 3}}
        }))
        .unwrap();
        assert_eq!(default_state_key(&msg).as_deref(), Some("-5:3"));

        let inline = Update::from_value(json!({
            "update_id": 2,
            "inline_query": {"id": "q", "from": {"id": 4}, "query": "x"}
        }))
        .unwrap();
        assert_eq!(default_state_key(&inline).as_deref(), Some("4:4"));

        let poll = Update::from_value(json!({"update_id": 3, "poll": {"id": "p"}})).unwrap();
        assert_eq!(default_state_key(&poll), None);
    }
}
