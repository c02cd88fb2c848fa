//! Shared fixtures for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use ferrogram_core::{ApiClient, ApiResult, BoxedClient, Update};

use crate::context::DispatchContext;
use crate::state::{MemoryStateStore, StateRepr};

/// Answers every call with a canned successful envelope and records it.
#[derive(Default)]
pub struct RecordingClient {
    pub calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingClient {
    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }
}

#[async_trait]
impl ApiClient for RecordingClient {
    async fn request(&self, method: &str, params: Value) -> ApiResult<Vec<u8>> {
        let chat_id = params.get("chat_id").cloned().unwrap_or(json!(0));
        let text = params.get("text").cloned().unwrap_or(Value::Null);
        self.calls.lock().push((method.to_string(), params));
        let body = json!({
            "ok": true,
            "result": {
                "message_id": 99,
                "date": 0,
                "chat": {"id": chat_id, "type": "private"},
                "text": text
            }
        });
        Ok(serde_json::to_vec(&body).unwrap())
    }
}

pub fn client() -> BoxedClient {
    Arc::new(RecordingClient::default())
}

/// A text message in private chat 100 from user 100.
pub fn text_message(text: &str) -> Update {
    Update::from_value(json!({
        "update_id": 1,
        "message": {
            "message_id": 1,
            "date": 0,
            "chat": {"id": 100, "type": "private"},
            "from": {"id": 100, "first_name": "Ann"},
            "text": text
        }
    }))
    .unwrap()
}

/// A text message in group chat -200 from user 100.
pub fn group_message(text: &str) -> Update {
    Update::from_value(json!({
        "update_id": 2,
        "message": {
            "message_id": 2,
            "date": 0,
            "chat": {"id": -200, "type": "group", "title": "team"},
            "from": {"id": 100, "first_name": "Ann"},
            "text": text
        }
    }))
    .unwrap()
}

/// A callback query from user 100 on a message in private chat 100.
pub fn callback(data: &str) -> Update {
    Update::from_value(json!({
        "update_id": 3,
        "callback_query": {
            "id": "cb-1",
            "from": {"id": 100, "first_name": "Ann"},
            "chat_instance": "ci",
            "data": data,
            "message": {"message_id": 5, "chat": {"id": 100, "type": "private"}}
        }
    }))
    .unwrap()
}

pub fn ctx_for(update: Update) -> DispatchContext {
    DispatchContext::new(
        Arc::new(update),
        client(),
        Arc::new(MemoryStateStore::new()),
    )
}

pub fn message_ctx(text: &str) -> DispatchContext {
    ctx_for(text_message(text))
}

pub fn callback_ctx(data: &str) -> DispatchContext {
    ctx_for(callback(data))
}

pub fn noop_ctx() -> DispatchContext {
    message_ctx("")
}

pub fn ctx_with_username(update: Update, username: &str) -> DispatchContext {
    ctx_for(update).with_bot_username(Some(Arc::from(username)))
}

pub fn ctx_with_state(update: Update, state: Option<StateRepr>) -> DispatchContext {
    let key = crate::state::default_state_key(&update);
    ctx_for(update).with_state(key, state)
}
