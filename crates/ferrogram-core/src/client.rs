//! Transport contract towards the remote platform.
//!
//! [`ApiClient`] is the only way the framework reaches the remote platform:
//! one method name, one JSON parameter object, raw response bytes back.
//! [`ApiClientExt`] layers the response envelope decoding and the handful of
//! typed calls the framework itself needs on top of it.
//!
//! # Response envelope
//!
//! ```text
//! { "ok": true,  "result": ... }
//! { "ok": false, "error_code": 401, "description": "Unauthorized",
//!   "parameters": { "retry_after": 5 } }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::trace;

use crate::error::{ApiError, ApiResult};
use crate::update::{Message, UpdateType, User};

/// A type-erased, shareable API client.
pub type BoxedClient = Arc<dyn ApiClient>;

/// Raw request/response access to the remote API.
///
/// Implementations must be safe to call concurrently; handlers running on
/// different dispatch tasks share one client.
#[async_trait]
pub trait ApiClient: Send + Sync + 'static {
    /// Calls `method` with `params` and returns the raw response body.
    ///
    /// Implementations return `Ok` whenever the platform produced a response
    /// envelope, even one with `ok: false`; envelope errors are classified by
    /// [`decode_response`].
    async fn request(&self, method: &str, params: Value) -> ApiResult<Vec<u8>>;
}

#[derive(Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

/// Decodes a response envelope into its `result`.
///
/// `ok: false` envelopes become [`ApiError`]s classified by `error_code`;
/// a `retry_after` parameter becomes [`ApiError::TooManyRequests`].
pub fn decode_response<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    let envelope: Envelope = serde_json::from_slice(body)?;

    if !envelope.ok {
        if let Some(retry_after) = envelope.parameters.and_then(|p| p.retry_after) {
            return Err(ApiError::TooManyRequests { retry_after });
        }
        let description = envelope
            .description
            .unwrap_or_else(|| "no description".to_string());
        return Err(match envelope.error_code {
            Some(code) => ApiError::from_code(code, description),
            None => ApiError::Other(description),
        });
    }

    let result = envelope.result.unwrap_or(Value::Null);
    Ok(serde_json::from_value(result)?)
}

/// Parameters of the "get updates" long-poll call.
#[derive(Debug, Clone, Default)]
pub struct GetUpdates {
    pub offset: Option<i64>,
    pub limit: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub allowed_updates: Vec<UpdateType>,
}

impl GetUpdates {
    /// Renders the JSON parameter object.
    pub fn to_params(&self) -> Value {
        let mut params = json!({
            "allowed_updates": self.allowed_updates.iter().map(UpdateType::as_str).collect::<Vec<_>>(),
        });
        if let Some(offset) = self.offset {
            params["offset"] = json!(offset);
        }
        if let Some(limit) = self.limit {
            params["limit"] = json!(limit);
        }
        if let Some(timeout) = self.timeout_secs {
            params["timeout"] = json!(timeout);
        }
        params
    }
}

/// Typed helpers over [`ApiClient`].
#[async_trait]
pub trait ApiClientExt: ApiClient {
    /// Calls `method` and decodes the envelope's `result` as `T`.
    async fn call<T: DeserializeOwned + Send>(&self, method: &str, params: Value) -> ApiResult<T> {
        trace!(method, "Calling API method");
        let body = self.request(method, params).await?;
        decode_response(&body)
    }

    /// Fetches the next batch of raw update envelopes.
    ///
    /// Envelopes are returned as JSON so that a single malformed update does
    /// not poison the whole batch.
    async fn get_updates(&self, request: &GetUpdates) -> ApiResult<Vec<Value>> {
        self.call("getUpdates", request.to_params()).await
    }

    /// Returns the bot's own account.
    async fn get_me(&self) -> ApiResult<User> {
        self.call("getMe", json!({})).await
    }

    /// Sends a text message to a chat.
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&str>,
    ) -> ApiResult<Message> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if let Some(mode) = parse_mode {
            params["parse_mode"] = json!(mode);
        }
        self.call("sendMessage", params).await
    }
}

impl<C: ApiClient + ?Sized> ApiClientExt for C {}
