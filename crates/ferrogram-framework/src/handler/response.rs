//! Reply convention for handler return values.
//!
//! Whatever a callback returns is turned into an optional JSON value that is
//! recorded for the view's `post` middleware. Text-like values are also sent
//! back to the chat the update came from.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, warn};

use ferrogram_core::ApiClientExt;

use crate::context::DispatchContext;
use crate::error::BoxError;

/// A text reply with optional formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub parse_mode: Option<String>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: None,
        }
    }

    /// Sets the parse mode (`"HTML"`, `"MarkdownV2"`, ...).
    pub fn parse_mode(mut self, mode: impl Into<String>) -> Self {
        self.parse_mode = Some(mode.into());
        self
    }

    async fn send(&self, ctx: &DispatchContext) {
        let Some(chat) = ctx.update().chat() else {
            warn!(
                update_id = ctx.update().update_id,
                "Handler returned a reply but the update has no chat"
            );
            return;
        };
        if let Err(e) = ctx
            .client()
            .send_message(chat.id, &self.text, self.parse_mode.as_deref())
            .await
        {
            error!("Failed to send reply: {e}");
        }
    }
}

/// Types that can be returned from handler callbacks.
#[async_trait]
pub trait HandlerResponse: Send + 'static {
    /// Applies the reply convention and returns the value to record.
    async fn into_outcome(self, ctx: &DispatchContext) -> Result<Option<Value>, BoxError>;
}

/// `()`: nothing to send, nothing recorded.
#[async_trait]
impl HandlerResponse for () {
    async fn into_outcome(self, _ctx: &DispatchContext) -> Result<Option<Value>, BoxError> {
        Ok(None)
    }
}

#[async_trait]
impl HandlerResponse for Reply {
    async fn into_outcome(self, ctx: &DispatchContext) -> Result<Option<Value>, BoxError> {
        self.send(ctx).await;
        Ok(Some(Value::String(self.text)))
    }
}

/// `String`: sent to the originating chat.
#[async_trait]
impl HandlerResponse for String {
    async fn into_outcome(self, ctx: &DispatchContext) -> Result<Option<Value>, BoxError> {
        Reply::text(self).into_outcome(ctx).await
    }
}

#[async_trait]
impl HandlerResponse for &'static str {
    async fn into_outcome(self, ctx: &DispatchContext) -> Result<Option<Value>, BoxError> {
        Reply::text(self).into_outcome(ctx).await
    }
}

/// Raw JSON: recorded as-is, nothing is sent.
#[async_trait]
impl HandlerResponse for Value {
    async fn into_outcome(self, _ctx: &DispatchContext) -> Result<Option<Value>, BoxError> {
        Ok(Some(self))
    }
}

#[async_trait]
impl<T: HandlerResponse> HandlerResponse for Option<T> {
    async fn into_outcome(self, ctx: &DispatchContext) -> Result<Option<Value>, BoxError> {
        match self {
            Some(t) => t.into_outcome(ctx).await,
            None => Ok(None),
        }
    }
}

/// `Result`: `Ok` follows the inner convention, `Err` fails the handler.
#[async_trait]
impl<T, E> HandlerResponse for Result<T, E>
where
    T: HandlerResponse,
    E: Into<BoxError> + Send + 'static,
{
    async fn into_outcome(self, ctx: &DispatchContext) -> Result<Option<Value>, BoxError> {
        match self {
            Ok(t) => t.into_outcome(ctx).await,
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::state::MemoryStateStore;
    use crate::testing::{RecordingClient, text_message};

    fn recording_ctx() -> (DispatchContext, Arc<RecordingClient>) {
        let client = Arc::new(RecordingClient::default());
        let ctx = DispatchContext::new(
            Arc::new(text_message("hi")),
            client.clone(),
            Arc::new(MemoryStateStore::new()),
        );
        (ctx, client)
    }

    #[tokio::test]
    async fn test_string_is_sent_to_chat() {
        let (ctx, client) = recording_ctx();
        let recorded = "pong".to_string().into_outcome(&ctx).await.unwrap();
        assert_eq!(recorded, Some(Value::String("pong".into())));

        let calls = client.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(calls[0].1["chat_id"], 100);
        assert_eq!(calls[0].1["text"], "pong");
    }

    #[tokio::test]
    async fn test_reply_parse_mode() {
        let (ctx, client) = recording_ctx();
        Reply::text("<b>x</b>")
            .parse_mode("HTML")
            .into_outcome(&ctx)
            .await
            .unwrap();
        assert_eq!(client.calls.lock()[0].1["parse_mode"], "HTML");
    }

    #[tokio::test]
    async fn test_unit_none_and_value_send_nothing() {
        let (ctx, client) = recording_ctx();
        assert_eq!(().into_outcome(&ctx).await.unwrap(), None);
        assert_eq!(None::<String>.into_outcome(&ctx).await.unwrap(), None);
        assert_eq!(
            serde_json::json!({"k": 1}).into_outcome(&ctx).await.unwrap(),
            Some(serde_json::json!({"k": 1}))
        );
        assert!(client.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_result_error_propagates() {
        let (ctx, client) = recording_ctx();
        let failed: Result<String, std::io::Error> = Err(std::io::Error::other("boom"));
        let err = failed.into_outcome(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(client.calls.lock().is_empty());
    }
}
