use std::sync::Arc;

use async_trait::async_trait;

use ferrogram_core::{
    CallbackQuery, Chat, ChatJoinRequest, InlineQuery, Message, Update, UpdateKind, User,
};

use super::FromContext;
use crate::context::DispatchContext;
use crate::error::{ExtractError, ExtractResult};

fn mismatch(expected: &'static str, ctx: &DispatchContext) -> ExtractError {
    ExtractError::UpdateKindMismatch {
        expected,
        got: ctx.update().update_type().as_str(),
    }
}

#[async_trait]
impl FromContext for Arc<Update> {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        Ok(ctx.update_arc())
    }
}

/// The message of a message-like update, or the message a callback query is
/// attached to.
#[async_trait]
impl FromContext for Message {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        ctx.update()
            .message()
            .cloned()
            .ok_or_else(|| mismatch("message", ctx))
    }
}

#[async_trait]
impl FromContext for CallbackQuery {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        match &ctx.update().kind {
            UpdateKind::CallbackQuery(query) => Ok(query.clone()),
            _ => Err(mismatch("callback_query", ctx)),
        }
    }
}

#[async_trait]
impl FromContext for InlineQuery {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        match &ctx.update().kind {
            UpdateKind::InlineQuery(query) => Ok(query.clone()),
            _ => Err(mismatch("inline_query", ctx)),
        }
    }
}

#[async_trait]
impl FromContext for ChatJoinRequest {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        match &ctx.update().kind {
            UpdateKind::ChatJoinRequest(request) => Ok(request.clone()),
            _ => Err(mismatch("chat_join_request", ctx)),
        }
    }
}

/// The sender of the update.
#[async_trait]
impl FromContext for User {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        ctx.update()
            .from()
            .cloned()
            .ok_or_else(|| mismatch("update with a sender", ctx))
    }
}

#[async_trait]
impl FromContext for Chat {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        ctx.update()
            .chat()
            .cloned()
            .ok_or_else(|| mismatch("update with a chat", ctx))
    }
}
