use std::collections::HashSet;

use async_trait::async_trait;

use ferrogram_core::{ChatType, Context};

use super::{MatchResult, Rule};
use crate::context::DispatchContext;
use crate::error::BoxError;

/// Matches updates sent by one of the given user ids.
#[derive(Debug, Clone)]
pub struct FromUser {
    ids: HashSet<i64>,
}

impl FromUser {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Rule for FromUser {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        Ok(ctx
            .update()
            .from()
            .is_some_and(|user| self.ids.contains(&user.id))
            .into())
    }
}

/// Matches updates belonging to one of the given chat ids.
#[derive(Debug, Clone)]
pub struct InChat {
    ids: HashSet<i64>,
}

impl InChat {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Rule for InChat {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        Ok(ctx
            .update()
            .chat()
            .is_some_and(|chat| self.ids.contains(&chat.id))
            .into())
    }
}

/// Matches updates from chats of the given kinds.
#[derive(Debug, Clone)]
pub struct ChatTypeIs {
    kinds: HashSet<ChatType>,
}

impl ChatTypeIs {
    pub fn new(kinds: impl IntoIterator<Item = ChatType>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Rule for ChatTypeIs {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        Ok(ctx
            .update()
            .chat()
            .is_some_and(|chat| self.kinds.contains(&chat.kind))
            .into())
    }
}

/// Matches when a dot-separated path is present (and not null) in the raw
/// payload, e.g. `"photo"` or `"reply_to_message.from.id"`.
#[derive(Debug, Clone)]
pub struct HasField {
    path: String,
}

impl HasField {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Rule for HasField {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        Ok(ctx.update().raw_field(&self.path).is_some().into())
    }

    fn describe(&self) -> String {
        format!("has_field({})", self.path)
    }
}

#[derive(Debug, Clone)]
enum DataMatch {
    Any,
    Exact(HashSet<String>),
    Prefix(String),
}

/// Matches callback queries by their data; binds it as `callback_data`.
#[derive(Debug, Clone)]
pub struct CallbackData {
    matcher: DataMatch,
}

impl CallbackData {
    /// Any callback query carrying data.
    pub fn any() -> Self {
        Self {
            matcher: DataMatch::Any,
        }
    }

    /// Data equal to one of `values`.
    pub fn values(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            matcher: DataMatch::Exact(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Data starting with `prefix`; the remainder is also bound as
    /// `callback_suffix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            matcher: DataMatch::Prefix(prefix.into()),
        }
    }
}

#[async_trait]
impl Rule for CallbackData {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let Some(data) = ctx.update().callback_data() else {
            return Ok(MatchResult::False);
        };

        let bindings = Context::new().with("callback_data", data);
        Ok(match &self.matcher {
            DataMatch::Any => MatchResult::Bindings(bindings),
            DataMatch::Exact(values) if values.contains(data) => MatchResult::Bindings(bindings),
            DataMatch::Prefix(prefix) => match data.strip_prefix(prefix.as_str()) {
                Some(suffix) => MatchResult::Bindings(bindings.with("callback_suffix", suffix)),
                None => MatchResult::False,
            },
            DataMatch::Exact(_) => MatchResult::False,
        })
    }
}
