//! Update envelope model.
//!
//! The remote platform delivers events as JSON envelopes of the form
//!
//! ```text
//! { "update_id": 42, "<kind>": { ...kind-specific object... } }
//! ```
//!
//! where exactly one kind key is present besides `update_id`. [`Update`]
//! deserializes this envelope into a typed [`UpdateKind`] while keeping the raw
//! kind object around for structural lookups ([`Update::raw_field`]).
//!
//! Only the minimal shape needed for dispatch is modelled here: ids, sender,
//! chat and text-like fields. Everything else stays reachable through the raw
//! payload.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ============================================================================
// Update Type Classification
// ============================================================================

/// Field-less tag of an update kind.
///
/// The string form is the wire key (`"message"`, `"callback_query"`, ...) and is
/// what the `allowed_updates` list of the "get updates" call expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpdateType {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    CallbackQuery,
    InlineQuery,
    ChosenInlineResult,
    ShippingQuery,
    PreCheckoutQuery,
    Poll,
    PollAnswer,
    MyChatMember,
    ChatMember,
    ChatJoinRequest,
}

impl UpdateType {
    /// Every known update type, in wire order.
    pub const ALL: [UpdateType; 14] = [
        Self::Message,
        Self::EditedMessage,
        Self::ChannelPost,
        Self::EditedChannelPost,
        Self::CallbackQuery,
        Self::InlineQuery,
        Self::ChosenInlineResult,
        Self::ShippingQuery,
        Self::PreCheckoutQuery,
        Self::Poll,
        Self::PollAnswer,
        Self::MyChatMember,
        Self::ChatMember,
        Self::ChatJoinRequest,
    ];

    /// Returns the wire key for this update type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::CallbackQuery => "callback_query",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::ShippingQuery => "shipping_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
            Self::Poll => "poll",
            Self::PollAnswer => "poll_answer",
            Self::MyChatMember => "my_chat_member",
            Self::ChatMember => "chat_member",
            Self::ChatJoinRequest => "chat_join_request",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown update type '{s}'"))
    }
}

impl Serialize for UpdateType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UpdateType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ============================================================================
// Domain entities (minimal)
// ============================================================================

/// A user or bot account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

/// Kind of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
    #[serde(other)]
    Unknown,
}

/// A conversation: private chat, group, supergroup or channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A message, edited message, channel post or edited channel post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Message {
    /// Returns the message text, falling back to the media caption.
    pub fn text_or_caption(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

/// An inline keyboard button press.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
    #[serde(default)]
    pub chat_instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// An incoming inline query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: String,
}

/// An inline result chosen by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChosenInlineResult {
    pub result_id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
}

/// An incoming shipping query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub invoice_payload: String,
}

/// An incoming pre-checkout query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreCheckoutQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub total_amount: i64,
    #[serde(default)]
    pub invoice_payload: String,
}

/// A user's answer in a non-anonymous poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollAnswer {
    pub poll_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_chat: Option<Chat>,
    #[serde(default)]
    pub option_ids: Vec<i64>,
}

/// A change of a chat member's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub from: User,
    #[serde(default)]
    pub date: i64,
}

/// A request to join a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: Chat,
    pub from: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_chat_id: Option<i64>,
    #[serde(default)]
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

// ============================================================================
// UpdateKind / Update
// ============================================================================

/// The populated variant of an [`Update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    CallbackQuery(CallbackQuery),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    ShippingQuery(ShippingQuery),
    PreCheckoutQuery(PreCheckoutQuery),
    /// Poll state; carries no sender, so the raw object is kept as-is.
    Poll(Value),
    PollAnswer(PollAnswer),
    MyChatMember(ChatMemberUpdated),
    ChatMember(ChatMemberUpdated),
    ChatJoinRequest(ChatJoinRequest),
}

impl UpdateKind {
    /// Returns the tag of this variant.
    pub fn update_type(&self) -> UpdateType {
        match self {
            Self::Message(_) => UpdateType::Message,
            Self::EditedMessage(_) => UpdateType::EditedMessage,
            Self::ChannelPost(_) => UpdateType::ChannelPost,
            Self::EditedChannelPost(_) => UpdateType::EditedChannelPost,
            Self::CallbackQuery(_) => UpdateType::CallbackQuery,
            Self::InlineQuery(_) => UpdateType::InlineQuery,
            Self::ChosenInlineResult(_) => UpdateType::ChosenInlineResult,
            Self::ShippingQuery(_) => UpdateType::ShippingQuery,
            Self::PreCheckoutQuery(_) => UpdateType::PreCheckoutQuery,
            Self::Poll(_) => UpdateType::Poll,
            Self::PollAnswer(_) => UpdateType::PollAnswer,
            Self::MyChatMember(_) => UpdateType::MyChatMember,
            Self::ChatMember(_) => UpdateType::ChatMember,
            Self::ChatJoinRequest(_) => UpdateType::ChatJoinRequest,
        }
    }

    fn from_raw(update_type: UpdateType, raw: &Value) -> Result<Self, serde_json::Error> {
        fn parse<T: DeserializeOwned>(raw: &Value) -> Result<T, serde_json::Error> {
            T::deserialize(raw)
        }

        Ok(match update_type {
            UpdateType::Message => Self::Message(parse(raw)?),
            UpdateType::EditedMessage => Self::EditedMessage(parse(raw)?),
            UpdateType::ChannelPost => Self::ChannelPost(parse(raw)?),
            UpdateType::EditedChannelPost => Self::EditedChannelPost(parse(raw)?),
            UpdateType::CallbackQuery => Self::CallbackQuery(parse(raw)?),
            UpdateType::InlineQuery => Self::InlineQuery(parse(raw)?),
            UpdateType::ChosenInlineResult => Self::ChosenInlineResult(parse(raw)?),
            UpdateType::ShippingQuery => Self::ShippingQuery(parse(raw)?),
            UpdateType::PreCheckoutQuery => Self::PreCheckoutQuery(parse(raw)?),
            UpdateType::Poll => Self::Poll(raw.clone()),
            UpdateType::PollAnswer => Self::PollAnswer(parse(raw)?),
            UpdateType::MyChatMember => Self::MyChatMember(parse(raw)?),
            UpdateType::ChatMember => Self::ChatMember(parse(raw)?),
            UpdateType::ChatJoinRequest => Self::ChatJoinRequest(parse(raw)?),
        })
    }
}

/// One event delivered by the remote platform.
///
/// Immutable once received. Exactly one kind is populated, enforced at
/// deserialization time: an envelope with zero or several known kind keys is
/// rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub kind: UpdateKind,
    raw: Value,
}

impl Update {
    /// Builds an update from its id and the kind-specific raw object.
    pub fn from_parts(
        update_id: i64,
        update_type: UpdateType,
        raw: Value,
    ) -> Result<Self, serde_json::Error> {
        let kind = UpdateKind::from_raw(update_type, &raw)?;
        Ok(Self {
            update_id,
            kind,
            raw,
        })
    }

    /// Parses a wire envelope.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Whether a wire envelope populates any kind this model knows.
    ///
    /// Envelopes that fail this check carry only kinds newer than the model
    /// and can be skipped rather than treated as malformed.
    pub fn carries_known_kind(value: &Value) -> bool {
        value.as_object().is_some_and(|map| {
            map.iter()
                .any(|(key, value)| !value.is_null() && key.parse::<UpdateType>().is_ok())
        })
    }

    /// Returns the tag of the populated variant.
    pub fn update_type(&self) -> UpdateType {
        self.kind.update_type()
    }

    /// Returns the raw kind-specific object.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Looks up a dot-separated path (`"reply_to_message.from.id"`) in the raw
    /// kind object. Numeric segments index into arrays.
    ///
    /// Returns `None` when the path is absent or resolves to `null`.
    pub fn raw_field(&self, path: &str) -> Option<&Value> {
        let mut current = &self.raw;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!current.is_null()).then_some(current)
    }

    /// Returns the message for message-like kinds, or the message a callback
    /// query is attached to.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => Some(m),
            UpdateKind::CallbackQuery(q) => q.message.as_deref(),
            _ => None,
        }
    }

    /// Returns the chat the update belongs to, if any.
    pub fn chat(&self) -> Option<&Chat> {
        match &self.kind {
            UpdateKind::MyChatMember(m) | UpdateKind::ChatMember(m) => Some(&m.chat),
            UpdateKind::ChatJoinRequest(r) => Some(&r.chat),
            UpdateKind::PollAnswer(a) => a.voter_chat.as_ref(),
            _ => self.message().map(|m| &m.chat),
        }
    }

    /// Returns the user who caused the update, if any.
    pub fn from(&self) -> Option<&User> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => m.from.as_ref(),
            UpdateKind::CallbackQuery(q) => Some(&q.from),
            UpdateKind::InlineQuery(q) => Some(&q.from),
            UpdateKind::ChosenInlineResult(r) => Some(&r.from),
            UpdateKind::ShippingQuery(q) => Some(&q.from),
            UpdateKind::PreCheckoutQuery(q) => Some(&q.from),
            UpdateKind::PollAnswer(a) => a.user.as_ref(),
            UpdateKind::MyChatMember(m) | UpdateKind::ChatMember(m) => Some(&m.from),
            UpdateKind::ChatJoinRequest(r) => Some(&r.from),
            UpdateKind::Poll(_) => None,
        }
    }

    /// Returns the text of a message-like update (text, or media caption).
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => m.text_or_caption(),
            _ => None,
        }
    }

    /// Returns the callback data of a callback query.
    pub fn callback_data(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::CallbackQuery(q) => q.data.as_deref(),
            _ => None,
        }
    }
}

impl Serialize for Update {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = Map::with_capacity(2);
        map.insert("update_id".to_string(), Value::from(self.update_id));
        map.insert(self.update_type().as_str().to_string(), self.raw.clone());
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Update {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = Map::<String, Value>::deserialize(deserializer)?;

        let update_id = map
            .remove("update_id")
            .ok_or_else(|| de::Error::missing_field("update_id"))?
            .as_i64()
            .ok_or_else(|| de::Error::custom("update_id must be an integer"))?;

        let mut found: Option<(UpdateType, Value)> = None;
        for (key, value) in map {
            // Unknown keys belong to update kinds newer than this model.
            let Ok(update_type) = key.parse::<UpdateType>() else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if let Some((first, _)) = &found {
                return Err(de::Error::custom(format!(
                    "update {update_id} carries more than one kind: '{first}' and '{update_type}'"
                )));
            }
            found = Some((update_type, value));
        }

        let (update_type, raw) = found.ok_or_else(|| {
            de::Error::custom(format!("update {update_id} carries no known kind"))
        })?;

        Update::from_parts(update_id, update_type, raw).map_err(de::Error::custom)
    }
}
