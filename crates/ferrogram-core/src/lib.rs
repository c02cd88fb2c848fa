//! # Ferrogram Core
//!
//! The shared vocabulary of the ferrogram bot framework.
//!
//! This crate defines what flows through the system, not what is done with
//! it:
//!
//! - **Update model**: the inbound event envelope ([`Update`], [`UpdateKind`],
//!   [`UpdateType`]) plus the minimal entity shapes needed for routing
//!   ([`Message`], [`Chat`], [`User`], [`CallbackQuery`], ...)
//! - **Bindings**: the typed [`Context`] map filled by rules and middleware
//! - **Transport contract**: [`ApiClient`], the single door to the remote
//!   platform, and [`ApiClientExt`] for the typed calls the framework needs
//! - **Errors**: [`ApiError`] with fatal-versus-recoverable classification
//!
//! ```text
//! ┌──────────────┐  bytes  ┌──────────────┐  Update  ┌────────────┐
//! │  ApiClient   │────────▶│   PollLoop   │─────────▶│   Router   │
//! │ (transport)  │◀────────│  (runtime)   │          │ (framework)│
//! └──────────────┘ request └──────────────┘          └────────────┘
//! ```

pub mod client;
pub mod context;
pub mod error;
pub mod update;

pub use client::{ApiClient, ApiClientExt, BoxedClient, GetUpdates, decode_response};
pub use context::{Context, ContextValue, ValueTypeError};
pub use error::{ApiError, ApiResult, TransportError, TransportResult};
pub use update::{
    CallbackQuery, Chat, ChatJoinRequest, ChatMemberUpdated, ChatType, ChosenInlineResult,
    InlineQuery, Message, PollAnswer, PreCheckoutQuery, ShippingQuery, Update, UpdateKind,
    UpdateType, User,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::client::{ApiClient, ApiClientExt, BoxedClient};
    pub use super::context::{Context, ContextValue};
    pub use super::error::{ApiError, ApiResult};
    pub use super::update::{Chat, ChatType, Message, Update, UpdateKind, UpdateType, User};
}
