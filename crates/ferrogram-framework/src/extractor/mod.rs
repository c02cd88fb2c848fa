//! Extractor system.
//!
//! Handler callbacks declare what they need as parameters; each parameter
//! type implements [`FromContext`] and is pulled out of the
//! [`DispatchContext`] right before the callback runs:
//!
//! ```rust,ignore
//! async fn ban(msg: Message, args: Binding<keys::Args>, client: BoxedClient) -> String {
//!     format!("banning {}", args.join(", "))
//! }
//! ```
//!
//! A failing extractor aborts the handler with an [`ExtractError`](crate::error::ExtractError); wrap the
//! parameter in [`Option`] to make it optional.

mod binding;
mod fsm;
mod update;

use async_trait::async_trait;

use ferrogram_core::BoxedClient;

use crate::context::DispatchContext;
use crate::error::ExtractResult;

pub use binding::{Binding, BindingKey, Bindings, keys};
pub use fsm::FsmContext;

/// Types that can be extracted from a [`DispatchContext`].
#[async_trait]
pub trait FromContext: Sized + Send {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self>;
}

/// Optional parameters never fail; a failed extraction becomes `None`.
#[async_trait]
impl<T: FromContext> FromContext for Option<T> {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        Ok(T::from_context(ctx).await.ok())
    }
}

/// The API client, for handlers that call the platform themselves.
#[async_trait]
impl FromContext for BoxedClient {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        Ok(ctx.client().clone())
    }
}
