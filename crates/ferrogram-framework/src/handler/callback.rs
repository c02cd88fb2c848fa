//! Callback trait with Axum-style parameter injection.
//!
//! [`Callback`] is implemented for every async function or closure whose
//! parameters all implement [`FromContext`] (up to 16 of them) and whose
//! return type implements [`HandlerResponse`]:
//!
//! ```rust,ignore
//! async fn plain() {}
//!
//! async fn echo(msg: Message) -> Option<String> {
//!     msg.text
//! }
//!
//! async fn order(args: Binding<keys::Args>, fsm: FsmContext) -> Result<String, BoxError> {
//!     fsm.set("order:confirm").await?;
//!     Ok(format!("ordering {}", args.join(" ")))
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use super::response::HandlerResponse;
use crate::context::DispatchContext;
use crate::error::BoxError;
use crate::extractor::FromContext;

/// A handler callback taking extractor parameters `T`.
#[async_trait]
pub trait Callback<T>: Clone + Send + Sync + 'static {
    /// Extracts the parameters, runs the callback and applies the reply
    /// convention to its return value.
    async fn call(self, ctx: Arc<DispatchContext>) -> Result<Option<Value>, BoxError>;
}

/// A type-erased callback.
pub type BoxedCallback = Arc<
    dyn Fn(Arc<DispatchContext>) -> BoxFuture<'static, Result<Option<Value>, BoxError>>
        + Send
        + Sync,
>;

/// Erases the parameter types of a callback.
pub fn into_callback<F, T>(f: F) -> BoxedCallback
where
    F: Callback<T>,
    T: 'static,
{
    Arc::new(move |ctx| f.clone().call(ctx))
}

macro_rules! impl_callback {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case)]
        #[async_trait]
        impl<F, Fut, Res, $($ty,)*> Callback<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: HandlerResponse,
            $( $ty: FromContext + Send + 'static, )*
        {
            async fn call(self, ctx: Arc<DispatchContext>) -> Result<Option<Value>, BoxError> {
                $(
                    let $ty = $ty::from_context(&ctx).await?;
                )*

                let res = (self)($($ty,)*).await;
                res.into_outcome(&ctx).await
            }
        }
    };
}

impl_callback!();
impl_callback!(T1);
impl_callback!(T1, T2);
impl_callback!(T1, T2, T3);
impl_callback!(T1, T2, T3, T4);
impl_callback!(T1, T2, T3, T4, T5);
impl_callback!(T1, T2, T3, T4, T5, T6);
impl_callback!(T1, T2, T3, T4, T5, T6, T7);
impl_callback!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_callback!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_callback!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_callback!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_callback!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_callback!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_callback!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_callback!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_callback!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);
