use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use async_trait::async_trait;

use ferrogram_core::{Context, ContextValue, ValueTypeError};

use super::FromContext;
use crate::context::DispatchContext;
use crate::error::{ExtractError, ExtractResult};

/// Snapshot of all bindings produced so far.
#[derive(Debug, Clone, Default)]
pub struct Bindings(pub Context);

impl Deref for Bindings {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.0
    }
}

#[async_trait]
impl FromContext for Bindings {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        Ok(Bindings(ctx.bindings()))
    }
}

/// Declares a typed binding: the key it is stored under and the type it
/// converts to.
///
/// Usually declared with [`declare_binding!`](crate::declare_binding).
pub trait BindingKey: Send + 'static {
    const KEY: &'static str;
    type Value: TryFrom<ContextValue, Error = ValueTypeError> + Send;
}

/// A single typed binding, selected by its [`BindingKey`].
///
/// Fails with [`ExtractError::MissingBinding`] when no rule or middleware
/// produced the key.
pub struct Binding<K: BindingKey> {
    value: K::Value,
    _key: PhantomData<fn() -> K>,
}

impl<K: BindingKey> Binding<K> {
    pub fn into_inner(self) -> K::Value {
        self.value
    }
}

impl<K: BindingKey> Deref for Binding<K> {
    type Target = K::Value;

    fn deref(&self) -> &K::Value {
        &self.value
    }
}

impl<K: BindingKey> fmt::Debug for Binding<K>
where
    K::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Binding")
            .field(&K::KEY)
            .field(&self.value)
            .finish()
    }
}

#[async_trait]
impl<K: BindingKey> FromContext for Binding<K> {
    async fn from_context(ctx: &DispatchContext) -> ExtractResult<Self> {
        let raw = ctx
            .binding(K::KEY)
            .ok_or(ExtractError::MissingBinding(K::KEY))?;
        let value = K::Value::try_from(raw).map_err(|source| ExtractError::BindingType {
            key: K::KEY,
            source,
        })?;
        Ok(Self {
            value,
            _key: PhantomData,
        })
    }
}

/// Declares a [`BindingKey`] marker type.
///
/// ```rust,ignore
/// declare_binding!(pub OrderId: i64 = "order_id");
///
/// async fn show(order: Binding<OrderId>) -> String {
///     format!("order #{}", *order)
/// }
/// ```
#[macro_export]
macro_rules! declare_binding {
    ($(#[$meta:meta])* $vis:vis $name:ident : $ty:ty = $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $name;

        impl $crate::extractor::BindingKey for $name {
            const KEY: &'static str = $key;
            type Value = $ty;
        }
    };
}

/// Keys bound by the built-in rules.
pub mod keys {
    crate::declare_binding!(
        /// Command name, from [`Command`](crate::rules::Command).
        pub Command: String = "command"
    );
    crate::declare_binding!(
        /// Command arguments, from [`Command`](crate::rules::Command).
        pub Args: Vec<String> = "args"
    );
    crate::declare_binding!(
        /// Raw argument text, from [`Command`](crate::rules::Command).
        pub ArgsText: String = "args_text"
    );
    crate::declare_binding!(
        /// Whole regex match, from [`Regex`](crate::rules::Regex).
        pub Match: String = "match"
    );
    crate::declare_binding!(
        /// Callback data, from [`CallbackData`](crate::rules::CallbackData).
        pub CallbackData: String = "callback_data"
    );
    crate::declare_binding!(
        /// Best fuzzy candidate, from [`Fuzzy`](crate::rules::Fuzzy).
        pub FuzzyMatch: String = "fuzzy_match"
    );
    crate::declare_binding!(
        /// Best fuzzy score, from [`Fuzzy`](crate::rules::Fuzzy).
        pub FuzzyRatio: f64 = "fuzzy_ratio"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::noop_ctx;

    crate::declare_binding!(Count: i64 = "count");

    #[tokio::test]
    async fn test_typed_binding() {
        let ctx = noop_ctx();
        ctx.bind("count", 3i64);
        ctx.bind("args", vec!["a", "b"]);

        let count = Binding::<Count>::from_context(&ctx).await.unwrap();
        assert_eq!(*count, 3);

        let args = Binding::<keys::Args>::from_context(&ctx).await.unwrap();
        assert_eq!(args.into_inner(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_and_mistyped_binding() {
        let ctx = noop_ctx();
        let err = Binding::<keys::Command>::from_context(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::MissingBinding("command")));

        ctx.bind("count", "three");
        let err = Binding::<Count>::from_context(&ctx).await.unwrap_err();
        assert!(matches!(err, ExtractError::BindingType { key: "count", .. }));

        assert!(
            Option::<Binding<keys::Command>>::from_context(&ctx)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_bindings_snapshot() {
        let ctx = noop_ctx();
        ctx.bind("a", true);
        let snapshot = Bindings::from_context(&ctx).await.unwrap();
        ctx.bind("b", false);
        assert!(snapshot.contains_key("a"));
        assert!(!snapshot.contains_key("b"));
    }
}
