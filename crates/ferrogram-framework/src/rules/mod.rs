//! Rule engine.
//!
//! A [`Rule`] is a predicate over one update that may also extract values.
//! Checking a rule yields a [`MatchResult`]:
//!
//! - [`MatchResult::False`]: the update does not match
//! - [`MatchResult::True`]: it matches, nothing extracted
//! - [`MatchResult::Bindings`]: it matches, and these values should be merged
//!   into the dispatch bindings
//!
//! Rules compose with [`And`], [`Or`] and [`Not`], either directly, through
//! [`RuleExt`], or with the `&`, `|` and `!` operators on [`Rules`]:
//!
//! ```rust,ignore
//! use ferrogram_framework::rules::*;
//!
//! let rule = Rules::new(Command::new(["start"])) | Rules::new(Text::new(["hi"]).ignore_case());
//! let private_only = Command::new(["admin"]).and(ChatTypeIs::new([ChatType::Private]));
//! ```
//!
//! Rules never catch errors; a failing check propagates to the view, which
//! reports it and stops processing the update.

mod command;
mod fuzzy;
mod membership;
mod pattern;
mod state;
mod text;

use std::fmt;
use std::ops;
use std::sync::Arc;

use async_trait::async_trait;

use ferrogram_core::{Context, Update};

use crate::context::DispatchContext;
use crate::error::BoxError;

pub use command::Command;
pub use fuzzy::{Fuzzy, similarity};
pub use membership::{CallbackData, ChatTypeIs, FromUser, HasField, InChat};
pub use pattern::Regex;
pub use state::{State, StateGroup};
pub use text::{Contains, StartsWith, Text};

/// Outcome of checking a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    False,
    True,
    Bindings(Context),
}

impl MatchResult {
    /// A match carrying `bindings`; an empty map collapses to [`MatchResult::True`].
    pub fn bindings(bindings: Context) -> Self {
        if bindings.is_empty() {
            Self::True
        } else {
            Self::Bindings(bindings)
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, Self::False)
    }

    /// Returns the extracted bindings of a match, `None` for a non-match.
    pub fn into_bindings(self) -> Option<Context> {
        match self {
            Self::False => None,
            Self::True => Some(Context::new()),
            Self::Bindings(bindings) => Some(bindings),
        }
    }
}

impl From<bool> for MatchResult {
    fn from(matched: bool) -> Self {
        if matched { Self::True } else { Self::False }
    }
}

impl From<Context> for MatchResult {
    fn from(bindings: Context) -> Self {
        Self::bindings(bindings)
    }
}

impl From<Option<Context>> for MatchResult {
    fn from(bindings: Option<Context>) -> Self {
        bindings.map_or(Self::False, Self::bindings)
    }
}

/// A predicate over an update.
#[async_trait]
pub trait Rule: Send + Sync + 'static {
    /// Checks the update carried by `ctx`.
    ///
    /// Implementations must not write into the bindings themselves; the
    /// caller merges the returned bindings once the whole rule list passed.
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError>;

    /// Short human-readable description, used in logs.
    fn describe(&self) -> String {
        let name = std::any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name).to_string()
    }
}

/// A type-erased, shareable rule.
pub type BoxedRule = Arc<dyn Rule>;

#[async_trait]
impl Rule for BoxedRule {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        (**self).check(ctx).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// ============================================================================
// Combinators
// ============================================================================

/// Conjunction. Short-circuits on the first non-match; bindings of all
/// children are merged, later children overwriting earlier keys.
#[derive(Clone, Default)]
pub struct And {
    rules: Vec<BoxedRule>,
}

impl And {
    pub fn new(rules: impl IntoIterator<Item = BoxedRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Appends another child rule.
    pub fn push(&mut self, rule: impl Rule) {
        self.rules.push(Arc::new(rule));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[async_trait]
impl Rule for And {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let mut merged = Context::new();
        for rule in &self.rules {
            match rule.check(ctx).await? {
                MatchResult::False => return Ok(MatchResult::False),
                MatchResult::True => {}
                MatchResult::Bindings(bindings) => merged.merge(bindings),
            }
        }
        Ok(MatchResult::bindings(merged))
    }

    fn describe(&self) -> String {
        describe_all(&self.rules, " & ")
    }
}

/// Disjunction. Returns the first non-`False` child result unchanged.
#[derive(Clone, Default)]
pub struct Or {
    rules: Vec<BoxedRule>,
}

impl Or {
    pub fn new(rules: impl IntoIterator<Item = BoxedRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn push(&mut self, rule: impl Rule) {
        self.rules.push(Arc::new(rule));
    }
}

#[async_trait]
impl Rule for Or {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        for rule in &self.rules {
            let result = rule.check(ctx).await?;
            if result.is_match() {
                return Ok(result);
            }
        }
        Ok(MatchResult::False)
    }

    fn describe(&self) -> String {
        describe_all(&self.rules, " | ")
    }
}

/// Negation. Bindings of the inner rule are discarded.
#[derive(Clone)]
pub struct Not {
    rule: BoxedRule,
}

impl Not {
    pub fn new(rule: impl Rule) -> Self {
        Self {
            rule: Arc::new(rule),
        }
    }
}

#[async_trait]
impl Rule for Not {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let inner = self.rule.check(ctx).await?;
        Ok((!inner.is_match()).into())
    }

    fn describe(&self) -> String {
        format!("!{}", self.rule.describe())
    }
}

fn describe_all(rules: &[BoxedRule], separator: &str) -> String {
    let parts: Vec<String> = rules.iter().map(|r| r.describe()).collect();
    format!("({})", parts.join(separator))
}

/// Combinator methods available on every rule.
pub trait RuleExt: Rule + Sized {
    fn and(self, other: impl Rule) -> And {
        And::new([self.boxed(), Arc::new(other) as BoxedRule])
    }

    fn or(self, other: impl Rule) -> Or {
        Or::new([self.boxed(), Arc::new(other) as BoxedRule])
    }

    fn negate(self) -> Not {
        Not::new(self)
    }

    fn boxed(self) -> BoxedRule {
        Arc::new(self)
    }
}

impl<R: Rule> RuleExt for R {}

// ============================================================================
// Operator sugar
// ============================================================================

/// A boxed rule supporting `&`, `|` and `!`.
#[derive(Clone)]
pub struct Rules(BoxedRule);

impl Rules {
    pub fn new(rule: impl Rule) -> Self {
        Self(Arc::new(rule))
    }

    pub fn into_inner(self) -> BoxedRule {
        self.0
    }
}

#[async_trait]
impl Rule for Rules {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        self.0.check(ctx).await
    }

    fn describe(&self) -> String {
        self.0.describe()
    }
}

impl ops::BitAnd for Rules {
    type Output = Rules;

    fn bitand(self, rhs: Rules) -> Rules {
        Rules::new(And::new([self.0, rhs.0]))
    }
}

impl ops::BitOr for Rules {
    type Output = Rules;

    fn bitor(self, rhs: Rules) -> Rules {
        Rules::new(Or::new([self.0, rhs.0]))
    }
}

impl ops::Not for Rules {
    type Output = Rules;

    fn not(self) -> Rules {
        Rules(Arc::new(Not { rule: self.0 }))
    }
}

impl fmt::Debug for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rules").field(&self.0.describe()).finish()
    }
}

// ============================================================================
// Closure rule
// ============================================================================

/// A rule backed by a synchronous closure.
///
/// The closure may return a `bool`, a [`Context`] or a [`MatchResult`].
pub struct FnRule<F> {
    f: F,
    name: &'static str,
}

impl<F> FnRule<F> {
    pub fn new(f: F) -> Self {
        Self { f, name: "fn" }
    }

    /// Names the rule in logs.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl<F, R> Rule for FnRule<F>
where
    F: Fn(&DispatchContext) -> R + Send + Sync + 'static,
    R: Into<MatchResult>,
{
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        Ok((self.f)(ctx).into())
    }

    fn describe(&self) -> String {
        self.name.to_string()
    }
}

/// The text a text-oriented rule looks at: message text or caption, callback
/// data, or an inline query string.
pub(crate) fn subject_text(update: &Update) -> Option<&str> {
    use ferrogram_core::UpdateKind;

    match &update.kind {
        UpdateKind::CallbackQuery(q) => q.data.as_deref(),
        UpdateKind::InlineQuery(q) => Some(&q.query),
        _ => update.text(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::testing::{message_ctx, noop_ctx};

    struct Spy {
        result: MatchResult,
        calls: Arc<AtomicUsize>,
    }

    impl Spy {
        fn new(result: MatchResult) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    result,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl Rule for Spy {
        async fn check(&self, _ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    fn bind(key: &str, value: i64) -> MatchResult {
        MatchResult::Bindings(Context::new().with(key, value))
    }

    #[tokio::test]
    async fn test_and_short_circuits_on_false() {
        let ctx = noop_ctx();
        let (first, first_calls) = Spy::new(MatchResult::True);
        let (second, _) = Spy::new(MatchResult::False);
        let (third, third_calls) = Spy::new(MatchResult::True);

        let rule = And::new([first.boxed(), second.boxed(), third.boxed()]);
        assert_eq!(rule.check(&ctx).await.unwrap(), MatchResult::False);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_and_merges_bindings_last_writer_wins() {
        let ctx = noop_ctx();
        let (a, _) = Spy::new(bind("x", 1));
        let (b, _) = Spy::new(MatchResult::True);
        let (c, _) = Spy::new(MatchResult::Bindings(
            Context::new().with("x", 2i64).with("y", 3i64),
        ));

        let result = And::new([a.boxed(), b.boxed(), c.boxed()])
            .check(&ctx)
            .await
            .unwrap();
        let bindings = result.into_bindings().unwrap();
        assert_eq!(bindings.get_int("x"), Some(2));
        assert_eq!(bindings.get_int("y"), Some(3));
    }

    #[tokio::test]
    async fn test_and_without_bindings_is_true() {
        let ctx = noop_ctx();
        let (a, _) = Spy::new(MatchResult::True);
        assert_eq!(And::new([a.boxed()]).check(&ctx).await.unwrap(), MatchResult::True);
        assert_eq!(And::default().check(&ctx).await.unwrap(), MatchResult::True);
    }

    #[tokio::test]
    async fn test_or_returns_first_match_verbatim() {
        let ctx = noop_ctx();
        let (a, _) = Spy::new(MatchResult::False);
        let (b, _) = Spy::new(bind("b", 1));
        let (c, c_calls) = Spy::new(bind("c", 2));

        let result = Or::new([a.boxed(), b.boxed(), c.boxed()])
            .check(&ctx)
            .await
            .unwrap();
        assert_eq!(result, bind("b", 1));
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_or_all_false() {
        let ctx = noop_ctx();
        let (a, a_calls) = Spy::new(MatchResult::False);
        let (b, b_calls) = Spy::new(MatchResult::False);
        let result = a.or(b).check(&ctx).await.unwrap();
        assert_eq!(result, MatchResult::False);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_discards_bindings() {
        let ctx = noop_ctx();
        let (matched, _) = Spy::new(bind("x", 1));
        assert_eq!(matched.negate().check(&ctx).await.unwrap(), MatchResult::False);

        let (unmatched, _) = Spy::new(MatchResult::False);
        assert_eq!(
            unmatched.negate().check(&ctx).await.unwrap(),
            MatchResult::True
        );

        let (plain, _) = Spy::new(MatchResult::True);
        assert_eq!(plain.negate().check(&ctx).await.unwrap(), MatchResult::False);
    }

    #[tokio::test]
    async fn test_operator_sugar() {
        let ctx = message_ctx("hello");
        let rule = Rules::new(Text::new(["bye"])) | Rules::new(Text::new(["hello"]));
        assert!(rule.check(&ctx).await.unwrap().is_match());

        let rule = !Rules::new(Text::new(["hello"]));
        assert!(!rule.check(&ctx).await.unwrap().is_match());

        let rule = Rules::new(Text::new(["hello"])) & Rules::new(StartsWith::new(["he"]));
        assert!(rule.check(&ctx).await.unwrap().is_match());
    }

    #[tokio::test]
    async fn test_fn_rule() {
        let ctx = message_ctx("ping");
        let rule = FnRule::new(|ctx: &DispatchContext| ctx.update().text() == Some("ping"));
        assert_eq!(rule.check(&ctx).await.unwrap(), MatchResult::True);

        let rule = FnRule::new(|_: &DispatchContext| Context::new().with("k", "v")).named("bind");
        assert_eq!(rule.describe(), "bind");
        assert!(matches!(
            rule.check(&ctx).await.unwrap(),
            MatchResult::Bindings(_)
        ));
    }

    #[test]
    fn test_match_result_normalization() {
        assert_eq!(MatchResult::bindings(Context::new()), MatchResult::True);
        assert_eq!(MatchResult::from(None::<Context>), MatchResult::False);
        assert_eq!(MatchResult::True.into_bindings(), Some(Context::new()));
    }
}
