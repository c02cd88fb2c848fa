use async_trait::async_trait;

use super::{MatchResult, Rule};
use crate::context::DispatchContext;
use crate::error::BoxError;

#[derive(Debug, Clone)]
enum Expect {
    /// No state stored.
    None,
    /// Any state stored.
    Any,
    /// One of these labels.
    OneOf(Vec<String>),
}

/// Matches on the conversation's current state label.
///
/// The state is the one the view loaded before rules ran. An empty label set
/// matches only conversations with no state at all.
#[derive(Debug, Clone)]
pub struct State {
    expect: Expect,
}

impl State {
    /// Matches one of the given labels; an empty set behaves like
    /// [`State::none`].
    pub fn new(states: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let states: Vec<String> = states.into_iter().map(Into::into).collect();
        Self {
            expect: if states.is_empty() {
                Expect::None
            } else {
                Expect::OneOf(states)
            },
        }
    }

    /// Matches conversations without state.
    pub fn none() -> Self {
        Self {
            expect: Expect::None,
        }
    }

    /// Matches conversations with any state.
    pub fn any() -> Self {
        Self {
            expect: Expect::Any,
        }
    }
}

#[async_trait]
impl Rule for State {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let current = ctx.state().map(|repr| repr.state.as_str());
        let matched = match (&self.expect, current) {
            (Expect::None, current) => current.is_none(),
            (Expect::Any, current) => current.is_some(),
            (Expect::OneOf(states), Some(current)) => states.iter().any(|s| s == current),
            (Expect::OneOf(_), None) => false,
        };
        Ok(matched.into())
    }

    fn describe(&self) -> String {
        format!("state({:?})", self.expect)
    }
}

/// Matches when the current state belongs to a group, i.e. its label starts
/// with `"<group>:"`.
#[derive(Debug, Clone)]
pub struct StateGroup {
    group: String,
}

impl StateGroup {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
        }
    }
}

#[async_trait]
impl Rule for StateGroup {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        Ok(ctx
            .state()
            .and_then(|repr| repr.group())
            .is_some_and(|group| group == self.group)
            .into())
    }

    fn describe(&self) -> String {
        format!("state_group({})", self.group)
    }
}
