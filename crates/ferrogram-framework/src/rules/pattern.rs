use async_trait::async_trait;

use ferrogram_core::Context;

use super::{MatchResult, Rule, subject_text};
use crate::context::DispatchContext;
use crate::error::{BoxError, RuleError};

/// Matches text against a regular expression (searching, not anchored).
///
/// Named groups are bound under their names, unnamed groups as `group_<n>`,
/// and the whole match as `match`. Groups that did not participate are not
/// bound.
#[derive(Debug, Clone)]
pub struct Regex {
    regex: regex::Regex,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Self, RuleError> {
        let regex = regex::Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    pub fn from_regex(regex: regex::Regex) -> Self {
        Self { regex }
    }
}

#[async_trait]
impl Rule for Regex {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let Some(text) = subject_text(ctx.update()) else {
            return Ok(MatchResult::False);
        };
        let Some(captures) = self.regex.captures(text) else {
            return Ok(MatchResult::False);
        };

        let mut bindings = Context::new();
        for (index, name) in self.regex.capture_names().enumerate() {
            let Some(group) = captures.get(index) else {
                continue;
            };
            let key = match (index, name) {
                (0, _) => "match".to_string(),
                (_, Some(name)) => name.to_string(),
                (n, None) => format!("group_{n}"),
            };
            bindings.insert(key, group.as_str());
        }
        Ok(MatchResult::Bindings(bindings))
    }

    fn describe(&self) -> String {
        format!("regex({})", self.regex.as_str())
    }
}
