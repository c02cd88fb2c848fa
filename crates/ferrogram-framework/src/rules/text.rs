use async_trait::async_trait;

use super::{MatchResult, Rule, subject_text};
use crate::context::DispatchContext;
use crate::error::BoxError;

fn normalize(texts: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    texts.into_iter().map(Into::into).collect()
}

fn fold(s: &str, ignore_case: bool) -> String {
    if ignore_case {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}

/// Matches when the text equals one of the given strings.
#[derive(Debug, Clone)]
pub struct Text {
    texts: Vec<String>,
    ignore_case: bool,
}

impl Text {
    pub fn new(texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            texts: normalize(texts),
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

#[async_trait]
impl Rule for Text {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let Some(text) = subject_text(ctx.update()) else {
            return Ok(MatchResult::False);
        };
        let text = fold(text, self.ignore_case);
        Ok(self
            .texts
            .iter()
            .any(|t| fold(t, self.ignore_case) == text)
            .into())
    }

    fn describe(&self) -> String {
        format!("text{:?}", self.texts)
    }
}

/// Matches when the text starts with one of the given prefixes.
#[derive(Debug, Clone)]
pub struct StartsWith {
    prefixes: Vec<String>,
    ignore_case: bool,
}

impl StartsWith {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prefixes: normalize(prefixes),
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

#[async_trait]
impl Rule for StartsWith {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let Some(text) = subject_text(ctx.update()) else {
            return Ok(MatchResult::False);
        };
        let text = fold(text, self.ignore_case);
        Ok(self
            .prefixes
            .iter()
            .any(|p| text.starts_with(&fold(p, self.ignore_case)))
            .into())
    }

    fn describe(&self) -> String {
        format!("starts_with{:?}", self.prefixes)
    }
}

/// Matches when the text contains one of the given substrings.
#[derive(Debug, Clone)]
pub struct Contains {
    needles: Vec<String>,
    ignore_case: bool,
}

impl Contains {
    pub fn new(needles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            needles: normalize(needles),
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }
}

#[async_trait]
impl Rule for Contains {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let Some(text) = subject_text(ctx.update()) else {
            return Ok(MatchResult::False);
        };
        let text = fold(text, self.ignore_case);
        Ok(self
            .needles
            .iter()
            .any(|n| text.contains(&fold(n, self.ignore_case)))
            .into())
    }

    fn describe(&self) -> String {
        format!("contains{:?}", self.needles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{callback_ctx, message_ctx};

    #[tokio::test]
    async fn test_text_ignore_case() {
        let rule = Text::new(["hi", "hello"]).ignore_case();
        for text in ["HELLO", "Hi"] {
            assert!(rule.check(&message_ctx(text)).await.unwrap().is_match());
        }
        assert!(!rule.check(&message_ctx("hey")).await.unwrap().is_match());
    }

    #[tokio::test]
    async fn test_text_is_case_sensitive_by_default() {
        let rule = Text::new(["hello"]);
        assert!(rule.check(&message_ctx("hello")).await.unwrap().is_match());
        assert!(!rule.check(&message_ctx("Hello")).await.unwrap().is_match());
    }

    #[tokio::test]
    async fn test_text_sees_callback_data() {
        let rule = Text::new(["yes"]);
        assert!(rule.check(&callback_ctx("yes")).await.unwrap().is_match());
    }

    #[tokio::test]
    async fn test_starts_with_and_contains() {
        let ctx = message_ctx("Order #42 shipped");
        assert!(
            StartsWith::new(["order"])
                .ignore_case()
                .check(&ctx)
                .await
                .unwrap()
                .is_match()
        );
        assert!(
            !StartsWith::new(["order"])
                .check(&ctx)
                .await
                .unwrap()
                .is_match()
        );
        assert!(Contains::new(["#42"]).check(&ctx).await.unwrap().is_match());
        assert!(!Contains::new(["#43"]).check(&ctx).await.unwrap().is_match());
    }
}
