use async_trait::async_trait;

use ferrogram_core::Context;

use super::{MatchResult, Rule};
use crate::context::DispatchContext;
use crate::error::BoxError;

/// Matches bot commands such as `/start`, `/start@my_bot` or `/ban 42 spam`.
///
/// On a match the following bindings are produced:
///
/// | key         | value                                   |
/// |-------------|-----------------------------------------|
/// | `command`   | the configured command name that matched |
/// | `args`      | whitespace-separated arguments (list)   |
/// | `args_text` | everything after the command, trimmed  |
///
/// A `@mention` suffix must name the bot itself (case-insensitive). When the
/// bot's username is unknown, mentioned commands are rejected unless
/// [`ignore_mention`](Self::ignore_mention) is set.
#[derive(Debug, Clone)]
pub struct Command {
    commands: Vec<String>,
    prefixes: Vec<String>,
    ignore_case: bool,
    ignore_mention: bool,
}

impl Command {
    pub fn new(commands: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            prefixes: vec!["/".to_string()],
            ignore_case: false,
            ignore_mention: false,
        }
    }

    /// Replaces the accepted command prefixes (default `/`).
    pub fn prefixes(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Accepts `@mention` suffixes regardless of which bot they name.
    pub fn ignore_mention(mut self) -> Self {
        self.ignore_mention = true;
        self
    }

    fn mention_ok(&self, mention: Option<&str>, bot_username: Option<&str>) -> bool {
        match mention {
            None => true,
            Some(_) if self.ignore_mention => true,
            Some(mention) => {
                bot_username.is_some_and(|own| own.eq_ignore_ascii_case(mention))
            }
        }
    }

    /// Returns the configured spelling of `name`, if it is one of ours.
    fn resolve(&self, name: &str) -> Option<&str> {
        self.commands
            .iter()
            .find(|c| {
                if self.ignore_case {
                    c.eq_ignore_ascii_case(name)
                } else {
                    *c == name
                }
            })
            .map(String::as_str)
    }
}

#[async_trait]
impl Rule for Command {
    async fn check(&self, ctx: &DispatchContext) -> Result<MatchResult, BoxError> {
        let Some(text) = ctx.update().text() else {
            return Ok(MatchResult::False);
        };

        let Some(rest) = self
            .prefixes
            .iter()
            .find_map(|prefix| text.strip_prefix(prefix.as_str()))
        else {
            return Ok(MatchResult::False);
        };

        let (head, args_text) = match rest.split_once(char::is_whitespace) {
            Some((head, tail)) => (head, tail.trim()),
            None => (rest, ""),
        };
        let (name, mention) = match head.split_once('@') {
            Some((name, mention)) => (name, Some(mention)),
            None => (head, None),
        };

        let Some(command) = self.resolve(name).filter(|_| !name.is_empty()) else {
            return Ok(MatchResult::False);
        };
        if !self.mention_ok(mention, ctx.bot_username()) {
            return Ok(MatchResult::False);
        }

        let args: Vec<&str> = args_text.split_whitespace().collect();
        Ok(MatchResult::Bindings(
            Context::new()
                .with("command", command)
                .with("args", args)
                .with("args_text", args_text),
        ))
    }

    fn describe(&self) -> String {
        format!("command{:?}", self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ctx_with_username, group_message, message_ctx};

    #[tokio::test]
    async fn test_plain_command() {
        let rule = Command::new(["start"]);
        let result = rule.check(&message_ctx("/start")).await.unwrap();
        let bindings = result.into_bindings().unwrap();
        assert_eq!(bindings.get_str("command"), Some("start"));
        assert_eq!(bindings.get_str("args_text"), Some(""));

        assert!(!rule.check(&message_ctx("/stop")).await.unwrap().is_match());
        assert!(!rule.check(&message_ctx("start")).await.unwrap().is_match());
        assert!(!rule.check(&message_ctx("/starting")).await.unwrap().is_match());
    }

    #[tokio::test]
    async fn test_mention_must_name_this_bot() {
        let rule = Command::new(["start"]);
        let own = ctx_with_username(group_message("/start@MyBot"), "mybot");
        assert!(rule.check(&own).await.unwrap().is_match());

        let other = ctx_with_username(group_message("/start@otherbot"), "mybot");
        assert!(!rule.check(&other).await.unwrap().is_match());
    }

    #[tokio::test]
    async fn test_mention_with_unknown_username() {
        let ctx = message_ctx("/start@somebot");
        assert!(
            !Command::new(["start"])
                .check(&ctx)
                .await
                .unwrap()
                .is_match()
        );
        assert!(
            Command::new(["start"])
                .ignore_mention()
                .check(&ctx)
                .await
                .unwrap()
                .is_match()
        );
    }

    #[tokio::test]
    async fn test_arguments_are_bound() {
        let rule = Command::new(["ban"]);
        let bindings = rule
            .check(&message_ctx("/ban  42   spam links"))
            .await
            .unwrap()
            .into_bindings()
            .unwrap();
        let args: Vec<String> = bindings.get("args").cloned().unwrap().try_into().unwrap();
        assert_eq!(args, vec!["42", "spam", "links"]);
        assert_eq!(bindings.get_str("args_text"), Some("42   spam links"));
    }

    #[tokio::test]
    async fn test_custom_prefix_and_case() {
        let rule = Command::new(["help"]).prefixes(["!", "/"]).ignore_case();
        let bindings = rule
            .check(&message_ctx("!HELP"))
            .await
            .unwrap()
            .into_bindings()
            .unwrap();
        assert_eq!(bindings.get_str("command"), Some("help"));
        assert!(rule.check(&message_ctx("/help me")).await.unwrap().is_match());
        assert!(!rule.check(&message_ctx("?help")).await.unwrap().is_match());
    }
}
