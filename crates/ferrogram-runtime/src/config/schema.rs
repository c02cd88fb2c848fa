//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use ferrogram_core::UpdateType;
use ferrogram_framework::ErrorMode;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FerrogramConfig {
    /// Bot credentials and API endpoint.
    #[serde(default)]
    pub bot: BotConfig,

    /// Long-poll settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Error reporting settings.
    #[serde(default)]
    pub errors: ErrorsConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot credentials and API endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot token issued by the platform.
    #[serde(default)]
    pub token: Option<String>,

    /// Base URL of the Bot API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// The bot's own username, used to check `/command@username` mentions.
    ///
    /// Resolved with `getMe` at startup when unset.
    #[serde(default)]
    pub username: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
            username: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BotConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

// =============================================================================
// Polling
// =============================================================================

/// Long-poll settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Server-side long-poll timeout in seconds.
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,

    /// Maximum updates per batch (1..=100).
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Update kinds to request. Defaults to the kinds the router's views
    /// handle.
    #[serde(default)]
    pub allowed_updates: Option<Vec<UpdateType>>,

    /// Dispatch each update on its own task instead of inline.
    #[serde(default = "default_true")]
    pub concurrent_dispatch: bool,

    /// First delay after a failed fetch, in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Upper bound for the doubling retry delay, in milliseconds.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout(),
            limit: default_limit(),
            allowed_updates: None,
            concurrent_dispatch: true,
            retry_delay_ms: default_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_limit() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_max_retry_delay() -> u64 {
    30_000
}

// =============================================================================
// Errors
// =============================================================================

/// Error reporting settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorsConfig {
    /// `swallow` (log and continue) or `raise` (stop the runtime).
    #[serde(default)]
    pub mode: ErrorMode,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level. `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required for `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Per-module levels, e.g. `ferrogram_runtime = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of the call site.
    #[serde(default)]
    pub file_location: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FerrogramConfig::default();
        assert_eq!(config.bot.api_url, "https://api.telegram.org");
        assert_eq!(config.polling.timeout_secs, 30);
        assert_eq!(config.polling.limit, 100);
        assert!(config.polling.concurrent_dispatch);
        assert_eq!(config.errors.mode, ErrorMode::Swallow);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: FerrogramConfig = serde_json::from_value(serde_json::json!({
            "bot": { "token": "1:abc" },
            "polling": { "allowed_updates": ["message", "callback_query"] },
            "errors": { "mode": "raise" },
        }))
        .unwrap();

        assert_eq!(config.bot.token.as_deref(), Some("1:abc"));
        assert_eq!(
            config.polling.allowed_updates,
            Some(vec![UpdateType::Message, UpdateType::CallbackQuery])
        );
        assert_eq!(config.polling.limit, 100);
        assert_eq!(config.errors.mode, ErrorMode::Raise);
    }

    #[test]
    fn test_debug_redacts_token() {
        let bot = BotConfig {
            token: Some("1:SECRET".into()),
            ..Default::default()
        };
        assert!(!format!("{bot:?}").contains("SECRET"));
    }
}
