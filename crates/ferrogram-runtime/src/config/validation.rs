//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, FerrogramConfig, LogFormat, LogOutput, LoggingConfig, PollingConfig};

/// Longest long-poll timeout the platform honours, in seconds.
pub const MAX_POLL_TIMEOUT_SECS: u64 = 50;

/// Largest batch the platform returns.
pub const MAX_POLL_LIMIT: u32 = 100;

/// Validates the entire configuration.
///
/// A missing token is accepted here; it is only required when the runtime
/// builds its own HTTP client.
pub fn validate_config(config: &FerrogramConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_polling_config(&config.polling)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if let Some(token) = &bot.token {
        if token.is_empty() {
            return Err(ConfigError::missing_field("bot.token"));
        }
        if token.chars().any(char::is_whitespace) {
            return Err(ConfigError::validation("Bot token cannot contain whitespace"));
        }
    }

    validate_url(&bot.api_url)?;

    if bot.request_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "Request timeout must be greater than 0",
        ));
    }

    if let Some(username) = &bot.username
        && username.trim_start_matches('@').is_empty()
    {
        return Err(ConfigError::validation("Bot username cannot be empty"));
    }

    Ok(())
}

fn validate_polling_config(polling: &PollingConfig) -> ConfigResult<()> {
    if polling.limit == 0 || polling.limit > MAX_POLL_LIMIT {
        return Err(ConfigError::validation(format!(
            "Polling limit must be between 1 and {MAX_POLL_LIMIT}, got {}",
            polling.limit
        )));
    }

    if polling.timeout_secs > MAX_POLL_TIMEOUT_SECS {
        return Err(ConfigError::validation(format!(
            "Polling timeout cannot exceed {MAX_POLL_TIMEOUT_SECS}s, got {}s",
            polling.timeout_secs
        )));
    }

    if polling.retry_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial retry delay must be greater than 0",
        ));
    }

    if polling.max_retry_delay_ms < polling.retry_delay_ms {
        return Err(ConfigError::validation(
            "Max retry delay must be greater than or equal to initial delay",
        ));
    }

    if polling
        .allowed_updates
        .as_ref()
        .is_some_and(|kinds| kinds.is_empty())
    {
        return Err(ConfigError::validation(
            "allowed_updates cannot be an empty list; omit it to use the router's kinds",
        ));
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.format == LogFormat::Json && !cfg!(feature = "json-log") {
        return Err(ConfigError::validation(
            "JSON log format requires the `json-log` feature",
        ));
    }

    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("bot.api_url"));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::invalid_url(
            url,
            "URL must start with http:// or https://",
        ));
    }

    Ok(())
}
