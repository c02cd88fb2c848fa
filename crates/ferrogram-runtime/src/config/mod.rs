//! Configuration for the ferrogram runtime.
//!
//! Settings are layered with `figment` (defaults, files, `FERROGRAM_*`
//! environment variables, programmatic overrides) and checked by
//! [`validate_config`] before the runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, ErrorsConfig, FerrogramConfig, LogFormat, LogLevel, LogOutput, LoggingConfig,
    PollingConfig, SpanEventConfig,
};
pub use validation::validate_config;
