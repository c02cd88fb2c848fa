//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `ferrogram.toml`, `config.toml`
//! - `yaml-config`: `ferrogram.yaml`, `ferrogram.yml`, `config.yaml`, `config.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic base ([`ConfigLoader::merge`])
//! 3. Profile-specific config file (`ferrogram.{profile}.toml`)
//! 4. Main config file (`ferrogram.toml`)
//! 5. Environment variables (`FERROGRAM_*`)
//!
//! # Environment Variable Mapping
//!
//! Variables use the `FERROGRAM_` prefix with `__` as the nesting separator:
//!
//! - `FERROGRAM_BOT__TOKEN=123:ABC` → `bot.token = "123:ABC"`
//! - `FERROGRAM_POLLING__TIMEOUT_SECS=50` → `polling.timeout_secs = 50`
//! - `FERROGRAM_ERRORS__MODE=raise` → `errors.mode = "raise"`
//!
//! # Example
//!
//! ```rust,ignore
//! use ferrogram_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/ferrogram.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::FerrogramConfig;

const ENV_PREFIX: &str = "FERROGRAM_";
const PROFILE_VAR: &str = "FERROGRAM_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting `dev` / `prod` shorthands.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            _ => Self::Custom(name.to_string()),
        }
    }

    /// Reads `FERROGRAM_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that searches the current and user config
    /// directories and reads `FERROGRAM_*` variables.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds the user config directory (`~/.config/ferrogram`) to search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("ferrogram")),
            None => self,
        }
    }

    /// Loads this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a programmatic base configuration. Files and environment
    /// variables still override it.
    pub fn merge(mut self, config: FerrogramConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<FerrogramConfig> {
        let profile = self.profile.clone();
        let config: FerrogramConfig = self.build_figment()?.extract()?;

        debug!(
            %profile,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment =
            Figment::from(Serialized::defaults(FerrogramConfig::default())).merge(self.figment.clone());

        figment = match &self.config_file {
            Some(path) => Self::merge_explicit(figment, path)?,
            None => self.merge_discovered(figment),
        };

        if self.load_env {
            trace!("Loading environment variables with {ENV_PREFIX} prefix");
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["PROFILE"])
                    .split("__"),
            );
        }

        Ok(figment)
    }

    fn merge_explicit(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let Some(format) = FileFormat::from_path(path) else {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default()
                    .to_string(),
            });
        };
        info!(path = %path.display(), "Loading configuration file");
        Ok(format.merge(figment, path))
    }

    /// The first candidate with a base or profile file wins; the profile
    /// file is layered beneath the base file.
    fn merge_discovered(&self, mut figment: Figment) -> Figment {
        let Some(file) = self
            .candidates()
            .into_iter()
            .find(|file| file.base.exists() || file.profile.exists())
        else {
            warn!("No configuration file found, using defaults");
            return figment;
        };

        if file.profile.exists() {
            debug!(path = %file.profile.display(), profile = %self.profile, "Loading profile configuration");
            figment = file.format.merge(figment, &file.profile);
        }
        if file.base.exists() {
            info!(path = %file.base.display(), "Loading configuration file");
            figment = file.format.merge(figment, &file.base);
        }
        figment
    }

    /// `search path × format × stem × extension`, in that priority order.
    fn candidates(&self) -> Vec<CandidateFile> {
        let mut files = Vec::new();
        for dir in self.resolve_search_paths() {
            for &format in FileFormat::ENABLED {
                for stem in FILE_STEMS {
                    for ext in format.extensions() {
                        files.push(CandidateFile {
                            format,
                            base: dir.join(format!("{stem}.{ext}")),
                            profile: dir.join(format!("{stem}.{}.{ext}", self.profile)),
                        });
                    }
                }
            }
        }
        files
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("ferrogram"));
        }
        paths
    }
}

const FILE_STEMS: [&str; 2] = ["ferrogram", "config"];

struct CandidateFile {
    format: FileFormat,
    base: PathBuf,
    profile: PathBuf,
}

/// Configuration file formats compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl FileFormat {
    const ENABLED: &'static [FileFormat] = &[
        #[cfg(feature = "toml-config")]
        FileFormat::Toml,
        #[cfg(feature = "yaml-config")]
        FileFormat::Yaml,
    ];

    fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::ENABLED
            .iter()
            .copied()
            .find(|format| format.extensions().contains(&ext))
    }

    fn merge(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
        }
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<FerrogramConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<FerrogramConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ErrorsConfig, LogLevel};
    use ferrogram_framework::ErrorMode;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.logging.level.as_str(), "info");
            assert!(config.bot.token.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Development"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ferrogram.toml",
                r#"
                [bot]
                token = "1:file"

                [polling]
                timeout_secs = 10
                "#,
            )?;
            jail.set_env("FERROGRAM_POLLING__TIMEOUT_SECS", "45");
            jail.set_env("FERROGRAM_LOGGING__LEVEL", "debug");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .unwrap();
            assert_eq!(config.bot.token.as_deref(), Some("1:file"));
            assert_eq!(config.polling.timeout_secs, 45);
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_is_overridden_by_base() {
        Jail::expect_with(|jail| {
            jail.create_file("ferrogram.production.toml", "[polling]\nlimit = 10\ntimeout_secs = 5")?;
            jail.create_file("ferrogram.toml", "[polling]\nlimit = 20")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap();
            assert_eq!(config.polling.limit, 20);
            assert_eq!(config.polling.timeout_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn test_merge_is_a_base_layer() {
        Jail::expect_with(|jail| {
            jail.set_env("FERROGRAM_ERRORS__MODE", "swallow");
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(FerrogramConfig {
                    errors: ErrorsConfig {
                        mode: ErrorMode::Raise,
                    },
                    ..Default::default()
                })
                .load()
                .unwrap();
            assert_eq!(config.errors.mode, ErrorMode::Swallow);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .file("/nonexistent/ferrogram.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_format() {
        Jail::expect_with(|jail| {
            jail.create_file("bot.ini", "token = 1")?;
            let err = ConfigLoader::new()
                .file(jail.directory().join("bot.ini"))
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(
                err,
                ConfigError::UnsupportedFormat { ref extension, .. } if extension == "ini"
            ));
            Ok(())
        });
    }
}
