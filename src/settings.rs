//! Engine settings.
//!
//! Settings are optional: every field has a default and the engine works
//! without a settings file. When one is used it is a TOML file whose values
//! can be overridden from the environment with the `FAULTLINE__` prefix, for
//! example `FAULTLINE__RETRY__MAX_ATTEMPTS=5`.
//!
//! This module also owns the host environment flag ([`is_development`]), read
//! once per process to seed the default of `log_errors`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::FaultlineResult;
use crate::registry::{Registry, RegistryBuilder};
use crate::retry::BackoffStrategy;

/// Environment variables consulted for the development flag, in order.
const ENVIRONMENT_VARS: [&str; 2] = ["FAULTLINE_ENV", "APP_ENV"];

/// Prefix for settings overrides from the environment.
const ENV_PREFIX: &str = "FAULTLINE";

/// Returns true when the host runs a development build.
///
/// Reads `FAULTLINE_ENV`, then `APP_ENV` (`development`/`dev` or
/// `production`/`prod`), and falls back to the build profile. The answer is
/// computed once and cached for the life of the process.
pub fn is_development() -> bool {
    static DEVELOPMENT: OnceLock<bool> = OnceLock::new();
    *DEVELOPMENT.get_or_init(|| {
        ENVIRONMENT_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find_map(|value| parse_environment(&value))
            .unwrap_or(cfg!(debug_assertions))
    })
}

fn parse_environment(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "development" | "dev" | "local" => Some(true),
        "production" | "prod" | "staging" => Some(false),
        _ => None,
    }
}

fn default_log_errors() -> bool {
    is_development()
}

/// Backoff defaults applied to retry controllers built from settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Percentage of jitter added on top of each delay (0-100).
    #[serde(default = "default_jitter_percent")]
    pub jitter_percent: u8,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_jitter_percent() -> u8 {
    10
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter_percent: default_jitter_percent(),
        }
    }
}

impl RetrySettings {
    /// Builds the backoff strategy these settings describe.
    pub fn strategy(&self) -> BackoffStrategy {
        BackoffStrategy::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.max_attempts,
            self.jitter_percent,
        )
    }
}

/// Top-level engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Whether reported records are written to the developer log.
    #[serde(default = "default_log_errors")]
    pub log_errors: bool,
    /// Retry defaults.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Optional registry extension table, relative to the working directory.
    #[serde(default)]
    pub registry_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_errors: default_log_errors(),
            retry: RetrySettings::default(),
            registry_file: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be parsed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use faultline::settings::Settings;
    ///
    /// let settings = Settings::load("config/faultline.toml")?;
    /// # Ok::<(), faultline::FaultlineError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> FaultlineResult<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
            .add_source(Self::environment())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load settings from the environment only.
    pub fn from_env() -> FaultlineResult<Self> {
        let config = Config::builder().add_source(Self::environment()).build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse settings from a TOML string, without environment overrides.
    pub fn from_toml_str(source: &str) -> FaultlineResult<Self> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Builds the registry: the built-in table, extended by `registry_file`.
    pub fn registry(&self) -> FaultlineResult<Registry> {
        let builder = RegistryBuilder::default();
        let builder = match &self.registry_file {
            Some(path) => builder.load_toml_file(path)?,
            None => builder,
        };
        builder.build()
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }
}
