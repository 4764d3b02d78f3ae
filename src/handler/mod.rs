//! Error handler facade.
//!
//! The [`Handler`] is the one entry point application code reports failures
//! through. It normalizes the failure against the registry, writes it to the
//! developer log when enabled, hands the record to the configured callback,
//! and returns the record so the caller can pick a recovery path.

mod boundary;

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{ErrorRecord, FaultlineResult, Metadata, RawFailure, Severity};
use crate::listeners::suppress_reporting;
use crate::normalize::Normalizer;
use crate::registry::Registry;
use crate::settings::{is_development, Settings};

pub use boundary::SOURCE_RENDER;

/// Callback invoked with every reported record.
pub type ErrorCallback = Arc<dyn Fn(&ErrorRecord) + Send + Sync>;

/// Side-effect configuration of a [`Handler`].
#[derive(Clone)]
pub struct HandlerConfig {
    /// Write reported records to the developer log.
    pub log_errors: bool,
    /// Invoked synchronously with every reported record.
    pub on_error: Option<ErrorCallback>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            log_errors: is_development(),
            on_error: None,
        }
    }
}

impl fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("log_errors", &self.log_errors)
            .field("on_error", &self.on_error.as_ref().map(|_| "Fn(&ErrorRecord)"))
            .finish()
    }
}

impl HandlerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether reported records are logged.
    pub fn with_log_errors(mut self, enabled: bool) -> Self {
        self.log_errors = enabled;
        self
    }

    /// Set the report callback.
    pub fn with_on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ErrorRecord) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

/// Reports failures and runs fallible operations.
///
/// The configuration is replaced wholesale by [`Handler::configure`]; with
/// concurrent writers the last write wins. A report in flight keeps using the
/// configuration it started with.
#[derive(Debug)]
pub struct Handler {
    normalizer: Normalizer,
    config: RwLock<Arc<HandlerConfig>>,
}

impl Default for Handler {
    fn default() -> Self {
        Self::new(Arc::new(Registry::default()), HandlerConfig::default())
    }
}

impl Handler {
    /// Creates a handler resolving codes against `registry`.
    pub fn new(registry: Arc<Registry>, config: HandlerConfig) -> Self {
        Self {
            normalizer: Normalizer::new(registry),
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Creates a handler from loaded settings.
    ///
    /// The registry is the built-in table extended by `settings.registry_file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry file cannot be read or is invalid.
    pub fn from_settings(settings: &Settings) -> FaultlineResult<Self> {
        let registry = settings.registry()?;
        let config = HandlerConfig::new().with_log_errors(settings.log_errors);
        Ok(Self::new(Arc::new(registry), config))
    }

    /// Replaces the configuration.
    pub fn configure(&self, config: HandlerConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    /// Returns the current configuration.
    pub fn config(&self) -> Arc<HandlerConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the registry codes are resolved against.
    pub fn registry(&self) -> &Registry {
        self.normalizer.registry()
    }

    /// Returns the normalizer.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Normalizes and reports a failure, returning its record.
    ///
    /// A panic raised by the `on_error` callback is caught and logged at
    /// debug level; the record is returned regardless.
    pub fn report(
        &self,
        raw: impl Into<RawFailure>,
        code: Option<&str>,
        context: Option<Metadata>,
    ) -> ErrorRecord {
        let record = self.normalizer.normalize(raw, code, context);
        let config = self.config();

        if config.log_errors {
            log_record(&record);
        }

        if let Some(callback) = &config.on_error {
            let outcome =
                suppress_reporting(|| panic::catch_unwind(AssertUnwindSafe(|| callback(&record))));
            if let Err(payload) = outcome {
                tracing::debug!(
                    code = %record.code,
                    panic = %RawFailure::from_panic(&*payload),
                    "error callback panicked"
                );
            }
        }

        record
    }

    /// Awaits `operation`, reporting its failure.
    ///
    /// A failure is reported with `fallback_code` as the explicit code and
    /// returned as the error; a record produced by a nested `wrap` keeps its
    /// own code. Success values pass through untouched.
    pub async fn wrap<F, T, E>(
        &self,
        operation: F,
        fallback_code: &str,
        context: Option<Metadata>,
    ) -> Result<T, ErrorRecord>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<RawFailure>,
    {
        operation
            .await
            .map_err(|error| self.report(error, Some(fallback_code), context))
    }
}

fn log_record(record: &ErrorRecord) {
    let original = record
        .original_error
        .as_ref()
        .map(|raw| raw.describe())
        .unwrap_or_default();
    let metadata = serde_json::to_string(&record.metadata).unwrap_or_default();

    match record.severity {
        Severity::Critical => tracing::error!(
            code = %record.code,
            category = %record.category,
            severity = %record.severity,
            retryable = record.retryable,
            %metadata,
            %original,
            "{}",
            record.message
        ),
        Severity::Info | Severity::Warning | Severity::Error => tracing::warn!(
            code = %record.code,
            category = %record.category,
            severity = %record.severity,
            retryable = record.retryable,
            %metadata,
            %original,
            "{}",
            record.message
        ),
    }
}
