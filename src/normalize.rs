//! Failure normalization.
//!
//! Turns any [`RawFailure`] plus an optional code and context into one
//! canonical [`ErrorRecord`] with its registry policy attached. Normalization
//! never fails: whatever cannot be classified resolves to the fallback entry.

use std::sync::Arc;

use crate::error::{ErrorCategory, ErrorRecord, Metadata, NetworkDetector, RawFailure};
use crate::registry::{Registry, FALLBACK_CODE};

/// Converts raw failures into canonical records.
#[derive(Debug)]
pub struct Normalizer {
    registry: Arc<Registry>,
    detector: NetworkDetector,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(Registry::default()))
    }
}

impl Normalizer {
    /// Creates a normalizer resolving codes against `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            detector: NetworkDetector::new(),
        }
    }

    /// Replaces the network heuristics.
    pub fn with_detector(mut self, detector: NetworkDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Returns the registry codes are resolved against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Normalizes a failure.
    ///
    /// * An already canonical record passes through untouched apart from
    ///   `context`, which is merged into its metadata (supplied keys win).
    /// * `explicit_code` wins over any code the failure carries itself.
    /// * The category comes from the failure itself when it declares one, then
    ///   from the registry entry of an exactly matching code, then from the
    ///   network heuristics, and is `UNKNOWN` otherwise.
    pub fn normalize(
        &self,
        raw: impl Into<RawFailure>,
        explicit_code: Option<&str>,
        context: Option<Metadata>,
    ) -> ErrorRecord {
        let raw = raw.into();
        let context = context.unwrap_or_default();

        let raw = match raw {
            RawFailure::Record(record) => return record.merge_context(context),
            other => other,
        };

        let structured = raw.structured();
        let code = explicit_code
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .or_else(|| structured.as_ref().map(|shape| shape.code.clone()))
            .unwrap_or_else(|| FALLBACK_CODE.to_string());

        let entry = self.registry.lookup(&code);
        let category = structured
            .and_then(|shape| shape.category)
            .or_else(|| {
                self.registry
                    .get(&code)
                    .filter(|_| code != FALLBACK_CODE)
                    .map(|entry| entry.category)
            })
            .or_else(|| {
                self.detector
                    .detect(&raw)
                    .map(|_| ErrorCategory::Network)
            })
            .unwrap_or(ErrorCategory::Unknown);

        let message = raw.describe();
        ErrorRecord::new(code, category, entry, message)
            .with_original(Arc::new(raw))
            .merge_context(context)
    }
}
