//! Error handling and classification module
//!
//! This module provides the canonical error record every failure is normalized
//! into, the raw failure shapes the engine accepts, the network heuristics used
//! for unstructured failures, and the crate's own error type.

pub mod classification;
pub mod detector;
pub mod raw;

use thiserror::Error;

// Re-export main types for convenient access
pub use classification::{ErrorCategory, ErrorRecord, Metadata, Severity, UiState};
pub use detector::{NetworkDetector, NetworkPattern, NetworkSignal};
pub use raw::{BoxError, CodedFailure, RawFailure, StructuredShape};

/// Errors raised while building the engine (settings, registry tables).
///
/// Classification itself never fails; these only surface from construction.
#[derive(Error, Debug)]
pub enum FaultlineError {
    /// Settings could not be loaded or deserialized.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// A registry table could not be parsed.
    #[error("Registry table error: {0}")]
    RegistryToml(#[from] toml::de::Error),

    /// IO error while reading a table from disk.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A registry code was empty or whitespace.
    #[error("Invalid registry code: {0:?}")]
    InvalidCode(String),

    /// The fallback entry would break its guarantees.
    #[error("Invalid fallback entry: {0}")]
    InvalidFallback(String),
}

/// Result type for engine construction.
pub type FaultlineResult<T> = Result<T, FaultlineError>;
