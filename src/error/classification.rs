//! Error classification types for the recovery-policy engine
//!
//! This module provides the canonical [`ErrorRecord`] every failure is normalized
//! into, together with the closed enumerations describing how a failure is
//! categorized, how severe it is, and how the presentation layer should show it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::raw::RawFailure;
use crate::registry::RegistryEntry;

/// Free-form context attached to a record (endpoint, user id, ...).
///
/// The engine never interprets these values; they are carried through to the
/// report callback and the developer log untouched.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// The broad family a failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Connectivity problems, timeouts, unreachable backends.
    Network,
    /// Missing, expired or insufficient credentials.
    Auth,
    /// Input rejected by client or server side validation.
    Validation,
    /// Failures of long-lived streams (sockets, server-sent events).
    Stream,
    /// Failures in the data layer (queries, caches, local stores).
    #[serde(alias = "DATA-LAYER")]
    DataLayer,
    /// Anything that could not be classified.
    Unknown,
}

impl ErrorCategory {
    /// Parses the wire name of a category, accepting `DATA-LAYER` as an alias.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "NETWORK" => Some(Self::Network),
            "AUTH" => Some(Self::Auth),
            "VALIDATION" => Some(Self::Validation),
            "STREAM" => Some(Self::Stream),
            "DATA_LAYER" | "DATA-LAYER" => Some(Self::DataLayer),
            "UNKNOWN" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Returns the wire name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::Auth => "AUTH",
            Self::Validation => "VALIDATION",
            Self::Stream => "STREAM",
            Self::DataLayer => "DATA_LAYER",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious a failure is. Ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Returns the wire name of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presentation mode the consumer should use for a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiState {
    /// Rendered next to the control that failed.
    Inline,
    /// Transient notification.
    Toast,
    /// Blocking dialog.
    Modal,
    /// Replaces the whole view.
    FullPage,
}

/// The canonical, normalized representation of a failure.
///
/// Policy fields (`severity`, `ui_state`, `retryable`, `max_retries`,
/// `user_message`) are always copied from the registry entry the `code`
/// resolved to. Records are never mutated after creation; helpers such as
/// [`ErrorRecord::escalated`] return a modified copy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Registry key this record resolved to.
    pub code: String,
    /// Category of the failure.
    pub category: ErrorCategory,
    /// Severity copied from the registry entry.
    pub severity: Severity,
    /// Presentation mode copied from the registry entry.
    pub ui_state: UiState,
    /// Whether the registry allows retrying this failure.
    pub retryable: bool,
    /// Optional retry budget override from the registry entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Developer-facing description.
    pub message: String,
    /// End-user-facing description from the registry entry.
    pub user_message: String,
    /// When the record was created.
    pub timestamp: DateTime<Utc>,
    /// Passthrough context.
    #[serde(default)]
    pub metadata: Metadata,
    /// The raw failure that produced this record, kept for logging.
    #[serde(skip)]
    pub original_error: Option<Arc<RawFailure>>,
}

impl ErrorRecord {
    /// Creates a record for `code`, taking every policy field from `entry`.
    pub fn new(
        code: impl Into<String>,
        category: ErrorCategory,
        entry: &RegistryEntry,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            category,
            severity: entry.severity,
            ui_state: entry.ui_state,
            retryable: entry.retryable,
            max_retries: entry.max_retries,
            message: message.into(),
            user_message: entry.user_message.clone(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
            original_error: None,
        }
    }

    /// Attaches the raw failure this record was built from.
    pub fn with_original(mut self, original: Arc<RawFailure>) -> Self {
        self.original_error = Some(original);
        self
    }

    /// Adds a metadata key-value pair, replacing any existing value.
    pub fn add_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merges `context` into the metadata. Keys in `context` win on conflict.
    pub fn merge_context(mut self, context: Metadata) -> Self {
        self.metadata.extend(context);
        self
    }

    /// Returns a copy that asks the presentation layer for a full-page state.
    ///
    /// Used once a retry budget is exhausted.
    pub fn escalated(&self) -> Self {
        let mut record = self.clone();
        record.ui_state = UiState::FullPage;
        record
            .metadata
            .insert("escalated".to_string(), serde_json::Value::Bool(true));
        record
    }

    /// Returns the metadata value stored under `key`.
    pub fn context(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Serializes the record to JSON, omitting the raw failure.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorRecord {}
