//! Policy registry for error codes
//!
//! This module maps error codes to their recovery policy: category, severity,
//! presentation mode, retryability and the message shown to end users. Lookup
//! never fails: codes without an entry resolve to the fallback entry.
//!
//! A registry is built once, either the built-in table ([`Registry::builtin`])
//! or a table extended through [`RegistryBuilder`], and is read-only afterwards.

pub mod builtin;

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, FaultlineError, FaultlineResult, Severity, UiState};

/// Code of the fallback entry.
pub const FALLBACK_CODE: &str = "UNKNOWN";

/// Recovery policy for one error code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub ui_state: UiState,
    pub retryable: bool,
    pub user_message: String,
    /// Overrides the retry controller's default budget for this code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl RegistryEntry {
    /// Creates an entry without a retry budget override.
    pub fn new(
        category: ErrorCategory,
        severity: Severity,
        ui_state: UiState,
        retryable: bool,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            ui_state,
            retryable,
            user_message: user_message.into(),
            max_retries: None,
        }
    }

    /// Sets the retry budget override.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Immutable code → policy table with a guaranteed fallback.
#[derive(Clone, Debug)]
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,
    fallback: RegistryEntry,
}

impl Registry {
    /// Returns the process-wide built-in registry.
    pub fn builtin() -> &'static Registry {
        static BUILTIN: OnceLock<Registry> = OnceLock::new();
        BUILTIN.get_or_init(|| Registry {
            entries: builtin::entries()
                .into_iter()
                .map(|(code, entry)| (code.to_string(), entry))
                .collect(),
            fallback: builtin::fallback(),
        })
    }

    /// Starts a builder seeded with the built-in table.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Returns the entry for `code`, or the fallback entry.
    pub fn lookup(&self, code: &str) -> &RegistryEntry {
        self.entries.get(code).unwrap_or(&self.fallback)
    }

    /// Returns the entry for `code` only on an exact match.
    pub fn get(&self, code: &str) -> Option<&RegistryEntry> {
        if code == FALLBACK_CODE {
            return Some(&self.fallback);
        }
        self.entries.get(code)
    }

    /// Returns true if `code` has its own entry (the fallback code included).
    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// Returns the fallback entry.
    pub fn fallback(&self) -> &RegistryEntry {
        &self.fallback
    }

    /// Returns every known code, sorted, the fallback code included.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        codes.push(FALLBACK_CODE);
        codes.sort_unstable();
        codes
    }

    /// Number of entries, the fallback included.
    pub fn len(&self) -> usize {
        self.entries.len() + 1
    }

    /// A registry always holds at least its fallback entry.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

/// Shape of a registry extension table.
///
/// ```toml
/// [fallback]
/// category = "UNKNOWN"
/// severity = "CRITICAL"
/// ui_state = "FULL_PAGE"
/// retryable = true
/// user_message = "Something broke."
///
/// [codes.PAYMENT_DECLINED]
/// category = "VALIDATION"
/// severity = "WARNING"
/// ui_state = "MODAL"
/// retryable = false
/// user_message = "Your card was declined."
/// ```
#[derive(Debug, Default, Deserialize)]
struct RegistryTable {
    #[serde(default)]
    fallback: Option<RegistryEntry>,
    #[serde(default)]
    codes: HashMap<String, RegistryEntry>,
}

/// Builder producing a validated [`Registry`].
#[derive(Clone, Debug)]
pub struct RegistryBuilder {
    entries: HashMap<String, RegistryEntry>,
    fallback: RegistryEntry,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        let registry = Registry::builtin();
        Self {
            entries: registry.entries.clone(),
            fallback: registry.fallback.clone(),
        }
    }
}

impl RegistryBuilder {
    /// Starts from an empty table holding only the built-in fallback.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            fallback: builtin::fallback(),
        }
    }

    /// Adds or replaces an entry. Inserting the fallback code replaces the
    /// fallback entry.
    pub fn insert(mut self, code: impl Into<String>, entry: RegistryEntry) -> Self {
        let code = code.into();
        if code == FALLBACK_CODE {
            self.fallback = entry;
        } else {
            self.entries.insert(code, entry);
        }
        self
    }

    /// Replaces the fallback entry.
    pub fn fallback(mut self, entry: RegistryEntry) -> Self {
        self.fallback = entry;
        self
    }

    /// Merges a TOML table with optional `[fallback]` and `[codes.<CODE>]`
    /// sections into the builder.
    pub fn load_toml_str(mut self, source: &str) -> FaultlineResult<Self> {
        let table: RegistryTable = toml::from_str(source)?;
        if let Some(fallback) = table.fallback {
            self.fallback = fallback;
        }
        for (code, entry) in table.codes {
            self = self.insert(code, entry);
        }
        Ok(self)
    }

    /// Reads and merges a TOML table from disk.
    pub fn load_toml_file<P: AsRef<Path>>(self, path: P) -> FaultlineResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        self.load_toml_str(&source)
    }

    /// Validates and freezes the table.
    ///
    /// # Errors
    ///
    /// Returns an error if a code is blank, or if the fallback entry is not
    /// `UNKNOWN`, `CRITICAL` and retryable.
    pub fn build(self) -> FaultlineResult<Registry> {
        if let Some(code) = self.entries.keys().find(|code| code.trim().is_empty()) {
            return Err(FaultlineError::InvalidCode(code.clone()));
        }
        if self.fallback.category != ErrorCategory::Unknown {
            return Err(FaultlineError::InvalidFallback(format!(
                "category must be UNKNOWN, found {}",
                self.fallback.category
            )));
        }
        if self.fallback.severity != Severity::Critical {
            return Err(FaultlineError::InvalidFallback(format!(
                "severity must be CRITICAL, found {}",
                self.fallback.severity
            )));
        }
        if !self.fallback.retryable {
            return Err(FaultlineError::InvalidFallback(
                "fallback must be retryable".to_string(),
            ));
        }

        tracing::debug!(
            codes = self.entries.len() + 1,
            "error registry built"
        );

        Ok(Registry {
            entries: self.entries,
            fallback: self.fallback,
        })
    }
}
