//! The built-in policy table.

use super::RegistryEntry;
use crate::error::{ErrorCategory, Severity, UiState};

pub const NETWORK_TIMEOUT: &str = "NETWORK_TIMEOUT";
pub const NETWORK_OFFLINE: &str = "NETWORK_OFFLINE";
pub const NETWORK_SERVER_ERROR: &str = "NETWORK_SERVER_ERROR";
pub const AUTH_UNAUTHORIZED: &str = "AUTH_UNAUTHORIZED";
pub const AUTH_SESSION_EXPIRED: &str = "AUTH_SESSION_EXPIRED";
pub const AUTH_FORBIDDEN: &str = "AUTH_FORBIDDEN";
pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
pub const VALIDATION_REQUIRED_FIELD: &str = "VALIDATION_REQUIRED_FIELD";
pub const STREAM_DISCONNECTED: &str = "STREAM_DISCONNECTED";
pub const STREAM_PARSE_ERROR: &str = "STREAM_PARSE_ERROR";
pub const DATA_LAYER_QUERY_FAILED: &str = "DATA_LAYER_QUERY_FAILED";
pub const DATA_LAYER_NOT_FOUND: &str = "DATA_LAYER_NOT_FOUND";

/// The catch-all policy: unknown failures are loud but recoverable.
pub(crate) fn fallback() -> RegistryEntry {
    RegistryEntry::new(
        ErrorCategory::Unknown,
        Severity::Critical,
        UiState::FullPage,
        true,
        "Something went wrong. Please try again.",
    )
}

pub(crate) fn entries() -> Vec<(&'static str, RegistryEntry)> {
    use ErrorCategory::*;
    use UiState::*;

    vec![
        (
            NETWORK_TIMEOUT,
            RegistryEntry::new(
                Network,
                Severity::Warning,
                Inline,
                true,
                "The request took too long. Please try again.",
            )
            .with_max_retries(3),
        ),
        (
            NETWORK_OFFLINE,
            RegistryEntry::new(
                Network,
                Severity::Error,
                Toast,
                true,
                "You appear to be offline. Check your connection.",
            ),
        ),
        (
            NETWORK_SERVER_ERROR,
            RegistryEntry::new(
                Network,
                Severity::Error,
                Toast,
                true,
                "The server had a problem. Please try again shortly.",
            ),
        ),
        (
            AUTH_UNAUTHORIZED,
            RegistryEntry::new(
                Auth,
                Severity::Error,
                Modal,
                false,
                "Please sign in to continue.",
            ),
        ),
        (
            AUTH_SESSION_EXPIRED,
            RegistryEntry::new(
                Auth,
                Severity::Warning,
                Modal,
                false,
                "Your session has expired. Please sign in again.",
            ),
        ),
        (
            AUTH_FORBIDDEN,
            RegistryEntry::new(
                Auth,
                Severity::Error,
                FullPage,
                false,
                "You do not have permission to view this page.",
            ),
        ),
        (
            VALIDATION_FAILED,
            RegistryEntry::new(
                Validation,
                Severity::Info,
                Inline,
                false,
                "Some of the information entered is not valid.",
            ),
        ),
        (
            VALIDATION_REQUIRED_FIELD,
            RegistryEntry::new(
                Validation,
                Severity::Info,
                Inline,
                false,
                "This field is required.",
            ),
        ),
        (
            STREAM_DISCONNECTED,
            RegistryEntry::new(
                Stream,
                Severity::Warning,
                Toast,
                true,
                "Live updates were interrupted. Reconnecting...",
            )
            .with_max_retries(5),
        ),
        (
            STREAM_PARSE_ERROR,
            RegistryEntry::new(
                Stream,
                Severity::Error,
                Toast,
                false,
                "We received an update we could not read.",
            ),
        ),
        (
            DATA_LAYER_QUERY_FAILED,
            RegistryEntry::new(
                DataLayer,
                Severity::Error,
                Toast,
                true,
                "We could not load your data. Please try again.",
            ),
        ),
        (
            DATA_LAYER_NOT_FOUND,
            RegistryEntry::new(
                DataLayer,
                Severity::Warning,
                Inline,
                false,
                "The requested item could not be found.",
            ),
        ),
    ]
}
