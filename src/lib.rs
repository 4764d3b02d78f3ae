//! Faultline - error classification and recovery policy engine
//!
//! Every failure an application reports is normalized into one canonical
//! [`ErrorRecord`] whose recovery policy (severity, presentation mode,
//! retryability, user-facing message) comes from a code-keyed [`Registry`].
//! The [`Handler`] reports failures and wraps fallible operations, the
//! [`ListenerManager`] forwards process-wide failures (panics and failed
//! detached tasks) to it, and the [`RetryController`] bounds retries with
//! exponential backoff.
//!
//! ```
//! use faultline::{builtin, Handler};
//!
//! let handler = Handler::default();
//! let record = handler.report("request timed out", Some(builtin::NETWORK_TIMEOUT), None);
//! assert!(record.retryable);
//! ```

pub mod error;
pub mod handler;
pub mod listeners;
pub mod logging;
pub mod normalize;
pub mod registry;
pub mod retry;
pub mod settings;

pub use error::{
    CodedFailure, ErrorCategory, ErrorRecord, FaultlineError, FaultlineResult, Metadata,
    RawFailure, Severity, UiState,
};
pub use handler::{Handler, HandlerConfig};
pub use listeners::{notify_unhandled_rejection, spawn_detached, ListenerManager};
pub use normalize::Normalizer;
pub use registry::{builtin, Registry, RegistryBuilder, RegistryEntry, FALLBACK_CODE};
pub use retry::{BackoffStrategy, RetryController, RetryError, RetryPhase, RetryState};
pub use settings::Settings;
