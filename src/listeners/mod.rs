//! Process-wide failure listeners.
//!
//! A [`ListenerManager`] attaches a [`Handler`] to the two global interception
//! points a Rust process has:
//!
//! - **Unhandled rejections**: failures of detached tasks started through
//!   [`spawn_detached`], or handed to [`notify_unhandled_rejection`] by code
//!   that owns its own detached work.
//! - **Uncaught exceptions**: panics, observed through a panic hook that
//!   chains to whatever hook was installed before it.
//!
//! Every forwarded failure goes through [`Handler::report`], so it is logged
//! and delivered to the handler's `on_error` callback like any other report.
//!
//! Attach and detach are idempotent. The state is process-wide; every
//! `ListenerManager` value is a handle to the same state.
//!
//! A panic inside a panic hook aborts the process, so the hook reports from a
//! short-lived helper thread and waits for it. A panicking `on_error` callback
//! unwinds on that thread and is discarded.

use std::cell::Cell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::error::{Metadata, RawFailure};
use crate::handler::Handler;

/// Metadata `source` value for failures of detached tasks.
pub const SOURCE_UNHANDLED_REJECTION: &str = "unhandled_rejection";

/// Metadata `source` value for panics.
pub const SOURCE_UNCAUGHT_EXCEPTION: &str = "uncaught_exception";

/// Handler receiving forwarded failures while attached.
static ACTIVE: RwLock<Option<Arc<Handler>>> = RwLock::new(None);

/// Restores the panic hook that was installed before ours.
type RestoreHook = Box<dyn FnOnce() + Send>;

/// Present while our panic hook is installed.
static HOOK: Mutex<Option<RestoreHook>> = Mutex::new(None);

thread_local! {
    static SUPPRESSED: Cell<u32> = const { Cell::new(0) };
}

/// Handle to the process-wide listener state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerManager {
    _private: (),
}

impl ListenerManager {
    /// Creates a handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts forwarding process-wide failures to `handler`.
    ///
    /// Returns false, and keeps the existing registration, when already
    /// attached. A second call never installs a second hook.
    pub fn attach(&self, handler: Arc<Handler>) -> bool {
        let mut hook = HOOK.lock().unwrap_or_else(PoisonError::into_inner);
        if hook.is_some() {
            return false;
        }

        *ACTIVE.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
        *hook = Some(install_panic_hook());

        tracing::debug!("failure listeners attached");
        true
    }

    /// Stops forwarding and restores the previous panic hook.
    ///
    /// Returns false when nothing was attached. If another hook was installed
    /// on top of ours after `attach`, it is replaced by the restored one.
    pub fn detach(&self) -> bool {
        let mut hook = HOOK.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(restore) = hook.take() else {
            return false;
        };

        *ACTIVE.write().unwrap_or_else(PoisonError::into_inner) = None;
        restore();

        tracing::debug!("failure listeners detached");
        true
    }

    /// Returns true while attached.
    pub fn is_attached(&self) -> bool {
        HOOK.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

fn install_panic_hook() -> RestoreHook {
    let previous = Arc::new(panic::take_hook());
    let chained = Arc::clone(&previous);

    panic::set_hook(Box::new(move |info| {
        if !is_suppressed() {
            if let Some(handler) = active_handler() {
                let mut context = Metadata::from([(
                    "source".to_string(),
                    SOURCE_UNCAUGHT_EXCEPTION.into(),
                )]);
                if let Some(location) = info.location() {
                    context.insert("location".to_string(), location.to_string().into());
                }
                if let Some(name) = std::thread::current().name() {
                    context.insert("thread".to_string(), name.into());
                }

                let raw = RawFailure::from_panic(info.payload());
                report_off_hook(&handler, raw, context);
            }
        }
        chained(info);
    }));

    Box::new(move || {
        panic::set_hook(Box::new(move |info| previous(info)));
    })
}

/// Runs the report on a scoped helper thread, outside the panicking thread's
/// hook invocation.
fn report_off_hook(handler: &Handler, raw: RawFailure, context: Metadata) {
    std::thread::scope(|scope| {
        let spawned = std::thread::Builder::new()
            .name("faultline-report".to_string())
            .spawn_scoped(scope, move || {
                handler.report(raw, None, Some(context));
            });
        match spawned {
            Ok(reporter) => {
                if reporter.join().is_err() {
                    tracing::debug!("panic report did not complete");
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "could not start panic reporter thread");
            }
        }
    });
}

fn active_handler() -> Option<Arc<Handler>> {
    ACTIVE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Reports the failure of a detached task.
///
/// While attached the failure is normalized with `source =
/// "unhandled_rejection"` and reported through the attached handler. While
/// detached it is logged at error level instead of being dropped.
pub fn notify_unhandled_rejection(raw: impl Into<RawFailure>) {
    let raw = raw.into();
    match active_handler() {
        Some(handler) => {
            let context = Metadata::from([(
                "source".to_string(),
                SOURCE_UNHANDLED_REJECTION.into(),
            )]);
            handler.report(raw, None, Some(context));
        }
        None => {
            tracing::error!(failure = %raw, "unhandled failure in detached task");
        }
    }
}

/// Spawns a task whose result nobody awaits.
///
/// An `Err` output is passed to [`notify_unhandled_rejection`]. A panic is
/// reported by the panic hook when attached and then swallowed by the task.
///
/// Must be called from within a tokio runtime.
pub fn spawn_detached<F, T, E>(future: F) -> JoinHandle<()>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<RawFailure> + Send + 'static,
{
    tokio::spawn(async move {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => notify_unhandled_rejection(error),
            Err(_) => tracing::debug!("detached task panicked"),
        }
    })
}

/// Runs `f` with panic forwarding disabled on the current thread.
///
/// Used around code that catches its own panics so they are not reported a
/// second time by the hook.
pub(crate) fn suppress_reporting<R>(f: impl FnOnce() -> R) -> R {
    struct Guard;

    impl Drop for Guard {
        fn drop(&mut self) {
            SUPPRESSED.with(|count| count.set(count.get().saturating_sub(1)));
        }
    }

    SUPPRESSED.with(|count| count.set(count.get() + 1));
    let _guard = Guard;
    f()
}

fn is_suppressed() -> bool {
    SUPPRESSED.with(|count| count.get() > 0)
}
