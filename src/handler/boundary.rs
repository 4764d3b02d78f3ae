//! Render-failure entry points.
//!
//! A render failure is any failure raised while producing a view. The caller
//! (a UI boundary) decides whether to remount or show a fallback; the handler
//! only classifies and reports.

use std::panic::{self, AssertUnwindSafe};

use super::Handler;
use crate::error::{ErrorRecord, Metadata, RawFailure};
use crate::listeners::suppress_reporting;

/// Metadata `source` value for render failures.
pub const SOURCE_RENDER: &str = "render";

impl Handler {
    /// Reports a failure raised while rendering.
    ///
    /// The record carries `source = "render"` in its metadata, on top of
    /// `context`.
    pub fn report_render_failure(
        &self,
        raw: impl Into<RawFailure>,
        context: Option<Metadata>,
    ) -> ErrorRecord {
        let mut context = context.unwrap_or_default();
        context.insert("source".to_string(), SOURCE_RENDER.into());
        self.report(raw, None, Some(context))
    }

    /// Runs a render closure, turning a panic into a reported render failure.
    ///
    /// The panic is not forwarded a second time by an attached panic hook.
    pub fn catch_render<R>(&self, render: impl FnOnce() -> R) -> Result<R, ErrorRecord> {
        suppress_reporting(|| panic::catch_unwind(AssertUnwindSafe(render)))
            .map_err(|payload| self.report_render_failure(RawFailure::from_panic(&*payload), None))
    }
}
