//! Diagnostic sink for non-fatal registry conditions.
//!
//! The emitter never surfaces capacity, duplicate or listener failures to its
//! caller. It hands them to a [`DiagnosticSink`] instead. The default,
//! [`TracingSink`], forwards them to `tracing`.

use crate::error::HandlerError;
use thiserror::Error;

/// Receives warnings and contained listener failures from an emitter.
///
/// Implementations must not panic. Swapping the sink changes where messages
/// land, never how events are dispatched.
pub trait DiagnosticSink: Send + Sync {
    fn warn(&self, message: &str);

    fn error(&self, message: &str, cause: &HandlerError);
}

/// Default sink: `tracing::warn!` and `tracing::error!` under the `herald` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "herald", "{}", message);
    }

    fn error(&self, message: &str, cause: &HandlerError) {
        tracing::error!(target: "herald", error = %cause, "{}", message);
    }
}

/// Non-fatal conditions reported through [`DiagnosticSink::warn`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("max listeners ({limit}) reached for event '{event}', listener not added")]
    CapacityExceeded { event: String, limit: usize },

    #[error("listener already registered for event '{event}', ignoring duplicate")]
    DuplicateListener { event: String },

    #[error("wildcard listener already registered, ignoring duplicate")]
    DuplicateAnyListener,

    #[error("async listener for event '{event}' did not complete synchronously, use emit_async to await it")]
    PendingAsync { event: String },
}

/// Message passed to [`DiagnosticSink::error`] for a failed event listener.
pub(crate) fn listener_failed(event: &str) -> String {
    format!("listener for event '{}' failed", event)
}

/// Message passed to [`DiagnosticSink::error`] for a failed wildcard listener.
pub(crate) fn any_listener_failed(event: &str) -> String {
    format!("wildcard listener failed on event '{}'", event)
}
