//! Error types for the event registry.

use std::any::Any;
use thiserror::Error;

/// Boxed error a listener returns to signal failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single listener invocation.
pub type HandlerResult = std::result::Result<(), BoxError>;

/// Errors surfaced to the caller of an emitter operation.
///
/// Only malformed calls fail. Capacity, duplicate and listener failures are
/// reported through the diagnostic sink instead.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for EmitterError {
    fn from(e: serde_json::Error) -> Self {
        EmitterError::Config(e.to_string())
    }
}

/// A listener failure, contained at the dispatch boundary.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The listener returned (or its future resolved to) an error.
    #[error("listener returned an error: {0}")]
    Failed(#[source] BoxError),

    /// The listener panicked while running or being polled.
    #[error("listener panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    /// Build from a panic payload caught by `catch_unwind`.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        HandlerError::Panicked(message)
    }

    /// Whether the failure was a panic rather than a returned error.
    pub fn is_panic(&self) -> bool {
        matches!(self, HandlerError::Panicked(_))
    }
}

/// Result type for emitter operations.
pub type Result<T> = std::result::Result<T, EmitterError>;
