//! Shared helpers for integration tests.

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver as ChannelReceiver, Sender};
use herald::{DiagnosticSink, Emitter, EmitterConfig, HandlerError, HandlerResult, Listener};
use parking_lot::Mutex;
use std::sync::Arc;

/// Sink that keeps every diagnostic for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    warnings: Mutex<Vec<String>>,
    errors: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    /// `(message, cause)` pairs.
    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().clone()
    }
}

impl DiagnosticSink for RecordingSink {
    fn warn(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }

    fn error(&self, message: &str, cause: &HandlerError) {
        self.errors
            .lock()
            .push((message.to_string(), cause.to_string()));
    }
}

/// Thread-safe log of listener invocations, in call order.
#[derive(Clone)]
pub struct CallLog {
    sender: Sender<String>,
    receiver: ChannelReceiver<String>,
}

impl CallLog {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn push(&self, entry: impl Into<String>) {
        let _ = self.sender.send(entry.into());
    }

    /// Drain everything logged so far.
    pub fn take(&self) -> Vec<String> {
        self.receiver.try_iter().collect()
    }

    /// Listener that logs `"{tag}:{args}"`.
    pub fn listener<A>(&self, tag: &str) -> Listener<A>
    where
        A: std::fmt::Display + Send + Sync + 'static,
    {
        let log = self.clone();
        let tag = tag.to_string();
        Listener::new(move |args: &A| -> HandlerResult {
            log.push(format!("{tag}:{args}"));
            Ok(())
        })
    }
}

pub fn test_emitter<A>(config: EmitterConfig) -> (Emitter<A>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let emitter = Emitter::with_sink(config, sink.clone()).unwrap();
    (emitter, sink)
}
