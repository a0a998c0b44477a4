//! Main Emitter struct tying the registry and dispatch together.

use crate::diagnostics::{self, DiagnosticSink, TracingSink, Warning};
use crate::error::{EmitterError, HandlerError, Result};
use crate::listener::{AnyListener, BoundHandler, Invocation, Listener};
use crate::registry::{Claim, EventTable, ListenerRecord, RecordRef, WildcardSet};
use crate::types::{validate_event_name, ListenerOptions, Receiver, Repeat};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace};

/// Emitter configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Max listeners per event name (None = unlimited).
    /// Registrations beyond the cap are rejected with a warning.
    pub max_listeners_per_event: Option<usize>,
}

impl EmitterConfig {
    /// Config with a per-event listener cap.
    pub fn with_max_listeners(limit: usize) -> Self {
        Self {
            max_listeners_per_event: Some(limit),
        }
    }

    /// Parse and validate a JSON config, e.g. `{"max_listeners_per_event": 10}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_max_listeners(self.max_listeners_per_event)
    }
}

fn validate_max_listeners(limit: Option<usize>) -> Result<()> {
    if limit == Some(0) {
        return Err(EmitterError::InvalidArgument(
            "max listeners per event must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

/// An in-process event emitter.
///
/// Provides:
/// - Named-event listeners ordered by weight, with optional repeat budgets
/// - Wildcard listeners invoked on every emission
/// - Synchronous (`emit`) and sequentially awaited (`emit_async`) dispatch
///
/// Listener failures never reach the caller; they go to the configured
/// [`DiagnosticSink`]. All methods take `&self`, and no internal lock is held
/// while a listener runs, so listeners may register, unregister or emit on the
/// same emitter.
pub struct Emitter<A = serde_json::Value> {
    /// Named-event listeners.
    events: Mutex<EventTable<A>>,

    /// Wildcard listeners.
    wildcards: Mutex<WildcardSet<A>>,

    config: RwLock<EmitterConfig>,

    sink: Arc<dyn DiagnosticSink>,
}

impl<A> Emitter<A> {
    /// Create an emitter with no listener cap, reporting through `tracing`.
    pub fn new() -> Self {
        Self::build(EmitterConfig::default(), Arc::new(TracingSink))
    }

    /// Create an emitter with the given config, reporting through `tracing`.
    pub fn with_config(config: EmitterConfig) -> Result<Self> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create an emitter with the given config and diagnostic sink.
    pub fn with_sink(config: EmitterConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, sink))
    }

    fn build(config: EmitterConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            events: Mutex::new(EventTable::new()),
            wildcards: Mutex::new(WildcardSet::new()),
            config: RwLock::new(config),
            sink,
        }
    }

    // --- Registration ---

    /// Register `listener` for `event` with default options.
    pub fn on(&self, event: &str, listener: &Listener<A>) -> Result<&Self> {
        self.on_with(event, listener, ListenerOptions::default())
    }

    /// Register `listener` for `event`.
    ///
    /// Fails only for an empty event name. A registration that would exceed
    /// the listener cap, or that repeats an existing `(listener, receiver)`
    /// pair, is skipped with a warning.
    pub fn on_with(
        &self,
        event: &str,
        listener: &Listener<A>,
        options: ListenerOptions,
    ) -> Result<&Self> {
        validate_event_name(event)?;

        let ListenerOptions {
            receiver,
            weight,
            repeat,
        } = options;
        let remaining = repeat.initial();
        if remaining.is_exhausted() {
            debug!(event, "listener registered with zero repeats, not stored");
            return Ok(self);
        }

        let limit = self.max_listeners();
        let warning = {
            let mut events = self.events.lock();
            match limit {
                Some(limit) if events.len(event) >= limit => Some(Warning::CapacityExceeded {
                    event: event.to_string(),
                    limit,
                }),
                _ if events.contains(event, listener, receiver.as_ref()) => {
                    Some(Warning::DuplicateListener {
                        event: event.to_string(),
                    })
                }
                _ => {
                    let record = ListenerRecord::new(listener.bind(receiver), weight, remaining);
                    events.insert(event, record);
                    None
                }
            }
        };

        match warning {
            Some(warning) => self.warn(&warning),
            None => trace!(event, weight, ?repeat, "listener added"),
        }
        Ok(self)
    }

    /// Register `listener` to fire on the next emission of `event` only.
    pub fn once(&self, event: &str, listener: &Listener<A>) -> Result<&Self> {
        self.once_with(event, listener, ListenerOptions::default())
    }

    /// Like [`on_with`](Self::on_with) with a repeat budget of one.
    pub fn once_with(
        &self,
        event: &str,
        listener: &Listener<A>,
        options: ListenerOptions,
    ) -> Result<&Self> {
        self.on_with(event, listener, options.repeat(Repeat::Times(1)))
    }

    /// Register a wildcard listener. Duplicates are skipped with a warning.
    pub fn on_any(&self, listener: &AnyListener<A>) -> &Self {
        let added = self.wildcards.lock().insert(listener);
        if added {
            trace!("wildcard listener added");
        } else {
            self.warn(&Warning::DuplicateAnyListener);
        }
        self
    }

    // --- Removal ---

    /// Remove `listener` registered without a receiver.
    pub fn off(&self, event: &str, listener: &Listener<A>) -> &Self {
        self.off_with(event, listener, None)
    }

    /// Remove every registration of `listener` with exactly this receiver.
    pub fn off_with(
        &self,
        event: &str,
        listener: &Listener<A>,
        receiver: Option<&Receiver>,
    ) -> &Self {
        let removed = self
            .events
            .lock()
            .remove_matching(event, listener, receiver);
        if removed > 0 {
            debug!(event, removed, "listeners removed");
        }
        self
    }

    /// Remove all listeners for `event`.
    pub fn off_event(&self, event: &str) -> &Self {
        let removed = self.events.lock().remove_event(event);
        if removed > 0 {
            debug!(event, removed, "event cleared");
        }
        self
    }

    pub fn off_any(&self, listener: &AnyListener<A>) -> &Self {
        if self.wildcards.lock().remove(listener) {
            trace!("wildcard listener removed");
        }
        self
    }

    /// Remove every listener and wildcard listener. Config is kept.
    pub fn clear(&self) -> &Self {
        self.events.lock().clear();
        self.wildcards.lock().clear();
        debug!("emitter cleared");
        self
    }

    // --- Dispatch ---

    /// Invoke the listeners of `event`, then every wildcard listener.
    ///
    /// Listeners run in weight order against a snapshot taken on entry, so
    /// listeners added while dispatching are not invoked by this call.
    /// Async listeners are polled once; one that is still pending is dropped
    /// with a warning.
    pub fn emit(&self, event: &str, args: A) -> &Self {
        let args = Arc::new(args);
        let snapshot = self.events.lock().snapshot(event);

        let mut exhausted = Vec::new();
        for record in &snapshot {
            if !self.claim(record, &mut exhausted) {
                continue;
            }
            let outcome = record.handler().call(&args);
            self.settle(event, outcome, diagnostics::listener_failed);
        }
        self.drop_exhausted(event, &exhausted);

        let wildcards = self.wildcards.lock().snapshot();
        for wildcard in &wildcards {
            let outcome = wildcard.call(event, &args);
            self.settle(event, outcome, diagnostics::any_listener_failed);
        }
        self
    }

    /// Like [`emit`](Self::emit), awaiting each listener before the next.
    ///
    /// Resolves once every listener and wildcard listener has settled.
    pub async fn emit_async(&self, event: &str, args: A) -> &Self {
        let args = Arc::new(args);
        let snapshot = self.events.lock().snapshot(event);

        let mut exhausted = Vec::new();
        for record in &snapshot {
            if !self.claim(record, &mut exhausted) {
                continue;
            }
            if let Err(cause) = record.handler().call_async(Arc::clone(&args)).await {
                self.report(&diagnostics::listener_failed(event), &cause);
            }
        }
        self.drop_exhausted(event, &exhausted);

        let wildcards = self.wildcards.lock().snapshot();
        if !wildcards.is_empty() {
            let name: Arc<str> = Arc::from(event);
            for wildcard in &wildcards {
                if let Err(cause) = wildcard
                    .call_async(Arc::clone(&name), Arc::clone(&args))
                    .await
                {
                    self.report(&diagnostics::any_listener_failed(event), &cause);
                }
            }
        }
        self
    }

    /// Claim one invocation, scheduling the record for removal if it was the last.
    fn claim(&self, record: &RecordRef<A>, exhausted: &mut Vec<RecordRef<A>>) -> bool {
        match record.claim() {
            Claim::Skip => false,
            Claim::Run => true,
            Claim::Last => {
                exhausted.push(Arc::clone(record));
                true
            }
        }
    }

    fn settle(&self, event: &str, outcome: Invocation, message: fn(&str) -> String) {
        match outcome {
            Invocation::Settled(Ok(())) => {}
            Invocation::Settled(Err(cause)) => self.report(&message(event), &cause),
            Invocation::Pending => self.warn(&Warning::PendingAsync {
                event: event.to_string(),
            }),
        }
    }

    fn drop_exhausted(&self, event: &str, exhausted: &[RecordRef<A>]) {
        if exhausted.is_empty() {
            return;
        }
        let removed = self.events.lock().remove_records(event, exhausted);
        trace!(event, removed, "exhausted listeners removed");
    }

    // A panicking sink is ignored; dispatch must not depend on it.
    fn warn(&self, warning: &Warning) {
        let message = warning.to_string();
        let _ = catch_unwind(AssertUnwindSafe(|| self.sink.warn(&message)));
    }

    fn report(&self, message: &str, cause: &HandlerError) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.sink.error(message, cause)));
    }

    // --- Introspection ---

    /// Number of live listeners for `event` (0 if unknown).
    pub fn listener_count(&self, event: &str) -> usize {
        self.events.lock().len(event)
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Events with at least one listener, in order of first registration.
    pub fn event_names(&self) -> Vec<String> {
        self.events.lock().names()
    }

    /// Bound handlers for `event` in dispatch order. A copy, not a live view.
    pub fn listeners(&self, event: &str) -> Vec<BoundHandler<A>> {
        self.events.lock().handlers(event)
    }

    pub fn any_listener_count(&self) -> usize {
        self.wildcards.lock().len()
    }

    /// Wildcard listeners in insertion order. A copy, not a live view.
    pub fn any_listeners(&self) -> Vec<AnyListener<A>> {
        self.wildcards.lock().snapshot()
    }

    // --- Configuration ---

    pub fn max_listeners(&self) -> Option<usize> {
        self.config.read().max_listeners_per_event
    }

    /// Change the per-event cap. Existing listeners above a lowered cap are kept.
    pub fn set_max_listeners(&self, limit: Option<usize>) -> Result<&Self> {
        validate_max_listeners(limit)?;
        self.config.write().max_listeners_per_event = limit;
        Ok(self)
    }

    pub fn config(&self) -> EmitterConfig {
        self.config.read().clone()
    }
}

impl<A> Default for Emitter<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Emitter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("events", &self.event_names())
            .field("any_listeners", &self.any_listener_count())
            .field("config", &self.config())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerResult;

    #[derive(Default)]
    struct RecordingSink {
        warnings: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn warn(&self, message: &str) {
            self.warnings.lock().push(message.to_string());
        }

        fn error(&self, message: &str, cause: &HandlerError) {
            self.errors.lock().push(format!("{message}: {cause}"));
        }
    }

    fn emitter_with_sink() -> (Arc<Emitter<u32>>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let emitter = Emitter::with_sink(EmitterConfig::default(), sink.clone()).unwrap();
        (Arc::new(emitter), sink)
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Listener<u32> {
        let log = Arc::clone(log);
        Listener::new(move |args: &u32| -> HandlerResult {
            log.lock().push(format!("{tag}{args}"));
            Ok(())
        })
    }

    #[test]
    fn test_calls_chain() {
        let emitter = Emitter::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&log, "a");

        emitter
            .on("x", &a)
            .unwrap()
            .emit("x", 1)
            .emit("x", 2)
            .off("x", &a)
            .emit("x", 3);

        assert_eq!(*log.lock(), vec!["a1", "a2"]);
    }

    #[test]
    fn test_zero_repeat_is_never_stored() {
        let (emitter, sink) = emitter_with_sink();
        let log = Arc::new(Mutex::new(Vec::new()));
        emitter
            .on_with(
                "x",
                &recorder(&log, "a"),
                ListenerOptions::new().repeat(Repeat::Times(0)),
            )
            .unwrap();

        assert_eq!(emitter.listener_count("x"), 0);
        emitter.emit("x", 1);
        assert!(log.lock().is_empty());
        assert!(sink.warnings.lock().is_empty());
    }

    #[test]
    fn test_exhaustion_deletes_event_key() {
        let (emitter, _) = emitter_with_sink();
        let log = Arc::new(Mutex::new(Vec::new()));
        emitter.once("x", &recorder(&log, "a")).unwrap();
        assert_eq!(emitter.event_names(), vec!["x".to_string()]);

        emitter.emit("x", 1);
        assert!(emitter.event_names().is_empty());
        assert!(!emitter.has_listeners("x"));
    }

    #[test]
    fn test_listener_added_during_dispatch_waits_for_next_emit() {
        let (emitter, _) = emitter_with_sink();
        let log = Arc::new(Mutex::new(Vec::new()));
        let late = recorder(&log, "late");

        let weak = Arc::downgrade(&emitter);
        let adder = Listener::new(move |_: &u32| -> HandlerResult {
            if let Some(emitter) = weak.upgrade() {
                emitter.on("x", &late)?;
            }
            Ok(())
        });
        emitter.on("x", &adder).unwrap();

        emitter.emit("x", 1);
        assert!(log.lock().is_empty());
        assert_eq!(emitter.listener_count("x"), 2);

        emitter.emit("x", 2);
        assert_eq!(*log.lock(), vec!["late2"]);
    }

    #[test]
    fn test_listener_removed_during_dispatch_still_runs_this_cycle() {
        let (emitter, _) = emitter_with_sink();
        let log = Arc::new(Mutex::new(Vec::new()));
        let victim = recorder(&log, "victim");

        let weak = Arc::downgrade(&emitter);
        let victim_handle = victim.clone();
        let remover = Listener::new(move |_: &u32| -> HandlerResult {
            if let Some(emitter) = weak.upgrade() {
                emitter.off("x", &victim_handle);
            }
            Ok(())
        });
        emitter
            .on_with("x", &remover, ListenerOptions::new().weight(10))
            .unwrap();
        emitter.on("x", &victim).unwrap();

        emitter.emit("x", 1);
        emitter.emit("x", 2);
        assert_eq!(*log.lock(), vec!["victim1"]);
        assert_eq!(emitter.listener_count("x"), 1);
    }

    #[test]
    fn test_reentrant_emit_respects_once() {
        let (emitter, _) = emitter_with_sink();
        let fired = Arc::new(Mutex::new(0u32));

        let weak = Arc::downgrade(&emitter);
        let fired_in = Arc::clone(&fired);
        let reentrant = Listener::new(move |args: &u32| -> HandlerResult {
            *fired_in.lock() += 1;
            if *args == 0 {
                if let Some(emitter) = weak.upgrade() {
                    emitter.emit("x", 1);
                }
            }
            Ok(())
        });
        emitter.once("x", &reentrant).unwrap();

        emitter.emit("x", 0);
        assert_eq!(*fired.lock(), 1);
        assert_eq!(emitter.listener_count("x"), 0);
    }

    #[test]
    fn test_once_listener_can_rearm_itself() {
        let (emitter, sink) = emitter_with_sink();
        let fired = Arc::new(Mutex::new(0u32));
        let slot: Arc<Mutex<Option<Listener<u32>>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&emitter);
        let fired_in = Arc::clone(&fired);
        let slot_in = Arc::clone(&slot);
        let rearm = Listener::new(move |_: &u32| -> HandlerResult {
            *fired_in.lock() += 1;
            let me = slot_in.lock().clone();
            if let (Some(emitter), Some(me)) = (weak.upgrade(), me) {
                emitter.once("x", &me)?;
            }
            Ok(())
        });
        *slot.lock() = Some(rearm.clone());
        emitter.once("x", &rearm).unwrap();

        emitter.emit("x", 1);
        assert_eq!(emitter.listener_count("x"), 1);
        assert!(sink.warnings.lock().is_empty());

        emitter.emit("x", 2);
        assert_eq!(*fired.lock(), 2);
        assert_eq!(emitter.listener_count("x"), 1);

        // Break the self-reference cycle.
        slot.lock().take();
    }

    #[test]
    fn test_exhausted_listener_frees_its_slot_during_dispatch() {
        let (emitter, _) = emitter_with_sink();
        emitter.set_max_listeners(Some(1)).unwrap();
        let counts = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&emitter);
        let counts_in = Arc::clone(&counts);
        let counter = Listener::new(move |_: &u32| -> HandlerResult {
            if let Some(emitter) = weak.upgrade() {
                counts_in.lock().push(emitter.listener_count("x"));
                emitter.on("x", &Listener::new(|_| Ok(())))?;
            }
            Ok(())
        });
        emitter.once("x", &counter).unwrap();

        emitter.emit("x", 1);
        assert_eq!(*counts.lock(), vec![0]);
        assert_eq!(emitter.listener_count("x"), 1);
    }

    #[test]
    fn test_pending_async_in_sync_emit_warns() {
        let (emitter, sink) = emitter_with_sink();
        let listener = Listener::<u32>::new_async(|_| async {
            futures::future::pending::<()>().await;
            Ok(())
        });
        emitter.on("x", &listener).unwrap();

        emitter.emit("x", 1);
        let warnings = sink.warnings.lock();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("emit_async"));
    }

    #[test]
    fn test_set_max_listeners() {
        let emitter = Emitter::<u32>::new();
        assert_eq!(emitter.max_listeners(), None);
        emitter.set_max_listeners(Some(3)).unwrap();
        assert_eq!(emitter.config(), EmitterConfig::with_max_listeners(3));
        assert!(matches!(
            emitter.set_max_listeners(Some(0)),
            Err(EmitterError::InvalidArgument(_))
        ));
        assert_eq!(emitter.max_listeners(), Some(3));
    }

    #[test]
    fn test_config_from_json() {
        let config = EmitterConfig::from_json(r#"{"max_listeners_per_event": 4}"#).unwrap();
        assert_eq!(config.max_listeners_per_event, Some(4));

        let config = EmitterConfig::from_json("{}").unwrap();
        assert_eq!(config, EmitterConfig::default());

        assert!(matches!(
            EmitterConfig::from_json(r#"{"max_listeners_per_event": 0}"#),
            Err(EmitterError::InvalidArgument(_))
        ));
        assert!(matches!(
            EmitterConfig::from_json("not json"),
            Err(EmitterError::Config(_))
        ));
    }

    #[test]
    fn test_debug_lists_events() {
        let emitter = Emitter::<u32>::new();
        emitter.on("ready", &Listener::new(|_| Ok(()))).unwrap();
        let rendered = format!("{:?}", emitter);
        assert!(rendered.contains("ready"));
    }
}
