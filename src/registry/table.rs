//! Event table: event name to weight-ordered listener records.

use crate::listener::{BoundHandler, Listener};
use crate::types::{same_receiver, Receiver, Remaining};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of claiming one invocation from a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Claim {
    /// Already exhausted; do not invoke.
    Skip,
    Run,
    /// Invoke; this was the last one, schedule the record for removal.
    Last,
}

/// One registered subscription.
pub(crate) struct ListenerRecord<A> {
    /// Listener bound to its receiver. Also carries the original listener
    /// and receiver for identity matching.
    handler: BoundHandler<A>,
    weight: i32,
    /// Shared between the live table and in-flight dispatch snapshots.
    remaining: Mutex<Remaining>,
}

impl<A> ListenerRecord<A> {
    pub(crate) fn new(handler: BoundHandler<A>, weight: i32, remaining: Remaining) -> Self {
        Self {
            handler,
            weight,
            remaining: Mutex::new(remaining),
        }
    }

    pub(crate) fn handler(&self) -> &BoundHandler<A> {
        &self.handler
    }

    pub(crate) fn weight(&self) -> i32 {
        self.weight
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> Remaining {
        *self.remaining.lock()
    }

    /// Exhausted records stay in the list until the dispatch that used up
    /// their budget removes them, but no longer count as registered.
    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining.lock().is_exhausted()
    }

    pub(crate) fn claim(&self) -> Claim {
        let mut remaining = self.remaining.lock();
        if !remaining.claim() {
            Claim::Skip
        } else if remaining.is_exhausted() {
            Claim::Last
        } else {
            Claim::Run
        }
    }

    fn matches(&self, listener: &Listener<A>, receiver: Option<&Receiver>) -> bool {
        self.handler.listener().same_as(listener)
            && same_receiver(self.handler.receiver(), receiver)
    }
}

pub(crate) type RecordRef<A> = Arc<ListenerRecord<A>>;

/// Mapping from event name to a non-empty, weight-ordered record list.
///
/// A key is deleted as soon as its list would become empty. Key order is the
/// order in which events first gained a listener.
pub(crate) struct EventTable<A> {
    events: HashMap<String, Vec<RecordRef<A>>>,
    order: Vec<String>,
}

impl<A> Default for EventTable<A> {
    fn default() -> Self {
        Self {
            events: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<A> EventTable<A> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of records that can still fire.
    pub(crate) fn len(&self, event: &str) -> usize {
        self.events
            .get(event)
            .map_or(0, |records| records.iter().filter(|r| !r.is_exhausted()).count())
    }

    /// Copy of the record list, in dispatch order.
    pub(crate) fn snapshot(&self, event: &str) -> Vec<RecordRef<A>> {
        self.events.get(event).cloned().unwrap_or_default()
    }

    pub(crate) fn handlers(&self, event: &str) -> Vec<BoundHandler<A>> {
        self.events
            .get(event)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| !r.is_exhausted())
                    .map(|r| r.handler().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn contains(
        &self,
        event: &str,
        listener: &Listener<A>,
        receiver: Option<&Receiver>,
    ) -> bool {
        self.events
            .get(event)
            .is_some_and(|records| {
                records
                    .iter()
                    .any(|r| !r.is_exhausted() && r.matches(listener, receiver))
            })
    }

    /// Insert before the first record with strictly lower weight.
    pub(crate) fn insert(&mut self, event: &str, record: ListenerRecord<A>) {
        if !self.events.contains_key(event) {
            self.order.push(event.to_string());
        }
        let records = self.events.entry(event.to_string()).or_default();
        let position = records
            .iter()
            .position(|r| r.weight() < record.weight())
            .unwrap_or(records.len());
        records.insert(position, Arc::new(record));
    }

    /// Remove every record matching the exact `(listener, receiver)` pair.
    pub(crate) fn remove_matching(
        &mut self,
        event: &str,
        listener: &Listener<A>,
        receiver: Option<&Receiver>,
    ) -> usize {
        self.remove_where(event, |r| r.matches(listener, receiver))
    }

    /// Remove the given records (by identity) from the live list.
    pub(crate) fn remove_records(&mut self, event: &str, records: &[RecordRef<A>]) -> usize {
        self.remove_where(event, |r| records.iter().any(|x| Arc::ptr_eq(r, x)))
    }

    /// Drop the whole entry for `event`.
    pub(crate) fn remove_event(&mut self, event: &str) -> usize {
        match self.events.remove(event) {
            Some(records) => {
                self.order.retain(|name| name != event);
                records.len()
            }
            None => 0,
        }
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.len(name) > 0)
            .cloned()
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.order.clear();
    }

    fn remove_where<F>(&mut self, event: &str, predicate: F) -> usize
    where
        F: Fn(&RecordRef<A>) -> bool,
    {
        let Some(records) = self.events.get_mut(event) else {
            return 0;
        };
        let before = records.len();
        records.retain(|r| !predicate(r));
        let removed = before - records.len();
        if records.is_empty() {
            self.remove_event(event);
        }
        removed
    }
}
