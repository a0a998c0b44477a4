//! Wildcard listener set.

use crate::listener::AnyListener;

/// Identity-deduplicated wildcard listeners in insertion order.
pub(crate) struct WildcardSet<A> {
    listeners: Vec<AnyListener<A>>,
}

impl<A> Default for WildcardSet<A> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<A> WildcardSet<A> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a listener. Returns `false` if it was already present.
    pub(crate) fn insert(&mut self, listener: &AnyListener<A>) -> bool {
        if self.listeners.iter().any(|l| l.same_as(listener)) {
            return false;
        }
        self.listeners.push(listener.clone());
        true
    }

    /// Remove a listener. Returns `false` if it was not present.
    pub(crate) fn remove(&mut self, listener: &AnyListener<A>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !l.same_as(listener));
        self.listeners.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<AnyListener<A>> {
        self.listeners.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }
}
