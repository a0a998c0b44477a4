//! Core types for the event registry.

use crate::error::{EmitterError, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// Weight given to listeners registered without an explicit one.
pub const DEFAULT_WEIGHT: i32 = 1;

/// Opaque receiver context a listener is bound to at registration.
///
/// Receivers are compared by pointer identity: two receivers match only when
/// they are clones of the same `Arc`.
pub type Receiver = Arc<dyn Any + Send + Sync>;

/// Identity comparison for optional receivers. Absence matches absence.
pub(crate) fn same_receiver(a: Option<&Receiver>, b: Option<&Receiver>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Reject event names that cannot be registered.
pub(crate) fn validate_event_name(event: &str) -> Result<()> {
    if event.is_empty() {
        return Err(EmitterError::InvalidArgument(
            "event name must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

/// How many times a listener may fire before it is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    /// Never removed automatically.
    #[default]
    Unlimited,
    /// Fires on the next `n` emissions. `Times(0)` never fires.
    Times(u32),
}

impl Repeat {
    /// Interpret a plain repeat count, where `0` means "forever".
    pub fn from_count(count: u32) -> Self {
        if count == 0 {
            Repeat::Unlimited
        } else {
            Repeat::Times(count)
        }
    }

    pub(crate) fn initial(self) -> Remaining {
        match self {
            Repeat::Unlimited => Remaining::Unlimited,
            Repeat::Times(0) => Remaining::Exhausted,
            Repeat::Times(n) => Remaining::Count(n),
        }
    }
}

/// Live repeat budget of a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Remaining {
    Unlimited,
    Count(u32),
    /// Terminal: skipped on dispatch and removed at the end of the cycle.
    Exhausted,
}

impl Remaining {
    pub(crate) fn is_exhausted(self) -> bool {
        matches!(self, Remaining::Exhausted)
    }

    /// Take one invocation from the budget.
    ///
    /// Returns `false` when nothing is left, in which case the listener must
    /// not be invoked.
    pub(crate) fn claim(&mut self) -> bool {
        match *self {
            Remaining::Unlimited => true,
            Remaining::Count(n) => {
                *self = if n <= 1 {
                    Remaining::Exhausted
                } else {
                    Remaining::Count(n - 1)
                };
                true
            }
            Remaining::Exhausted => false,
        }
    }
}

/// Per-registration options.
#[derive(Clone, Debug)]
pub struct ListenerOptions {
    /// Receiver the listener is bound to (None = unbound).
    pub receiver: Option<Receiver>,

    /// Priority. Higher runs earlier.
    /// Default: 1
    pub weight: i32,

    /// Repeat policy.
    /// Default: unlimited
    pub repeat: Repeat,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            receiver: None,
            weight: DEFAULT_WEIGHT,
            repeat: Repeat::Unlimited,
        }
    }
}

impl ListenerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }
}
