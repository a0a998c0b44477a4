//! Listener storage owned by an [`Emitter`](crate::Emitter).
//!
//! - [`EventTable`]: event name to weight-ordered listener records
//! - [`WildcardSet`]: listeners invoked on every emission
//!
//! Neither type locks on its own. The emitter wraps each in a mutex and never
//! holds the lock while a listener runs.

mod table;
mod wildcard;

pub(crate) use table::{Claim, EventTable, ListenerRecord, RecordRef};
pub(crate) use wildcard::WildcardSet;
