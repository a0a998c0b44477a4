//! # Herald
//!
//! An in-process event emitter: named-event listeners with priorities and
//! repeat budgets, wildcard listeners, and synchronous or sequentially awaited
//! dispatch.
//!
//! ## Core Concepts
//!
//! - **Listeners**: Callbacks registered against an event name, ordered by
//!   weight (higher first, ties in registration order)
//! - **Repeat budgets**: Unlimited, or a fixed number of invocations after
//!   which the listener is removed
//! - **Receivers**: Optional context bound to a listener at registration
//! - **Wildcard listeners**: Invoked on every emission with the event name
//! - **Isolation**: A failing or panicking listener is reported to a
//!   [`DiagnosticSink`] and never stops delivery to the others
//!
//! ## Example
//!
//! ```ignore
//! use herald::{AnyListener, Emitter, Listener, ListenerOptions};
//!
//! let emitter: Emitter<String> = Emitter::new();
//!
//! let greet = Listener::new(|name: &String| {
//!     println!("hello, {name}");
//!     Ok(())
//! });
//! emitter.on("join", &greet)?;
//! emitter.once_with("join", &Listener::new(|_| Ok(())), ListenerOptions::new().weight(10))?;
//! emitter.on_any(&AnyListener::new(|event, _| {
//!     println!("saw {event}");
//!     Ok(())
//! }));
//!
//! emitter.emit("join", "ada".to_string());
//! emitter.emit_async("join", "grace".to_string()).await;
//!
//! emitter.off("join", &greet);
//! ```

pub mod diagnostics;
pub mod emitter;
pub mod error;
pub mod listener;
mod registry;
pub mod types;

// Re-exports
pub use diagnostics::{DiagnosticSink, TracingSink, Warning};
pub use emitter::{Emitter, EmitterConfig};
pub use error::{BoxError, EmitterError, HandlerError, HandlerResult, Result};
pub use listener::{AnyListener, BoundHandler, Invocation, Listener};
pub use types::{ListenerOptions, Receiver, Repeat, DEFAULT_WEIGHT};
