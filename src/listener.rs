//! Listener handles and their invocation.
//!
//! A [`Listener`] wraps a caller-supplied callback. Cloning a listener shares
//! its identity, which is what [`Emitter::off`](crate::Emitter::off) and
//! duplicate detection compare against. Registration binds a listener to an
//! optional [`Receiver`], producing a [`BoundHandler`] that needs only the
//! emitted arguments to run.
//!
//! Every invocation is isolated: returned errors and panics are converted to
//! [`HandlerError`] instead of unwinding into the dispatcher.

use crate::error::{HandlerError, HandlerResult};
use crate::types::Receiver;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type SyncFn<A> = dyn Fn(Option<&Receiver>, &A) -> HandlerResult + Send + Sync;
type AsyncFn<A> =
    dyn Fn(Option<Receiver>, Arc<A>) -> BoxFuture<'static, HandlerResult> + Send + Sync;

type AnySyncFn<A> = dyn Fn(&str, &A) -> HandlerResult + Send + Sync;
type AnyAsyncFn<A> = dyn Fn(Arc<str>, Arc<A>) -> BoxFuture<'static, HandlerResult> + Send + Sync;

enum Callback<S: ?Sized, F: ?Sized> {
    Sync(Box<S>),
    Async(Box<F>),
}

/// Outcome of invoking a listener without awaiting it.
#[derive(Debug)]
pub enum Invocation {
    /// The listener ran to completion.
    Settled(Result<(), HandlerError>),
    /// An async listener did not finish on its first poll; its future was dropped.
    Pending,
}

impl Invocation {
    fn poll_once(future: BoxFuture<'static, HandlerResult>) -> Self {
        match AssertUnwindSafe(future).catch_unwind().now_or_never() {
            Some(outcome) => Invocation::Settled(settle(outcome)),
            None => Invocation::Pending,
        }
    }
}

fn settle(outcome: std::thread::Result<HandlerResult>) -> Result<(), HandlerError> {
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(HandlerError::Failed(e)),
        Err(payload) => Err(HandlerError::from_panic(payload)),
    }
}

async fn settle_future(
    created: std::thread::Result<BoxFuture<'static, HandlerResult>>,
) -> Result<(), HandlerError> {
    match created {
        Ok(future) => settle(AssertUnwindSafe(future).catch_unwind().await),
        Err(payload) => Err(HandlerError::from_panic(payload)),
    }
}

/// A callback registered against a named event.
pub struct Listener<A> {
    callback: Arc<Callback<SyncFn<A>, AsyncFn<A>>>,
}

impl<A> Clone for Listener<A> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<A> fmt::Debug for Listener<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &Arc::as_ptr(&self.callback))
            .field("async", &self.is_async())
            .finish()
    }
}

impl<A: Send + Sync + 'static> Listener<A> {
    /// Synchronous listener that ignores any receiver.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&A) -> HandlerResult + Send + Sync + 'static,
    {
        Self::with_receiver(move |_: Option<&Receiver>, args: &A| f(args))
    }

    /// Synchronous listener that is handed the receiver it was bound to.
    pub fn with_receiver<F>(f: F) -> Self
    where
        F: Fn(Option<&Receiver>, &A) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(Callback::Sync(Box::new(f))),
        }
    }

    /// Asynchronous listener that ignores any receiver.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::with_receiver_async(move |_: Option<Receiver>, args: Arc<A>| f(args))
    }

    /// Asynchronous listener that is handed the receiver it was bound to.
    pub fn with_receiver_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Option<Receiver>, Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let boxed = move |receiver: Option<Receiver>, args: Arc<A>| {
            Box::pin(f(receiver, args)) as BoxFuture<'static, HandlerResult>
        };
        Self {
            callback: Arc::new(Callback::Async(Box::new(boxed))),
        }
    }
}

impl<A> Listener<A> {
    pub fn is_async(&self) -> bool {
        matches!(*self.callback, Callback::Async(_))
    }

    /// Whether both handles refer to the same registered callback.
    pub fn same_as(&self, other: &Listener<A>) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }

    /// Capture `receiver` together with this listener.
    pub fn bind(&self, receiver: Option<Receiver>) -> BoundHandler<A> {
        BoundHandler {
            listener: self.clone(),
            receiver,
        }
    }
}

/// A listener with its receiver captured at registration time.
pub struct BoundHandler<A> {
    listener: Listener<A>,
    receiver: Option<Receiver>,
}

impl<A> Clone for BoundHandler<A> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

impl<A> fmt::Debug for BoundHandler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("listener", &self.listener)
            .field("bound", &self.receiver.is_some())
            .finish()
    }
}

impl<A> BoundHandler<A> {
    /// The unbound listener this handler was created from.
    pub fn listener(&self) -> &Listener<A> {
        &self.listener
    }

    pub fn receiver(&self) -> Option<&Receiver> {
        self.receiver.as_ref()
    }

    /// Run without awaiting. Async listeners are polled exactly once.
    pub fn call(&self, args: &Arc<A>) -> Invocation {
        match &*self.listener.callback {
            Callback::Sync(f) => Invocation::Settled(settle(catch_unwind(AssertUnwindSafe(
                || f(self.receiver.as_ref(), &**args),
            )))),
            Callback::Async(f) => {
                match catch_unwind(AssertUnwindSafe(|| {
                    f(self.receiver.clone(), Arc::clone(args))
                })) {
                    Ok(future) => Invocation::poll_once(future),
                    Err(payload) => Invocation::Settled(Err(HandlerError::from_panic(payload))),
                }
            }
        }
    }

    /// Run and await completion.
    pub async fn call_async(&self, args: Arc<A>) -> Result<(), HandlerError> {
        match &*self.listener.callback {
            Callback::Sync(f) => settle(catch_unwind(AssertUnwindSafe(|| {
                f(self.receiver.as_ref(), &*args)
            }))),
            Callback::Async(f) => {
                let created = catch_unwind(AssertUnwindSafe(|| f(self.receiver.clone(), args)));
                settle_future(created).await
            }
        }
    }
}

/// A wildcard callback, invoked on every emission with the event name.
pub struct AnyListener<A> {
    callback: Arc<Callback<AnySyncFn<A>, AnyAsyncFn<A>>>,
}

impl<A> Clone for AnyListener<A> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<A> fmt::Debug for AnyListener<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyListener")
            .field("id", &Arc::as_ptr(&self.callback))
            .field("async", &self.is_async())
            .finish()
    }
}

impl<A: Send + Sync + 'static> AnyListener<A> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &A) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(Callback::Sync(Box::new(f))),
        }
    }

    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<str>, Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let boxed = move |event: Arc<str>, args: Arc<A>| {
            Box::pin(f(event, args)) as BoxFuture<'static, HandlerResult>
        };
        Self {
            callback: Arc::new(Callback::Async(Box::new(boxed))),
        }
    }
}

impl<A> AnyListener<A> {
    pub fn is_async(&self) -> bool {
        matches!(*self.callback, Callback::Async(_))
    }

    pub fn same_as(&self, other: &AnyListener<A>) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }

    /// Run without awaiting. Async listeners are polled exactly once.
    pub fn call(&self, event: &str, args: &Arc<A>) -> Invocation {
        match &*self.callback {
            Callback::Sync(f) => {
                Invocation::Settled(settle(catch_unwind(AssertUnwindSafe(|| f(event, &**args)))))
            }
            Callback::Async(f) => {
                match catch_unwind(AssertUnwindSafe(|| f(Arc::from(event), Arc::clone(args)))) {
                    Ok(future) => Invocation::poll_once(future),
                    Err(payload) => Invocation::Settled(Err(HandlerError::from_panic(payload))),
                }
            }
        }
    }

    /// Run and await completion.
    pub async fn call_async(&self, event: Arc<str>, args: Arc<A>) -> Result<(), HandlerError> {
        match &*self.callback {
            Callback::Sync(f) => settle(catch_unwind(AssertUnwindSafe(|| f(&*event, &*args)))),
            Callback::Async(f) => {
                let created = catch_unwind(AssertUnwindSafe(|| f(event, args)));
                settle_future(created).await
            }
        }
    }
}
