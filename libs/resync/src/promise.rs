// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Awaitable values a coroutine can yield directly.
//!
//! Any type implementing [`Awaitable`] can be yielded through
//! [`Yielded::Awaitable`](crate::Yielded::Awaitable), the dispatcher enqueues a completion
//! token for it and registers continuations that settle that token. This module also provides
//! [`Promise`], a minimal single-threaded promise built on a oneshot-style shared slot.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::{fmt, mem};

/// The capability of settling exactly once, with either a value or a failure.
///
/// Implementations must call *at most one* of the two continuations, at most once. They may
/// do so synchronously from within `on_settle` or at any later point.
pub trait Awaitable<T> {
    fn on_settle(
        self: Box<Self>,
        on_success: Box<dyn FnOnce(T)>,
        on_failure: Box<dyn FnOnce(anyhow::Error)>,
    );
}

/// The [`Resolver`] of a [`Promise`] was dropped before settling it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Canceled(());

impl fmt::Display for Canceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("promise resolver dropped without settling")
    }
}

impl core::error::Error for Canceled {}

/// Create a new pending promise and the resolver that settles it.
pub fn promise<T>() -> (Resolver<T>, Promise<T>) {
    let inner = Rc::new(RefCell::new(State::Pending(None)));

    let resolver = Resolver {
        inner: Some(inner.clone()),
    };
    let promise = Promise { inner };

    (resolver, promise)
}

/// A single-threaded promise, settled through its [`Resolver`].
pub struct Promise<T> {
    inner: Rc<RefCell<State<T>>>,
}

/// The settling half of a [`Promise`].
///
/// Dropping a resolver without settling rejects the promise with [`Canceled`].
pub struct Resolver<T> {
    inner: Option<Rc<RefCell<State<T>>>>,
}

enum State<T> {
    Pending(Option<Continuation<T>>),
    Settled(anyhow::Result<T>),
    Consumed,
}

struct Continuation<T> {
    on_success: Box<dyn FnOnce(T)>,
    on_failure: Box<dyn FnOnce(anyhow::Error)>,
}

impl<T> Continuation<T> {
    fn call(self, outcome: anyhow::Result<T>) {
        match outcome {
            Ok(value) => (self.on_success)(value),
            Err(failure) => (self.on_failure)(failure),
        }
    }
}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Pending(None) => f.pad("pending"),
            State::Pending(Some(_)) => f.pad("pending (observed)"),
            State::Settled(Ok(_)) => f.pad("resolved"),
            State::Settled(Err(_)) => f.pad("rejected"),
            State::Consumed => f.pad("consumed"),
        }
    }
}

// === impl Promise ===

impl<T> Promise<T> {
    /// A promise that is already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(State::Settled(Ok(value)))),
        }
    }

    /// A promise that is already rejected with `failure`.
    pub fn rejected(failure: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(State::Settled(Err(failure.into())))),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(*self.inner.borrow(), State::Settled(_))
    }
}

impl<T> Awaitable<T> for Promise<T> {
    fn on_settle(
        self: Box<Self>,
        on_success: Box<dyn FnOnce(T)>,
        on_failure: Box<dyn FnOnce(anyhow::Error)>,
    ) {
        let continuation = Continuation {
            on_success,
            on_failure,
        };

        let settled = {
            let mut state = self.inner.borrow_mut();
            match mem::replace(&mut *state, State::Consumed) {
                State::Settled(outcome) => Some((continuation, outcome)),
                State::Pending(_) => {
                    *state = State::Pending(Some(continuation));
                    None
                }
                State::Consumed => None,
            }
        };

        // continuations run outside the borrow, they are free to touch the promise again
        if let Some((continuation, outcome)) = settled {
            continuation.call(outcome);
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &*self.inner.borrow())
            .finish()
    }
}

// === impl Resolver ===

impl<T> Resolver<T> {
    /// Returns true if nobody can observe this resolver's promise anymore.
    pub fn is_closed(&self) -> bool {
        self.inner.as_ref().is_none_or(|inner| {
            Rc::strong_count(inner) == 1 && matches!(*inner.borrow(), State::Pending(None))
        })
    }

    /// Resolve the promise with `value`.
    ///
    /// # Errors
    ///
    /// Returns `value` back if the promise was dropped without anyone observing it.
    pub fn resolve(mut self, value: T) -> Result<(), T> {
        match self.deliver(Ok(value)) {
            Some(Ok(value)) => Err(value),
            _ => Ok(()),
        }
    }

    /// Reject the promise with `failure`.
    ///
    /// # Errors
    ///
    /// Returns the failure back if the promise was dropped without anyone observing it.
    pub fn reject(mut self, failure: impl Into<anyhow::Error>) -> Result<(), anyhow::Error> {
        match self.deliver(Err(failure.into())) {
            Some(Err(failure)) => Err(failure),
            _ => Ok(()),
        }
    }

    /// Hand `outcome` to the promise. Returns the outcome back if nobody is listening.
    fn deliver(&mut self, outcome: anyhow::Result<T>) -> Option<anyhow::Result<T>> {
        let inner = self.inner.take()?;

        let continuation = {
            let mut state = inner.borrow_mut();
            match mem::replace(&mut *state, State::Consumed) {
                State::Pending(Some(continuation)) => continuation,
                State::Pending(None) if Rc::strong_count(&inner) == 1 => {
                    tracing::trace!("promise dropped before it was settled");
                    return Some(outcome);
                }
                State::Pending(None) => {
                    *state = State::Settled(outcome);
                    return None;
                }
                other => {
                    *state = other;
                    return None;
                }
            }
        };

        continuation.call(outcome);
        None
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            self.deliver(Err(Canceled(()).into()));
        }
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Resolver");
        match &self.inner {
            Some(inner) => s.field("state", &*inner.borrow()),
            None => s.field("state", &"settled"),
        };
        s.finish()
    }
}
