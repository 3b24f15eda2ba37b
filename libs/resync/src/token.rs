// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Completion tokens and the `Wait` factory handed to coroutines.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

/// Transform applied to a token's failure before it is recorded.
pub(crate) type Recover<T> = Box<dyn FnOnce(anyhow::Error) -> anyhow::Result<T>>;

/// The session side of a completion token.
///
/// [`Wait`] and [`Settle`] only know the item type of the session they belong to, this trait
/// erases the coroutine type behind it.
pub(crate) trait Dispatch<T> {
    /// Reserve the next position in the operation queue.
    fn enqueue(&self, origin: Origin, recover: Option<Recover<T>>) -> TokenId;
    /// Record the outcome of token `id` and give the dispatcher a chance to run.
    fn settle(self: Rc<Self>, id: TokenId, outcome: anyhow::Result<Vec<T>>);
}

/// An opaque ID that uniquely identifies a completion token within its session.
///
/// IDs are handed out in request order and never reused within a session, so they remain a
/// stable key for settlement no matter how many tokens were requested or drained since.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TokenId(u64);

impl TokenId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a token came from. Only used for diagnostics.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Origin {
    /// The token that primes the first dispatch, before the coroutine ran at all.
    Start,
    /// Requested through [`Wait::token`].
    Callback,
    /// Created for an awaitable the coroutine yielded.
    Promise,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Start => f.pad("start"),
            Origin::Callback => f.pad("callback"),
            Origin::Promise => f.pad("promise"),
        }
    }
}

/// Per-token configuration accepted by [`Wait::token_with`].
pub struct TokenOptions<T> {
    pub(crate) on_failure: Option<Recover<T>>,
}

impl<T> TokenOptions<T> {
    pub fn new() -> Self {
        Self { on_failure: None }
    }

    /// Transform the token's failure before it reaches the coroutine.
    ///
    /// Returning `Ok(value)` recovers the operation, the coroutine is resumed with `value` as
    /// if the operation had succeeded with that single result. Returning `Err` replaces the
    /// original failure.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(anyhow::Error) -> anyhow::Result<T> + 'static,
    {
        self.on_failure = Some(Box::new(f));
        self
    }
}

impl<T> Default for TokenOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TokenOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenOptions")
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// The suspension-request primitive injected into every coroutine.
///
/// Each call to [`Wait::token`] synchronously reserves the next position in the session's
/// operation queue and returns the [`Settle`] handle that completes it. The coroutine is
/// resumed with the outcomes in the order the tokens were *requested*, regardless of the
/// order in which they settle.
pub struct Wait<T> {
    session: Weak<dyn Dispatch<T>>,
}

impl<T> Wait<T> {
    pub(crate) fn new(session: Weak<dyn Dispatch<T>>) -> Self {
        Self { session }
    }

    /// Request a new suspension point.
    pub fn token(&self) -> Settle<T> {
        self.token_with(TokenOptions::new())
    }

    /// Request a new suspension point with custom [`TokenOptions`].
    pub fn token_with(&self, options: TokenOptions<T>) -> Settle<T> {
        let Some(session) = self.session.upgrade() else {
            tracing::debug!("session is gone, handing out a detached token");
            return Settle {
                session: None,
                id: TokenId::new(u64::MAX),
            };
        };

        let id = session.enqueue(Origin::Callback, options.on_failure);
        Settle {
            session: Some(session),
            id,
        }
    }
}

impl<T> Clone for Wait<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<T> fmt::Debug for Wait<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("live", &(self.session.strong_count() > 0))
            .finish()
    }
}

/// Settles one completion token.
///
/// The first settlement through any clone of a `Settle` is recorded, every later one is
/// ignored. Holding a `Settle` keeps its session alive.
pub struct Settle<T> {
    session: Option<Rc<dyn Dispatch<T>>>,
    id: TokenId,
}

impl<T> Settle<T> {
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Settle the token using the error-first convention.
    ///
    /// A `Some` failure marks the token failed. Otherwise the token succeeds with `results`,
    /// collapsed to a scalar if there is exactly one of them.
    pub fn settle(&self, failure: Option<anyhow::Error>, results: Vec<T>) {
        let Some(session) = &self.session else {
            tracing::debug!(token = %self.id, "ignoring settlement of detached token");
            return;
        };

        let outcome = match failure {
            Some(failure) => Err(failure),
            None => Ok(results),
        };
        Rc::clone(session).settle(self.id, outcome);
    }

    /// Succeed with a single result.
    pub fn resolve(&self, value: T) {
        self.settle(None, vec![value]);
    }

    /// Succeed with any number of results.
    pub fn resolve_all(&self, values: Vec<T>) {
        self.settle(None, values);
    }

    pub fn reject(&self, failure: impl Into<anyhow::Error>) {
        self.settle(Some(failure.into()), Vec::new());
    }

    /// Settle from a `Result`, the adapter for Rust-style completion callbacks.
    pub fn complete(&self, result: anyhow::Result<T>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(failure) => self.reject(failure),
        }
    }
}

impl<T> Clone for Settle<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            id: self.id,
        }
    }
}

impl<T> fmt::Debug for Settle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settle")
            .field("id", &self.id)
            .field("detached", &self.session.is_none())
            .finish()
    }
}
