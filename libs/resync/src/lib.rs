// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Drive callback- and promise-based asynchronous operations from coroutine-style routines.
//!
//! A routine is adapted once with [`adapt`] (or configured through [`builder`]) and can then
//! be invoked any number of times. Each invocation runs in a fresh, independent session: the
//! routine's [`Coroutine`] requests suspension points through the injected [`Wait`] factory,
//! external operations settle them in whatever order and at whatever time they complete, and
//! the coroutine is resumed with their results in the order they were *requested*. The caller
//! observes a single terminal callback, fired exactly once.
//!
//! ```
//! use resync::{Resume, Started, Step, Wait, from_fn};
//!
//! let add = resync::adapt(|(a, b): (u32, u32), wait: Wait<u32>| {
//!     Started::Coroutine(from_fn(move |input: anyhow::Result<Resume<u32>>| {
//!         match input? {
//!             Resume::Start => {
//!                 // any callback-style operation would receive `settle` instead
//!                 let settle = wait.token();
//!                 settle.resolve(a + b);
//!                 Ok(Step::pending())
//!             }
//!             resumed => Ok(Step::Complete(resumed.into_scalar())),
//!         }
//!     }))
//! });
//!
//! add.call((1, 2), |result| assert_eq!(result.unwrap(), Some(3)));
//! ```
//!
//! Sessions are single-threaded: settlement handles are neither `Send` nor `Sync`, and
//! settling resumes the coroutine synchronously on the settling call stack. A settlement that
//! arrives while the session's dispatcher is already running is picked up by that running
//! loop instead of recursing into a new one.

#![cfg_attr(not(test), no_std)]
extern crate alloc;

mod builder;
pub mod coroutine;
mod error;
pub mod promise;
mod queue;
mod session;
#[cfg(test)]
mod test_util;
mod token;
mod value;

pub use builder::{Builder, Starvation};
pub use coroutine::{Coroutine, Routine, Started, Step, Yielded, from_fn};
pub use error::Error;
pub use promise::{Awaitable, Promise, Resolver};
pub use token::{Origin, Settle, TokenId, TokenOptions, Wait};
pub use value::{Resume, Value};

use crate::builder::Config;
use crate::session::Session;
use alloc::boxed::Box;
use core::fmt;
use core::panic::Location;
use static_assertions::assert_not_impl_any;

assert_not_impl_any!(Settle<()>: Send, Sync);
assert_not_impl_any!(Wait<()>: Send, Sync);
assert_not_impl_any!(Promise<()>: Send, Sync);

/// Adapt `routine` with the default configuration.
pub fn adapt<R>(routine: R) -> Resync<R> {
    builder().build(routine)
}

/// Returns a new [`Builder`] to configure how a routine is adapted.
pub const fn builder() -> Builder {
    Builder::new()
}

/// An adapted routine.
///
/// Returned by [`adapt`] and [`Builder::build`].
pub struct Resync<R> {
    routine: R,
    config: Config,
}

impl<R> Resync<R> {
    pub(crate) fn from_parts(routine: R, config: Config) -> Self {
        Self { routine, config }
    }

    /// Invoke the routine with `args`, calling `done` once the session terminates.
    ///
    /// The routine runs synchronously until its coroutine suspends on an operation that has
    /// not settled yet. `done` may therefore already have been called when this returns.
    #[track_caller]
    pub fn call<A, T, D>(&self, args: A, done: D)
    where
        R: Routine<A, T>,
        R::Coroutine: 'static,
        T: 'static,
        <R::Coroutine as Coroutine>::Output: 'static,
        D: FnOnce(Result<<R::Coroutine as Coroutine>::Output, Error>) + 'static,
    {
        let span = self.config.span(Location::caller());
        Session::start(
            &self.routine,
            args,
            span,
            self.config.starvation,
            Box::new(done),
        );
    }

    /// Invoke the routine, with a terminal callback that may be missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInvocation`] if `done` is `None`, the routine is not started
    /// in that case.
    #[track_caller]
    pub fn try_call<A, T, D>(&self, args: A, done: Option<D>) -> Result<(), Error>
    where
        R: Routine<A, T>,
        R::Coroutine: 'static,
        T: 'static,
        <R::Coroutine as Coroutine>::Output: 'static,
        D: FnOnce(Result<<R::Coroutine as Coroutine>::Output, Error>) + 'static,
    {
        let Some(done) = done else {
            tracing::debug!("invoked without a terminal callback");
            return Err(Error::InvalidInvocation);
        };

        self.call(args, done);
        Ok(())
    }

    /// Returns the adapted routine.
    pub fn routine(&self) -> &R {
        &self.routine
    }
}

impl<R> fmt::Debug for Resync<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resync")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
