// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The stepping capability the dispatcher drives.
//!
//! A [`Coroutine`] is anything that can be advanced with a value, or advanced with a failure,
//! and that reports after each step whether it suspended again or completed. Native
//! generators are not required: a hand-written state machine, or a closure passed to
//! [`from_fn`], works just as well.

use crate::promise::Awaitable;
use crate::token::Wait;
use crate::value::Resume;
use alloc::boxed::Box;
use core::convert::Infallible;
use core::fmt;
use core::marker::PhantomData;

/// A routine body that can be suspended and resumed.
pub trait Coroutine {
    /// The type of values external operations settle with.
    type Item;
    /// The value the coroutine completes with.
    type Output;

    /// Advance the coroutine with `input`.
    ///
    /// # Errors
    ///
    /// Returning an error terminates the session, the error is delivered to the terminal
    /// callback as [`Error::Failed`](crate::Error::Failed).
    fn resume(
        &mut self,
        input: Resume<Self::Item>,
    ) -> anyhow::Result<Step<Self::Item, Self::Output>>;

    /// Advance the coroutine by raising `failure` at its current suspension point.
    ///
    /// The default implementation does not handle the failure and propagates it unchanged.
    ///
    /// # Errors
    ///
    /// Returning an error terminates the session, the error is delivered to the terminal
    /// callback as [`Error::Failed`](crate::Error::Failed).
    fn resume_with_failure(
        &mut self,
        failure: anyhow::Error,
    ) -> anyhow::Result<Step<Self::Item, Self::Output>> {
        Err(failure)
    }
}

/// The outcome of advancing a [`Coroutine`] once.
#[derive(Debug)]
pub enum Step<T, R> {
    /// The coroutine suspended.
    Yield(Yielded<T>),
    /// The coroutine returned.
    Complete(R),
}

impl<T, R> Step<T, R> {
    /// Suspend without handing anything to the dispatcher. The coroutine is resumed once the
    /// next operation in request order settles.
    pub fn pending() -> Self {
        Step::Yield(Yielded::Nothing)
    }

    /// Suspend until every currently outstanding operation has settled.
    pub fn await_all() -> Self {
        Step::Yield(Yielded::AwaitAll)
    }

    /// Suspend on `awaitable`.
    pub fn awaiting<A>(awaitable: A) -> Self
    where
        A: Awaitable<T> + 'static,
    {
        Step::Yield(Yielded::Awaitable(Box::new(awaitable)))
    }
}

/// What a coroutine hands to the dispatcher when it suspends.
pub enum Yielded<T> {
    /// A bare suspension.
    Nothing,
    /// A plain value. The dispatcher does not interpret it and behaves as for
    /// [`Yielded::Nothing`].
    Value(T),
    /// Resume with the results of *all* currently outstanding operations at once.
    AwaitAll,
    /// Resume with the outcome of this awaitable, it is enqueued like any other operation.
    Awaitable(Box<dyn Awaitable<T>>),
}

impl<T: fmt::Debug> fmt::Debug for Yielded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Yielded::Nothing => f.write_str("Nothing"),
            Yielded::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Yielded::AwaitAll => f.write_str("AwaitAll"),
            Yielded::Awaitable(_) => f.debug_tuple("Awaitable").finish_non_exhaustive(),
        }
    }
}

/// The result of starting a [`Routine`].
pub enum Started<C: Coroutine> {
    /// The routine produced a coroutine that the dispatcher should drive.
    Coroutine(C),
    /// The routine is not suspendable and returned directly.
    Returned(C::Output),
}

impl<T, R> Started<Plain<T, R>> {
    /// A routine result that bypasses the dispatcher entirely.
    pub fn returned(value: R) -> Self {
        Started::Returned(value)
    }
}

impl<C> fmt::Debug for Started<C>
where
    C: Coroutine + fmt::Debug,
    C::Output: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Started::Coroutine(coroutine) => f.debug_tuple("Coroutine").field(coroutine).finish(),
            Started::Returned(output) => f.debug_tuple("Returned").field(output).finish(),
        }
    }
}

/// A routine that can be adapted with [`adapt`](crate::adapt).
///
/// Every invocation calls [`Routine::start`] with the caller's arguments and a fresh [`Wait`]
/// factory bound to that invocation's session. `&self` is the receiver of method-style
/// routines and is available to the coroutine body through whatever it captures.
///
/// Closures of the shape `Fn(A, Wait<T>) -> Started<C>` implement this trait.
pub trait Routine<A, T> {
    type Coroutine: Coroutine<Item = T>;

    fn start(&self, args: A, wait: Wait<T>) -> Started<Self::Coroutine>;
}

impl<A, T, F, C> Routine<A, T> for F
where
    F: Fn(A, Wait<T>) -> Started<C>,
    C: Coroutine<Item = T>,
{
    type Coroutine = C;

    fn start(&self, args: A, wait: Wait<T>) -> Started<C> {
        self(args, wait)
    }
}

/// Create a coroutine from a closure.
///
/// The closure is called once per step with `Ok(input)` for regular resumptions and with
/// `Err(failure)` when a failure is raised at the suspension point. Any state that has to
/// survive across steps is captured by the closure.
pub fn from_fn<T, R, F>(f: F) -> FromFn<F, T, R>
where
    F: FnMut(anyhow::Result<Resume<T>>) -> anyhow::Result<Step<T, R>>,
{
    FromFn {
        f,
        _marker: PhantomData,
    }
}

/// Coroutine returned by [`from_fn`].
pub struct FromFn<F, T, R> {
    f: F,
    _marker: PhantomData<fn(T) -> R>,
}

impl<F, T, R> Coroutine for FromFn<F, T, R>
where
    F: FnMut(anyhow::Result<Resume<T>>) -> anyhow::Result<Step<T, R>>,
{
    type Item = T;
    type Output = R;

    fn resume(&mut self, input: Resume<T>) -> anyhow::Result<Step<T, R>> {
        (self.f)(Ok(input))
    }

    fn resume_with_failure(&mut self, failure: anyhow::Error) -> anyhow::Result<Step<T, R>> {
        (self.f)(Err(failure))
    }
}

impl<F, T, R> fmt::Debug for FromFn<F, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

/// The coroutine type of routines that never suspend.
///
/// `Plain` cannot be constructed, it only exists so that [`Started::returned`] has a
/// coroutine type to name.
pub struct Plain<T, R> {
    never: Infallible,
    _marker: PhantomData<fn(T) -> R>,
}

impl<T, R> Coroutine for Plain<T, R> {
    type Item = T;
    type Output = R;

    fn resume(&mut self, _input: Resume<T>) -> anyhow::Result<Step<T, R>> {
        let never = self.never;
        match never {}
    }
}

impl<T, R> fmt::Debug for Plain<T, R> {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let never = self.never;
        match never {}
    }
}
