// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! One invocation of an adapted routine: the dispatcher run loop and its terminal latch.

use crate::builder::Starvation;
use crate::coroutine::{Coroutine, Routine, Started, Step, Yielded};
use crate::error::Error;
use crate::queue::{Mode, OpQueue};
use crate::token::{Dispatch, Origin, Recover, TokenId, Wait};
use crate::value::Value;
use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::mem;
use tracing::Span;

/// The terminal callback of a session.
pub(crate) type Terminal<R> = Box<dyn FnOnce(Result<R, Error>)>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum State {
    /// No dispatch loop is executing.
    Idle,
    /// A dispatch loop is draining ready tokens. Doubles as the re-entrancy guard.
    Running,
    /// Waiting for an external settlement.
    Suspended,
    /// The terminal callback fired.
    Done,
}

pub(crate) struct Session<C: Coroutine> {
    span: Span,
    starvation: Starvation,
    state: Cell<State>,
    mode: Cell<Mode>,
    ops: RefCell<OpQueue<C::Item>>,
    coroutine: RefCell<Option<C>>,
    terminal: RefCell<Option<Terminal<C::Output>>>,
}

impl<C> Session<C>
where
    C: Coroutine + 'static,
    C::Item: 'static,
    C::Output: 'static,
{
    /// Start `routine` in a fresh session and run it as far as it can go synchronously.
    pub(crate) fn start<A, R>(
        routine: &R,
        args: A,
        span: Span,
        starvation: Starvation,
        terminal: Terminal<C::Output>,
    ) where
        R: Routine<A, C::Item, Coroutine = C>,
    {
        let session = Rc::new(Session {
            span,
            starvation,
            // nothing may dispatch before the coroutine is in place
            state: Cell::new(State::Running),
            mode: Cell::new(Mode::Single),
            ops: RefCell::new(OpQueue::new()),
            coroutine: RefCell::new(None),
            terminal: RefCell::new(Some(terminal)),
        });
        let _enter = session.span.clone().entered();

        session.ops.borrow_mut().push_start();

        let dispatch = Rc::downgrade(&session);
        let dispatch: Weak<dyn Dispatch<C::Item>> = dispatch;
        match routine.start(args, Wait::new(dispatch)) {
            Started::Returned(output) => {
                tracing::trace!("routine is not suspendable, returning directly");
                session.finish(Ok(output));
            }
            Started::Coroutine(coroutine) => {
                *session.coroutine.borrow_mut() = Some(coroutine);
                session.state.set(State::Idle);
                session.run();
            }
        }
    }

    /// The dispatcher: resume the coroutine for as long as the readiness policy allows.
    fn run(self: &Rc<Self>) {
        match self.state.get() {
            State::Running => {
                tracing::debug!("dispatch already in progress, leaving it to the active loop");
                return;
            }
            State::Done => return,
            State::Idle | State::Suspended => {}
        }

        let _enter = self.span.enter();
        self.state.set(State::Running);

        loop {
            let mode = self.mode.get();
            let Some(input) = self.ops.borrow_mut().take_ready(mode) else {
                break;
            };

            let step = {
                let mut coroutine = self.coroutine.borrow_mut();
                let Some(coroutine) = coroutine.as_mut() else {
                    tracing::error!("running session has no coroutine");
                    self.state.set(State::Done);
                    return;
                };

                match input {
                    Ok(resume) => {
                        tracing::trace!(?mode, "resuming coroutine");
                        coroutine.resume(resume)
                    }
                    Err(failure) => {
                        tracing::trace!(?mode, %failure, "raising failure in coroutine");
                        coroutine.resume_with_failure(failure)
                    }
                }
            };

            match step {
                Ok(Step::Yield(yielded)) => self.observe(yielded),
                Ok(Step::Complete(output)) => return self.finish(Ok(output)),
                Err(failure) => return self.finish(Err(Error::Failed(failure))),
            }
        }

        if self.mode.get() == Mode::Single && self.ops.borrow().is_empty() {
            match self.starvation {
                Starvation::Fail => {
                    tracing::warn!("coroutine suspended with no outstanding operations");
                    return self.finish(Err(Error::Starved));
                }
                Starvation::Suspend => {
                    tracing::warn!(
                        "coroutine suspended with no outstanding operations, it will never resume"
                    );
                }
            }
        }

        tracing::trace!(outstanding = self.ops.borrow().len(), "suspending");
        self.state.set(State::Suspended);
    }

    /// Act on what the coroutine just yielded.
    fn observe(self: &Rc<Self>, yielded: Yielded<C::Item>) {
        match yielded {
            Yielded::AwaitAll => {
                tracing::trace!("awaiting all outstanding operations");
                self.mode.set(Mode::All);
            }
            Yielded::Awaitable(awaitable) => {
                self.mode.set(Mode::Single);
                let id = self.enqueue_token(Origin::Promise, None);

                let on_success = {
                    let session = Rc::clone(self);
                    Box::new(move |value| session.settle_token(id, Ok(vec![value])))
                };
                let on_failure = {
                    let session = Rc::clone(self);
                    Box::new(move |failure| session.settle_token(id, Err(failure)))
                };

                awaitable.on_settle(on_success, on_failure);
            }
            Yielded::Nothing | Yielded::Value(_) => self.mode.set(Mode::Single),
        }
    }

    fn enqueue_token(&self, origin: Origin, recover: Option<Recover<C::Item>>) -> TokenId {
        let mut ops = self.ops.borrow_mut();
        if self.state.get() == State::Done {
            tracing::debug!(%origin, "session already complete, token will never be dispatched");
            return ops.next_id();
        }

        let id = ops.push(origin, recover);
        tracing::trace!(parent: &self.span, token = %id, %origin, outstanding = ops.len(), "token enqueued");
        id
    }

    fn settle_token(self: &Rc<Self>, id: TokenId, outcome: anyhow::Result<Vec<C::Item>>) {
        let _enter = self.span.enter();

        if self.state.get() == State::Done {
            tracing::debug!(token = %id, "session already complete, ignoring settlement");
            return;
        }

        let claim = self.ops.borrow_mut().claim(id);
        let Some(claim) = claim else {
            tracing::debug!(token = %id, "ignoring settlement of a drained or already settled token");
            return;
        };

        let outcome = match (outcome, claim.recover) {
            (Err(failure), Some(recover)) => {
                tracing::trace!(token = %id, %failure, "applying on_failure transform");
                recover(failure).map(Value::Scalar)
            }
            (outcome, _) => outcome.map(Value::collapse),
        };

        tracing::trace!(token = %id, origin = %claim.origin, ok = outcome.is_ok(), "token settled");
        if !self.ops.borrow_mut().fulfill(id, outcome) {
            tracing::debug!(token = %id, "token was drained while settling");
            return;
        }

        self.run();
    }

    /// Fire the terminal callback. Every termination path goes through here exactly once.
    fn finish(&self, result: Result<C::Output, Error>) {
        self.state.set(State::Done);

        let terminal = self.terminal.borrow_mut().take();
        // dropped outside of their borrows, both may hold handles that call back into us
        let ops = mem::take(&mut *self.ops.borrow_mut());
        let coroutine = self.coroutine.borrow_mut().take();
        drop(ops);
        drop(coroutine);

        match terminal {
            Some(terminal) => {
                tracing::trace!(ok = result.is_ok(), "session complete");
                terminal(result);
            }
            None => tracing::error!("terminal callback already fired"),
        }
    }
}

impl<C> Dispatch<C::Item> for Session<C>
where
    C: Coroutine + 'static,
    C::Item: 'static,
    C::Output: 'static,
{
    fn enqueue(&self, origin: Origin, recover: Option<Recover<C::Item>>) -> TokenId {
        self.enqueue_token(origin, recover)
    }

    fn settle(self: Rc<Self>, id: TokenId, outcome: anyhow::Result<Vec<C::Item>>) {
        self.settle_token(id, outcome);
    }
}
