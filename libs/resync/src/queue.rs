// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The operation queue: completion tokens in request order.

use crate::token::{Origin, Recover, TokenId};
use crate::value::{Resume, Value};
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::{fmt, mem};

/// Readiness policy of the dispatcher.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) enum Mode {
    /// Resume with the head of the queue once it has settled.
    #[default]
    Single,
    /// Resume with every queued token at once, as soon as all of them have settled or one of
    /// them has failed.
    All,
}

pub(crate) struct OpQueue<T> {
    tokens: VecDeque<Token<T>>,
    next_id: u64,
}

struct Token<T> {
    id: TokenId,
    origin: Origin,
    slot: Slot<T>,
}

enum Slot<T> {
    /// Waiting for its settlement. Holds the optional `on_failure` transform.
    Pending(Option<Recover<T>>),
    /// A settlement was claimed and is being computed.
    Settling,
    Ready(anyhow::Result<Value<T>>),
}

/// Returned by [`OpQueue::claim`] for a token that may be settled now.
pub(crate) struct Claim<T> {
    pub(crate) origin: Origin,
    pub(crate) recover: Option<Recover<T>>,
}

// === impl OpQueue ===

impl<T> OpQueue<T> {
    pub(crate) const fn new() -> Self {
        Self {
            tokens: VecDeque::new(),
            next_id: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub(crate) fn next_id(&mut self) -> TokenId {
        let id = TokenId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Push the token that represents "coroutine not yet advanced". It is ready immediately.
    pub(crate) fn push_start(&mut self) -> TokenId {
        let id = self.next_id();
        self.tokens.push_back(Token {
            id,
            origin: Origin::Start,
            slot: Slot::Ready(Ok(Value::Sequence(Vec::new()))),
        });
        id
    }

    pub(crate) fn push(&mut self, origin: Origin, recover: Option<Recover<T>>) -> TokenId {
        let id = self.next_id();
        self.tokens.push_back(Token {
            id,
            origin,
            slot: Slot::Pending(recover),
        });
        id
    }

    /// Begin settling token `id`.
    ///
    /// Returns `None` if the token is unknown (it was already drained) or was already
    /// settled, in both cases the settlement must be ignored.
    pub(crate) fn claim(&mut self, id: TokenId) -> Option<Claim<T>> {
        let token = self.tokens.iter_mut().find(|token| token.id == id)?;
        match mem::replace(&mut token.slot, Slot::Settling) {
            Slot::Pending(recover) => Some(Claim {
                origin: token.origin,
                recover,
            }),
            other => {
                token.slot = other;
                None
            }
        }
    }

    /// Finish a settlement begun with [`OpQueue::claim`].
    ///
    /// Returns `false` if the token was drained in the meantime.
    pub(crate) fn fulfill(&mut self, id: TokenId, outcome: anyhow::Result<Value<T>>) -> bool {
        let Some(token) = self.tokens.iter_mut().find(|token| token.id == id) else {
            return false;
        };
        debug_assert!(matches!(token.slot, Slot::Settling));
        token.slot = Slot::Ready(outcome);
        true
    }

    /// Take whatever the coroutine should be resumed with next, if the readiness policy of
    /// `mode` is satisfied.
    pub(crate) fn take_ready(&mut self, mode: Mode) -> Option<anyhow::Result<Resume<T>>> {
        match mode {
            Mode::Single => {
                if !self.tokens.front()?.is_ready() {
                    return None;
                }

                let token = self.tokens.pop_front()?;
                let origin = token.origin;
                let outcome = token.into_outcome()?;
                Some(match origin {
                    Origin::Start => Ok(Resume::Start),
                    Origin::Callback | Origin::Promise => outcome.map(Resume::Value),
                })
            }
            Mode::All => {
                // ready once every token succeeded, or once the first token in request order
                // that did not succeed has failed
                for token in &self.tokens {
                    match &token.slot {
                        Slot::Ready(Ok(_)) => {}
                        Slot::Ready(Err(_)) => break,
                        Slot::Pending(_) | Slot::Settling => return None,
                    }
                }

                // stops at the first failure in queue order
                let values = mem::take(&mut self.tokens)
                    .into_iter()
                    .filter_map(Token::into_outcome)
                    .collect::<anyhow::Result<Vec<_>>>();

                Some(values.map(Resume::All))
            }
        }
    }
}

impl<T> Default for OpQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for OpQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpQueue")
            .field("len", &self.tokens.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

// === impl Token ===

impl<T> Token<T> {
    fn is_ready(&self) -> bool {
        matches!(self.slot, Slot::Ready(_))
    }

    fn into_outcome(self) -> Option<anyhow::Result<Value<T>>> {
        match self.slot {
            Slot::Ready(outcome) => Some(outcome),
            Slot::Pending(_) | Slot::Settling => None,
        }
    }
}
