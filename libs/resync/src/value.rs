// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use alloc::vec::Vec;

/// The result a settled operation delivers to the coroutine.
///
/// Settlement functions accept any number of result arguments. Exactly one argument is
/// delivered as a bare [`Value::Scalar`]; zero or two-or-more arguments are delivered as an
/// ordered [`Value::Sequence`]. Callers of adapted routines rely on that asymmetry, so it is
/// preserved here instead of always handing out a `Vec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<T> {
    Scalar(T),
    Sequence(Vec<T>),
}

impl<T> Value<T> {
    /// Collapse the raw result arguments of a settlement.
    pub fn collapse(mut args: Vec<T>) -> Self {
        if args.len() == 1 {
            return Value::Scalar(args.swap_remove(0));
        }

        Value::Sequence(args)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    pub fn into_scalar(self) -> Option<T> {
        match self {
            Value::Scalar(value) => Some(value),
            Value::Sequence(_) => None,
        }
    }

    pub fn into_sequence(self) -> Option<Vec<T>> {
        match self {
            Value::Scalar(_) => None,
            Value::Sequence(values) => Some(values),
        }
    }

    pub fn as_scalar(&self) -> Option<&T> {
        match self {
            Value::Scalar(value) => Some(value),
            Value::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[T]> {
        match self {
            Value::Scalar(_) => None,
            Value::Sequence(values) => Some(values),
        }
    }
}

impl<T> From<T> for Value<T> {
    fn from(value: T) -> Self {
        Value::Scalar(value)
    }
}

/// What the dispatcher resumes a coroutine with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume<T> {
    /// The very first resumption. The coroutine has not yielded yet.
    Start,
    /// The result of the operation at the head of the queue.
    Value(Value<T>),
    /// The results of every operation that was outstanding when the coroutine yielded
    /// [`Yielded::AwaitAll`](crate::Yielded::AwaitAll), in request order.
    All(Vec<Value<T>>),
}

impl<T> Resume<T> {
    pub fn is_start(&self) -> bool {
        matches!(self, Resume::Start)
    }

    pub fn into_value(self) -> Option<Value<T>> {
        match self {
            Resume::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Shorthand for [`Resume::into_value`] followed by [`Value::into_scalar`].
    pub fn into_scalar(self) -> Option<T> {
        self.into_value().and_then(Value::into_scalar)
    }

    pub fn into_all(self) -> Option<Vec<Value<T>>> {
        match self {
            Resume::All(values) => Some(values),
            _ => None,
        }
    }
}
