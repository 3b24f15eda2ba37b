// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// Errors produced while invoking an adapted routine.
///
/// Apart from [`Error::InvalidInvocation`], which is returned synchronously from
/// [`Resync::try_call`](crate::Resync::try_call), every variant is delivered through the
/// session's terminal callback.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The invocation did not carry a terminal callback. The routine was never started.
    InvalidInvocation,
    /// A failure escaped the coroutine body.
    ///
    /// This is either an operation failure (or the replacement produced by a token's
    /// `on_failure` transform) that the coroutine did not handle at its suspension point, or
    /// a failure raised by the coroutine body itself.
    Failed(anyhow::Error),
    /// The coroutine is suspended but there is nothing left that could resume it.
    Starved,
}

impl Error {
    /// Returns the underlying failure if this is [`Error::Failed`].
    pub fn failure(&self) -> Option<&anyhow::Error> {
        match self {
            Error::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Consumes the error, returning the underlying failure if this is [`Error::Failed`].
    pub fn into_failure(self) -> Option<anyhow::Error> {
        match self {
            Error::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_starved(&self) -> bool {
        matches!(self, Error::Starved)
    }

    pub fn is_invalid_invocation(&self) -> bool {
        matches!(self, Error::InvalidInvocation)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInvocation => f.write_str("final parameter must be a callback"),
            Error::Failed(err) => fmt::Display::fmt(err, f),
            Error::Starved => {
                f.write_str("session starved: coroutine is suspended with no outstanding operations")
            }
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::Failed(err) => Some(&**err),
            _ => None,
        }
    }
}
