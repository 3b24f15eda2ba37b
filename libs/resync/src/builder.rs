// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::Resync;
use core::panic::Location;
use tracing::Span;

/// What to do when a session starves.
///
/// A session starves when the coroutine suspends while no operation is outstanding, so that
/// nothing could ever resume it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Starvation {
    /// Terminate the session with [`Error::Starved`](crate::Error::Starved).
    #[default]
    Fail,
    /// Leave the session suspended. Its terminal callback never fires.
    Suspend,
}

/// Configures how a routine is adapted.
///
/// Created by [`builder`](crate::builder).
#[derive(Clone, Copy, Debug)]
pub struct Builder {
    config: Config,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Config {
    name: Option<&'static str>,
    kind: &'static str,
    location: Option<Location<'static>>,
    pub(crate) starvation: Starvation,
}

impl Builder {
    pub(crate) const fn new() -> Self {
        Self {
            config: Config {
                name: None,
                kind: "session",
                location: None,
                starvation: Starvation::Fail,
            },
        }
    }

    /// Override the name of sessions started by the adapted routine.
    ///
    /// By default, sessions are unnamed.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = Some(name);
        self
    }

    /// Override the kind string of sessions, this will only show up in debug messages and spans.
    ///
    /// By default, sessions are of kind `"session"`.
    pub fn kind(mut self, kind: &'static str) -> Self {
        self.config.kind = kind;
        self
    }

    /// Override the source code location that will be associated with sessions.
    ///
    /// By default, every session records the location it was invoked from.
    pub fn location(mut self, location: Location<'static>) -> Self {
        self.config.location = Some(location);
        self
    }

    /// Choose what happens when a session starves, see [`Starvation`].
    pub fn on_starved(mut self, starvation: Starvation) -> Self {
        self.config.starvation = starvation;
        self
    }

    /// Adapt `routine` with this configuration.
    pub fn build<R>(self, routine: R) -> Resync<R> {
        Resync::from_parts(routine, self.config)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub(crate) fn span(&self, caller: &'static Location<'static>) -> Span {
        let loc = self.location.unwrap_or(*caller);
        tracing::trace_span!(
            "session",
            session.name = ?self.name,
            session.kind = self.kind,
            loc.file = loc.file(),
            loc.line = loc.line(),
            loc.col = loc.column(),
        )
    }
}
