// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

#![allow(unused, reason = "not used by all tests")]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use resync::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

pub fn trace_init() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .set_default()
}

/// A queue of deferred callbacks, standing in for "a later turn" of an event loop.
#[derive(Clone, Default)]
pub struct EventLoop {
    tasks: Rc<RefCell<VecDeque<Box<dyn FnOnce()>>>>,
}

impl EventLoop {
    pub fn defer(&self, f: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(f));
    }

    /// Run a single deferred callback. Returns `false` if there was none.
    pub fn turn(&self) -> bool {
        let task = self.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run deferred callbacks, including ones deferred while running, until none are left.
    pub fn run(&self) {
        while self.turn() {}
    }
}

/// Collects every terminal result of a session.
pub struct Terminal<R> {
    results: Rc<RefCell<Vec<Result<R, Error>>>>,
}

impl<R: 'static> Terminal<R> {
    pub fn new() -> Self {
        Self {
            results: Rc::default(),
        }
    }

    pub fn callback(&self) -> impl FnOnce(Result<R, Error>) + 'static {
        let results = self.results.clone();
        move |result| results.borrow_mut().push(result)
    }

    pub fn fired(&self) -> usize {
        self.results.borrow().len()
    }

    /// Take the terminal result, asserting that it fired exactly once.
    #[track_caller]
    pub fn take(&self) -> Result<R, Error> {
        let mut results = self.results.borrow_mut();
        assert_eq!(results.len(), 1, "terminal callback must fire exactly once");
        results.remove(0)
    }
}
