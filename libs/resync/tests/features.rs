// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod common;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use common::{EventLoop, Terminal, trace_init};
use resync::{
    Coroutine, Resume, Resync, Routine, Settle, Started, Step, TokenOptions, Value, Wait, adapt,
    from_fn, promise,
};

#[derive(Debug, PartialEq, Eq)]
struct Failure(&'static str);

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for Failure {}

/// Drives `inc` twice in series and twice in parallel, then returns `"foo"`.
fn four_increments(
    inc: impl Fn(Settle<u32>) + 'static,
) -> Resync<impl Routine<(), u32, Coroutine: Coroutine<Output = &'static str> + 'static>> {
    let inc = Rc::new(inc);
    adapt(move |(), wait: Wait<u32>| {
        let inc = inc.clone();
        let mut expected = 0;

        Started::Coroutine(from_fn(move |input: anyhow::Result<Resume<u32>>| {
            if let Some(value) = input?.into_scalar() {
                expected += 1;
                assert_eq!(value, expected, "iteration {expected}");
            }

            match expected {
                // in series
                0 | 1 => inc(wait.token()),
                // in parallel
                2 => {
                    inc(wait.token());
                    inc(wait.token());
                }
                3 => {}
                _ => return Ok(Step::Complete("foo")),
            }
            Ok(Step::pending())
        }))
    })
}

#[test]
fn synchronous_callbacks() {
    let _trace = trace_init();
    let i = Rc::new(Cell::new(0));

    let resync = four_increments({
        let i = i.clone();
        move |next: Settle<u32>| {
            i.set(i.get() + 1);
            next.resolve(i.get());
        }
    });

    let terminal = Terminal::new();
    resync.call((), terminal.callback());

    assert_eq!(terminal.take().unwrap(), "foo", "returned result");
    assert_eq!(i.get(), 4, "iteration result");
}

#[test]
fn asynchronous_callbacks() {
    let _trace = trace_init();
    let events = EventLoop::default();
    let i = Rc::new(Cell::new(0));

    let resync = four_increments({
        let events = events.clone();
        let i = i.clone();
        move |next: Settle<u32>| {
            let i = i.clone();
            events.defer(move || {
                i.set(i.get() + 1);
                next.resolve(i.get());
            });
        }
    });

    let terminal = Terminal::new();
    resync.call((), terminal.callback());
    assert_eq!(terminal.fired(), 0);

    events.run();
    assert_eq!(terminal.take().unwrap(), "foo", "returned result");
    assert_eq!(i.get(), 4, "iteration result");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Param {
    Int(u32),
    Text(&'static str),
}

#[test]
fn multiple_parameters() {
    let run = |next: Settle<Param>| next.resolve_all(vec![Param::Int(1), Param::Text("one")]);

    let resync = adapt(move |(), wait: Wait<Param>| {
        Started::Coroutine(from_fn(move |input: anyhow::Result<Resume<Param>>| {
            match input? {
                Resume::Start => {
                    run(wait.token());
                    Ok(Step::pending())
                }
                resumed => {
                    let result = resumed.into_value().and_then(Value::into_sequence);
                    assert_eq!(
                        result,
                        Some(vec![Param::Int(1), Param::Text("one")]),
                        "yielded result is a sequence of params"
                    );
                    Ok(Step::Complete(()))
                }
            }
        }))
    });

    let terminal = Terminal::new();
    resync.call((), terminal.callback());
    terminal.take().unwrap();
}

#[test]
fn callback_error_handling() {
    let error = |next: Settle<u32>| next.reject(anyhow::anyhow!("Error passed to callback"));

    let resync = adapt(move |(), wait: Wait<u32>| {
        Started::Coroutine(from_fn(move |input: anyhow::Result<Resume<u32>>| {
            input?;
            error(wait.token());
            Ok(Step::<u32, ()>::pending())
        }))
    });

    let terminal = Terminal::new();
    resync.call((), terminal.callback());

    let err = terminal.take().unwrap_err();
    assert_eq!(err.to_string(), "Error passed to callback");
}

#[test]
fn thrown_error_handling() {
    fn error(_next: Settle<u32>) -> anyhow::Result<()> {
        anyhow::bail!("Thrown error")
    }

    let resync = adapt(|(), wait: Wait<u32>| {
        Started::Coroutine(from_fn(move |input: anyhow::Result<Resume<u32>>| {
            input?;
            error(wait.token())?;
            Ok(Step::<u32, ()>::pending())
        }))
    });

    let terminal = Terminal::new();
    resync.call((), terminal.callback());

    let err = terminal.take().unwrap_err();
    assert_eq!(err.to_string(), "Thrown error");
}

#[test]
fn error_squashing_recovers_with_a_value() {
    let error_generator = |next: Settle<u32>| next.reject(Failure("Error handled by callback"));

    let resync = adapt(move |(), wait: Wait<u32>| {
        Started::Coroutine(from_fn(move |input: anyhow::Result<Resume<u32>>| {
            match input? {
                Resume::Start => {
                    let options = TokenOptions::new().on_failure(|err: anyhow::Error| {
                        assert_eq!(
                            err.downcast_ref::<Failure>(),
                            Some(&Failure("Error handled by callback")),
                            "error matches the reported error"
                        );
                        Ok(7)
                    });
                    error_generator(wait.token_with(options));
                    Ok(Step::pending())
                }
                resumed => {
                    assert_eq!(resumed.into_scalar(), Some(7), "result is yielded through");
                    Ok(Step::Complete(()))
                }
            }
        }))
    });

    let terminal = Terminal::new();
    resync.call((), terminal.callback());
    terminal.take().unwrap();
}

#[test]
fn error_squashing_replaces_the_error() {
    let error_generator = |next: Settle<u32>| next.reject(Failure("First error"));

    let resync = adapt(move |(), wait: Wait<u32>| {
        Started::Coroutine(from_fn(move |input: anyhow::Result<Resume<u32>>| {
            input?;
            let options = TokenOptions::new().on_failure(|err: anyhow::Error| {
                assert_eq!(err.downcast_ref::<Failure>(), Some(&Failure("First error")));
                Err(Failure("Second error").into())
            });
            error_generator(wait.token_with(options));
            Ok(Step::<u32, ()>::pending())
        }))
    });

    let terminal = Terminal::new();
    resync.call((), terminal.callback());

    let err = terminal.take().unwrap_err().into_failure().unwrap();
    assert_eq!(
        err.downcast_ref::<Failure>(),
        Some(&Failure("Second error")),
        "second error sent through"
    );
}

#[test]
fn promises_and_callbacks_mix() {
    let events = EventLoop::default();

    let resync = {
        let events = events.clone();
        adapt(move |(), wait: Wait<u32>| {
            let events = events.clone();
            let mut sum = 0;
            Started::Coroutine(from_fn(move |input: anyhow::Result<Resume<u32>>| {
                match input? {
                    Resume::Start => {
                        let (resolver, promise) = promise::promise();
                        events.defer(move || {
                            let _ = resolver.resolve(2);
                        });
                        Ok(Step::awaiting(promise))
                    }
                    Resume::Value(Value::Scalar(2)) => {
                        sum += 2;
                        let next = wait.token();
                        events.defer(move || next.resolve(3));
                        Ok(Step::pending())
                    }
                    resumed => {
                        sum += resumed.into_scalar().unwrap_or_default();
                        Ok(Step::Complete(sum))
                    }
                }
            }))
        })
    };

    let terminal = Terminal::new();
    resync.call((), terminal.callback());
    events.run();

    assert_eq!(terminal.take().unwrap(), 5);
}

#[test]
fn plain_functions_complete_immediately() {
    let resync = adapt(|name: &'static str, _wait: Wait<()>| Started::returned(name.len()));

    let terminal = Terminal::new();
    resync.call("bar", terminal.callback());

    assert_eq!(terminal.take().unwrap(), 3);
}

#[test]
fn invocation_without_callback() {
    let resync = adapt(|(), _wait: Wait<()>| Started::returned(()));

    let err = resync
        .try_call((), None::<fn(Result<(), resync::Error>)>)
        .unwrap_err();

    assert!(err.is_invalid_invocation());
    assert_eq!(err.to_string(), "final parameter must be a callback");
}
