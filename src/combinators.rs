//! Core stream combinators
//!
//! Stateless transforms wrap the sink with a new `event` callback and pass
//! `end` through untouched. Stateful transforms keep their state inside the
//! run, so every run of the resulting stream starts fresh.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use futures::future::Either;

use crate::disposable::{Disposable, DisposableSlot};
use crate::error::StreamError;
use crate::sink::{sink, GuardedSink, Sink, SinkRef};
use crate::stream::{empty, Stream};

/// A sink that rewrites events for `downstream` and forwards `end` as is
struct Forward<A, B, F> {
    downstream: SinkRef<B>,
    on_event: F,
    _input: PhantomData<fn(A)>,
}

impl<A, B, F> Sink<A> for Forward<A, B, F>
where
    F: Fn(&SinkRef<B>, A),
{
    fn event(&self, value: A) {
        (self.on_event)(&self.downstream, value)
    }

    fn end(&self, reason: Option<StreamError>) {
        self.downstream.end(reason)
    }
}

pub(crate) fn forward<A, B, F>(downstream: SinkRef<B>, on_event: F) -> SinkRef<A>
where
    A: 'static,
    B: 'static,
    F: Fn(&SinkRef<B>, A) + 'static,
{
    Rc::new(Forward {
        downstream,
        on_event,
        _input: PhantomData,
    })
}

// ================================
// Stateless Transforms
// ================================

/// Apply `f` to every value
pub fn map<A, B, E, F>(stream: Stream<A, E>, f: F) -> Stream<B, E>
where
    A: 'static,
    B: 'static,
    E: 'static,
    F: Fn(A) -> B + 'static,
{
    let f = Rc::new(f);
    Stream::new(move |sink: SinkRef<B>, env: &E| {
        let f = Rc::clone(&f);
        stream.run(forward(sink, move |down: &SinkRef<B>, a: A| down.event(f(a))), env)
    })
}

/// Keep only the values matching `predicate`
pub fn filter<A, E, P>(stream: Stream<A, E>, predicate: P) -> Stream<A, E>
where
    A: 'static,
    E: 'static,
    P: Fn(&A) -> bool + 'static,
{
    let predicate = Rc::new(predicate);
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let predicate = Rc::clone(&predicate);
        stream.run(
            forward(sink, move |down: &SinkRef<A>, a: A| {
                if predicate(&a) {
                    down.event(a);
                }
            }),
            env,
        )
    })
}

/// Map and filter in one step: `None` drops the value
pub fn filter_map<A, B, E, F>(stream: Stream<A, E>, f: F) -> Stream<B, E>
where
    A: 'static,
    B: 'static,
    E: 'static,
    F: Fn(A) -> Option<B> + 'static,
{
    let f = Rc::new(f);
    Stream::new(move |sink: SinkRef<B>, env: &E| {
        let f = Rc::clone(&f);
        stream.run(
            forward(sink, move |down: &SinkRef<B>, a: A| {
                if let Some(b) = f(a) {
                    down.event(b);
                }
            }),
            env,
        )
    })
}

/// Run a side effect for every value, passing it through unchanged
pub fn tap<A, E, F>(stream: Stream<A, E>, f: F) -> Stream<A, E>
where
    A: 'static,
    E: 'static,
    F: Fn(&A) + 'static,
{
    let f = Rc::new(f);
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let f = Rc::clone(&f);
        stream.run(
            forward(sink, move |down: &SinkRef<A>, a: A| {
                f(&a);
                down.event(a);
            }),
            env,
        )
    })
}

/// Split into (matching, non-matching). Each half runs the source on its own.
pub fn partition<A, E, P>(stream: Stream<A, E>, predicate: P) -> (Stream<A, E>, Stream<A, E>)
where
    A: 'static,
    E: 'static,
    P: Fn(&A) -> bool + 'static,
{
    let predicate = Rc::new(predicate);
    let p = Rc::clone(&predicate);
    (
        filter(stream.clone(), move |a| predicate(a)),
        filter(stream, move |a| !p(a)),
    )
}

/// Split into (left, right) by the side `f` picks for each value
pub fn partition_map<A, B, C, E, F>(stream: Stream<A, E>, f: F) -> (Stream<B, E>, Stream<C, E>)
where
    A: 'static,
    B: 'static,
    C: 'static,
    E: 'static,
    F: Fn(A) -> Either<B, C> + 'static,
{
    let f = Rc::new(f);
    let g = Rc::clone(&f);
    (
        filter_map(stream.clone(), move |a| match f(a) {
            Either::Left(b) => Some(b),
            Either::Right(_) => None,
        }),
        filter_map(stream, move |a| match g(a) {
            Either::Left(_) => None,
            Either::Right(c) => Some(c),
        }),
    )
}

// ================================
// Stateful Transforms
// ================================

/// Emit every intermediate accumulator (the seed itself is not emitted)
pub fn scan<A, S, E, F>(stream: Stream<A, E>, seed: S, f: F) -> Stream<S, E>
where
    A: 'static,
    S: Clone + 'static,
    E: 'static,
    F: Fn(S, A) -> S + 'static,
{
    let f = Rc::new(f);
    Stream::new(move |sink: SinkRef<S>, env: &E| {
        let f = Rc::clone(&f);
        let acc = RefCell::new(seed.clone());
        stream.run(
            forward(sink, move |down: &SinkRef<S>, a: A| {
                let next = f(acc.borrow().clone(), a);
                *acc.borrow_mut() = next.clone();
                down.event(next);
            }),
            env,
        )
    })
}

/// Thread hidden state through the stream: `f` returns the next state and
/// the value to emit
pub fn loop_with<A, B, S, E, F>(stream: Stream<A, E>, seed: S, f: F) -> Stream<B, E>
where
    A: 'static,
    B: 'static,
    S: Clone + 'static,
    E: 'static,
    F: Fn(S, A) -> (S, B) + 'static,
{
    let f = Rc::new(f);
    Stream::new(move |sink: SinkRef<B>, env: &E| {
        let f = Rc::clone(&f);
        let state = RefCell::new(seed.clone());
        stream.run(
            forward(sink, move |down: &SinkRef<B>, a: A| {
                let (next, out) = f(state.borrow().clone(), a);
                *state.borrow_mut() = next;
                down.event(out);
            }),
            env,
        )
    })
}

/// Pair every value with an index counting from `start` by `step`
pub fn with_index<A, E>(stream: Stream<A, E>, start: usize, step: usize) -> Stream<(usize, A), E>
where
    A: 'static,
    E: 'static,
{
    loop_with(stream, start, move |i, a| (i + step, (i, a)))
}

/// Pair every value with its position, starting at zero
pub fn indexed<A, E>(stream: Stream<A, E>) -> Stream<(usize, A), E>
where
    A: 'static,
    E: 'static,
{
    with_index(stream, 0, 1)
}

/// Drop the first `n` values
pub fn skip<A, E>(stream: Stream<A, E>, n: usize) -> Stream<A, E>
where
    A: 'static,
    E: 'static,
{
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let skipped = Cell::new(0);
        stream.run(
            forward(sink, move |down: &SinkRef<A>, a: A| {
                if skipped.get() < n {
                    skipped.set(skipped.get() + 1);
                } else {
                    down.event(a);
                }
            }),
            env,
        )
    })
}

/// Emit `value` synchronously, then everything `stream` emits
pub fn start_with<A, E>(stream: Stream<A, E>, value: A) -> Stream<A, E>
where
    A: Clone + 'static,
    E: 'static,
{
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let guard = Rc::new(GuardedSink::new(sink));
        guard.event(value.clone());
        let d = stream.run(guard.clone(), env);
        Disposable::new(move || {
            guard.close();
            d.dispose();
        })
    })
}

// ================================
// Early Termination
// ================================

enum Step {
    Forward,
    ForwardThenEnd,
    End,
}

/// Shared machinery for combinators that stop the upstream themselves.
///
/// `decide` is created once per run. When it asks to end, the upstream is
/// disposed before `end` is sent downstream; a synchronous upstream that is
/// still inside `run` is disposed as soon as its handle comes back.
fn limit<A, E, G, D>(stream: Stream<A, E>, decide: G) -> Stream<A, E>
where
    A: 'static,
    E: 'static,
    G: Fn() -> D + 'static,
    D: Fn(&A) -> Step + 'static,
{
    Stream::new(move |downstream: SinkRef<A>, env: &E| {
        let guard = Rc::new(GuardedSink::new(downstream));
        let upstream = DisposableSlot::new();
        let decide = decide();

        let (g, u) = (Rc::clone(&guard), upstream.clone());
        let g_end = Rc::clone(&guard);
        let inner = sink(
            move |a: A| {
                if !g.is_open() {
                    return;
                }
                match decide(&a) {
                    Step::Forward => g.event(a),
                    Step::ForwardThenEnd => {
                        g.event(a);
                        u.dispose();
                        g.end(None);
                    }
                    Step::End => {
                        u.dispose();
                        g.end(None);
                    }
                }
            },
            move |reason| g_end.end(reason),
        );

        upstream.set(stream.run(inner, env));
        Disposable::new(move || {
            guard.close();
            upstream.dispose();
        })
    })
}

/// Forward the first `n` values, then dispose the upstream and end.
///
/// `take(0)` never runs the upstream.
pub fn take<A, E>(stream: Stream<A, E>, n: usize) -> Stream<A, E>
where
    A: 'static,
    E: 'static,
{
    if n == 0 {
        return empty();
    }
    limit(stream, move || {
        let remaining = Cell::new(n);
        move |_: &A| {
            let left = remaining.get() - 1;
            remaining.set(left);
            if left == 0 {
                Step::ForwardThenEnd
            } else {
                Step::Forward
            }
        }
    })
}

/// Forward values up to and including the first one matching `predicate`,
/// then dispose the upstream and end
pub fn take_until<A, E, P>(stream: Stream<A, E>, predicate: P) -> Stream<A, E>
where
    A: 'static,
    E: 'static,
    P: Fn(&A) -> bool + 'static,
{
    let predicate = Rc::new(predicate);
    limit(stream, move || {
        let predicate = Rc::clone(&predicate);
        move |a: &A| {
            if predicate(a) {
                Step::ForwardThenEnd
            } else {
                Step::Forward
            }
        }
    })
}

/// Forward values while `predicate` holds; the first failing value is not
/// forwarded and ends the stream
pub fn take_while<A, E, P>(stream: Stream<A, E>, predicate: P) -> Stream<A, E>
where
    A: 'static,
    E: 'static,
    P: Fn(&A) -> bool + 'static,
{
    let predicate = Rc::new(predicate);
    limit(stream, move || {
        let predicate = Rc::clone(&predicate);
        move |a: &A| {
            if predicate(a) {
                Step::Forward
            } else {
                Step::End
            }
        }
    })
}

// ================================
// Repetition
// ================================

struct Repeat<A, E> {
    stream: Stream<A, E>,
    env: E,
    downstream: SinkRef<A>,
    remaining: Cell<usize>,
    // Bumped on every run so callbacks from finished runs are ignored.
    generation: Cell<u64>,
    current: RefCell<Option<Disposable>>,
    disposed: Cell<bool>,
    // Set while `drive` is on the stack; a run ending inside it only flags
    // `restart` so synchronous repeats loop instead of recursing.
    driving: Cell<bool>,
    restart: Cell<bool>,
}

impl<A: 'static, E: 'static> Repeat<A, E> {
    fn is_live(&self, generation: u64) -> bool {
        !self.disposed.get() && self.generation.get() == generation
    }
}

fn drive<A: 'static, E: 'static>(state: &Rc<Repeat<A, E>>) {
    state.driving.set(true);
    loop {
        state.restart.set(false);
        let generation = state.generation.get() + 1;
        state.generation.set(generation);

        let d = state.stream.run(repeat_sink(state, generation), &state.env);
        if state.restart.get() {
            // the run already ended; its handle has nothing left to release
            if state.disposed.get() {
                break;
            }
            continue;
        }
        if state.is_live(generation) {
            *state.current.borrow_mut() = Some(d);
        } else {
            d.dispose();
        }
        break;
    }
    state.driving.set(false);
}

fn repeat_sink<A: 'static, E: 'static>(state: &Rc<Repeat<A, E>>, generation: u64) -> SinkRef<A> {
    let (on_event, on_end) = (Rc::clone(state), Rc::clone(state));
    sink(
        move |a: A| {
            if on_event.is_live(generation) {
                on_event.downstream.event(a);
            }
        },
        move |reason: Option<StreamError>| {
            if !on_end.is_live(generation) {
                return;
            }
            on_end.current.borrow_mut().take();
            let again = reason.is_none() && on_end.remaining.get() > 0;
            if !again {
                on_end.downstream.end(reason);
                return;
            }
            on_end.remaining.set(on_end.remaining.get() - 1);
            if on_end.driving.get() {
                on_end.restart.set(true);
            } else {
                drive(&on_end);
            }
        },
    )
}

/// Run `stream` again each time it ends naturally, `times` extra times.
///
/// An end carrying a reason stops the repetition and is passed through.
pub fn repeat<A, E>(stream: Stream<A, E>, times: usize) -> Stream<A, E>
where
    A: 'static,
    E: Clone + 'static,
{
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let state = Rc::new(Repeat {
            stream: stream.clone(),
            env: env.clone(),
            downstream: sink,
            remaining: Cell::new(times),
            generation: Cell::new(0),
            current: RefCell::new(None),
            disposed: Cell::new(false),
            driving: Cell::new(false),
            restart: Cell::new(false),
        });
        drive(&state);
        Disposable::new(move || {
            state.disposed.set(true);
            let current = state.current.borrow_mut().take();
            if let Some(d) = current {
                d.dispose();
            }
        })
    })
}
