//! Concurrency-bounded flattening of a stream of streams
//!
//! One join run owns a small book of bookkeeping: the inner runs currently
//! in flight (keyed by a per-run subscription id, in start order), a FIFO of
//! inner streams waiting for a slot, and whether the outer stream has ended.
//! The book is always updated before any downstream callback is invoked and
//! no borrow of it is held across such a call, so inner streams that emit
//! or end synchronously from inside `run` re-enter safely.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use futures::future::Either;

use crate::combinators::{filter_map, loop_with, map};
use crate::config::{JoinConfig, OverflowStrategy};
use crate::disposable::Disposable;
use crate::error::StreamError;
use crate::sink::{Sink, SinkRef};
use crate::stream::{from_iter, Stream};

struct Book<A, E> {
    // `None` while the inner run is still inside its own `run` call.
    running: BTreeMap<u64, Option<Disposable>>,
    queue: VecDeque<Stream<A, E>>,
    next_id: u64,
    outer: Option<Disposable>,
    outer_ended: bool,
    reason: Option<StreamError>,
    // Set once `end` has been sent downstream or the join was disposed.
    closed: bool,
    // Set while the queue is being drained, so inners that end synchronously
    // leave their successors to the loop already on the stack.
    draining: bool,
}

struct JoinState<A, E> {
    downstream: SinkRef<A>,
    env: E,
    limit: usize,
    strategy: OverflowStrategy,
    book: RefCell<Book<A, E>>,
}

enum Admit<A, E> {
    Start(Stream<A, E>),
    Replace(Option<Disposable>, Stream<A, E>),
    Skip,
}

impl<A: 'static, E: Clone + 'static> JoinState<A, E> {
    fn new(downstream: SinkRef<A>, env: E, config: JoinConfig) -> Self {
        Self {
            downstream,
            env,
            limit: config.concurrency.limit(),
            strategy: config.strategy,
            book: RefCell::new(Book {
                running: BTreeMap::new(),
                queue: VecDeque::new(),
                next_id: 0,
                outer: None,
                outer_ended: false,
                reason: None,
                closed: false,
                draining: false,
            }),
        }
    }

    fn attach_outer(&self, outer: Disposable) {
        let stale = {
            let mut book = self.book.borrow_mut();
            if book.closed || book.outer_ended {
                Some(outer)
            } else {
                book.outer = Some(outer);
                None
            }
        };
        if let Some(outer) = stale {
            outer.dispose();
        }
    }

    fn admit(&self, inner: Stream<A, E>) -> Admit<A, E> {
        let mut book = self.book.borrow_mut();
        if book.closed || book.outer_ended {
            return Admit::Skip;
        }
        if book.running.len() < self.limit {
            return Admit::Start(inner);
        }
        match self.strategy {
            OverflowStrategy::Hold => {
                book.queue.push_back(inner);
                log::trace!("join: all {} slots busy, queued ({} waiting)", self.limit, book.queue.len());
                Admit::Skip
            }
            OverflowStrategy::Swap => {
                let oldest = book.running.keys().next().copied();
                let evicted = oldest.and_then(|id| book.running.remove(&id)).flatten();
                log::trace!("join: all {} slots busy, evicting oldest {:?}", self.limit, oldest);
                Admit::Replace(evicted, inner)
            }
            OverflowStrategy::Drop => {
                log::trace!("join: all {} slots busy, dropping inner stream", self.limit);
                Admit::Skip
            }
        }
    }

    /// Send `end` downstream if the outer has ended and no work remains
    fn try_finish(&self) {
        let reason = {
            let mut book = self.book.borrow_mut();
            let idle = book.running.is_empty() && book.queue.is_empty();
            if book.closed || !book.outer_ended || !idle {
                return;
            }
            book.closed = true;
            book.outer = None;
            book.reason.take()
        };
        self.downstream.end(reason);
    }

    fn dispose(&self) {
        let (outer, inners) = {
            let mut book = self.book.borrow_mut();
            if book.closed {
                return;
            }
            book.closed = true;
            book.queue.clear();
            let inners: Vec<Disposable> = std::mem::take(&mut book.running)
                .into_values()
                .flatten()
                .collect();
            (book.outer.take(), inners)
        };
        if let Some(outer) = outer {
            outer.dispose();
        }
        for inner in inners {
            inner.dispose();
        }
    }
}

/// Forgets a running entry if the inner's `run` unwinds
struct StartGuard<'a, A, E> {
    book: &'a RefCell<Book<A, E>>,
    id: u64,
    armed: bool,
}

impl<A, E> Drop for StartGuard<'_, A, E> {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut book) = self.book.try_borrow_mut() {
                book.running.remove(&self.id);
            }
        }
    }
}

/// Clears the draining flag once the drain loop leaves, normally or not
struct DrainGuard<'a, A, E> {
    book: &'a RefCell<Book<A, E>>,
}

impl<A, E> Drop for DrainGuard<'_, A, E> {
    fn drop(&mut self) {
        if let Ok(mut book) = self.book.try_borrow_mut() {
            book.draining = false;
        }
    }
}

fn start_inner<A: 'static, E: Clone + 'static>(state: &Rc<JoinState<A, E>>, inner: Stream<A, E>) {
    let id = {
        let mut book = state.book.borrow_mut();
        let id = book.next_id;
        book.next_id += 1;
        book.running.insert(id, None);
        id
    };

    let sink: SinkRef<A> = Rc::new(InnerSink {
        state: Rc::clone(state),
        id,
    });
    let mut guard = StartGuard {
        book: &state.book,
        id,
        armed: true,
    };
    let d = inner.run(sink, &state.env);
    guard.armed = false;

    // The inner may have ended, been swapped out or been disposed while
    // still inside `run`; in that case its handle is released right away.
    let orphan = {
        let mut book = state.book.borrow_mut();
        match book.running.get_mut(&id) {
            Some(slot) => {
                *slot = Some(d);
                None
            }
            None => Some(d),
        }
    };
    if let Some(d) = orphan {
        d.dispose();
    }
}

/// Start queued inner streams while slots are free.
///
/// Only the outermost call loops; a queued inner that ends synchronously
/// re-enters here and returns at once, leaving its successor to that loop.
fn drain<A: 'static, E: Clone + 'static>(state: &Rc<JoinState<A, E>>) {
    {
        let mut book = state.book.borrow_mut();
        if book.draining {
            return;
        }
        book.draining = true;
    }
    let _guard = DrainGuard { book: &state.book };
    loop {
        let next = {
            let mut book = state.book.borrow_mut();
            if book.closed || book.running.len() >= state.limit {
                None
            } else {
                book.queue.pop_front()
            }
        };
        match next {
            Some(next) => start_inner(state, next),
            None => break,
        }
    }
}

struct OuterSink<A, E> {
    state: Rc<JoinState<A, E>>,
}

impl<A: 'static, E: Clone + 'static> Sink<Stream<A, E>> for OuterSink<A, E> {
    fn event(&self, inner: Stream<A, E>) {
        match self.state.admit(inner) {
            Admit::Start(inner) => start_inner(&self.state, inner),
            Admit::Replace(evicted, inner) => {
                if let Some(evicted) = evicted {
                    evicted.dispose();
                }
                start_inner(&self.state, inner);
            }
            Admit::Skip => {}
        }
    }

    fn end(&self, reason: Option<StreamError>) {
        {
            let mut book = self.state.book.borrow_mut();
            if book.closed || book.outer_ended {
                return;
            }
            book.outer_ended = true;
            if book.reason.is_none() {
                book.reason = reason;
            }
            book.outer = None;
        }
        self.state.try_finish();
    }
}

struct InnerSink<A, E> {
    state: Rc<JoinState<A, E>>,
    id: u64,
}

impl<A: 'static, E: Clone + 'static> Sink<A> for InnerSink<A, E> {
    fn event(&self, value: A) {
        let live = self.state.book.borrow().running.contains_key(&self.id);
        if live {
            self.state.downstream.event(value);
        }
    }

    fn end(&self, reason: Option<StreamError>) {
        {
            let mut book = self.state.book.borrow_mut();
            if book.running.remove(&self.id).is_none() {
                return;
            }
            if book.reason.is_none() {
                book.reason = reason;
            }
        }
        drain(&self.state);
        self.state.try_finish();
    }
}

/// Flatten a stream of streams, running at most `config.concurrency` inner
/// streams at once and resolving overflow with `config.strategy`.
///
/// The result ends once the outer stream and every started or queued inner
/// stream have ended. The first end reason seen from any of them is carried
/// on that final `end`.
pub fn join<A, E>(streams: Stream<Stream<A, E>, E>, config: JoinConfig) -> Stream<A, E>
where
    A: 'static,
    E: Clone + 'static,
{
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let state = Rc::new(JoinState::new(sink, env.clone(), config));
        let outer: SinkRef<Stream<A, E>> = Rc::new(OuterSink {
            state: Rc::clone(&state),
        });
        let d = streams.run(outer, env);
        state.attach_outer(d);
        Disposable::new(move || state.dispose())
    })
}

/// Map every value to a stream and merge them all
pub fn flat_map<A, B, E, F>(stream: Stream<A, E>, f: F) -> Stream<B, E>
where
    A: 'static,
    B: 'static,
    E: Clone + 'static,
    F: Fn(A) -> Stream<B, E> + 'static,
{
    join(map(stream, f), JoinConfig::default())
}

/// Map every value to a stream, each new one cancelling the previous
pub fn switch_map<A, B, E, F>(stream: Stream<A, E>, f: F) -> Stream<B, E>
where
    A: 'static,
    B: 'static,
    E: Clone + 'static,
    F: Fn(A) -> Stream<B, E> + 'static,
{
    join(map(stream, f), JoinConfig::switching())
}

/// Map every value to a stream, ignoring values that arrive while one runs
pub fn exhaust_map<A, B, E, F>(stream: Stream<A, E>, f: F) -> Stream<B, E>
where
    A: 'static,
    B: 'static,
    E: Clone + 'static,
    F: Fn(A) -> Stream<B, E> + 'static,
{
    join(map(stream, f), JoinConfig::exhausting())
}

/// Map every value to a stream and run them one after another
pub fn concat_map<A, B, E, F>(stream: Stream<A, E>, f: F) -> Stream<B, E>
where
    A: 'static,
    B: 'static,
    E: Clone + 'static,
    F: Fn(A) -> Stream<B, E> + 'static,
{
    join(map(stream, f), JoinConfig::sequential())
}

/// Run every stream at once and interleave their values
pub fn merge<A, E>(streams: Vec<Stream<A, E>>) -> Stream<A, E>
where
    A: 'static,
    E: Clone + 'static,
{
    join(from_iter(streams), JoinConfig::default())
}

/// Emit `f(latest left, latest right)` whenever either side emits, once
/// both have emitted. Ends when both sides have ended.
pub fn combine<L, R, O, E, F>(left: Stream<L, E>, right: Stream<R, E>, f: F) -> Stream<O, E>
where
    L: Clone + 'static,
    R: Clone + 'static,
    O: 'static,
    E: Clone + 'static,
    F: Fn(&L, &R) -> O + 'static,
{
    let tagged = merge(vec![map(left, Either::Left), map(right, Either::Right)]);
    let latest = loop_with(
        tagged,
        (None::<L>, None::<R>),
        |(l, r), side: Either<L, R>| {
            let next = match side {
                Either::Left(l) => (Some(l), r),
                Either::Right(r) => (l, Some(r)),
            };
            let both = match &next {
                (Some(l), Some(r)) => Some((l.clone(), r.clone())),
                _ => None,
            };
            (next, both)
        },
    );
    filter_map(latest, move |both| both.map(|(l, r)| f(&l, &r)))
}

/// Apply the latest function to the latest value whenever either changes
pub fn apply<A, B, F, E>(functions: Stream<F, E>, values: Stream<A, E>) -> Stream<B, E>
where
    A: Clone + 'static,
    B: 'static,
    F: Fn(A) -> B + Clone + 'static,
    E: Clone + 'static,
{
    combine(functions, values, |f, a| f(a.clone()))
}
