//! Sharing one upstream run among many subscribers
//!
//! [`multicast`] and [`hold`] reference-count their subscribers: the first
//! subscriber starts the upstream, the last one to leave disposes it. Each
//! upstream run is tagged with a generation so that callbacks from a run
//! that has already been stopped are ignored.

use std::cell::RefCell;
use std::rc::Rc;

use crate::combinators::forward;
use crate::disposable::Disposable;
use crate::error::StreamError;
use crate::sink::{sink, Sink, SinkRef};
use crate::stream::Stream;

struct Subscriber<A> {
    id: u64,
    sink: SinkRef<A>,
    handle: Disposable,
}

struct Subscribers<A> {
    list: Vec<Subscriber<A>>,
    next_id: u64,
    upstream: Option<Disposable>,
    running: bool,
    generation: u64,
    // Only written when replaying.
    last: Option<A>,
    ended: Option<Option<StreamError>>,
}

struct Share<A, E> {
    source: Stream<A, E>,
    env: E,
    replay: bool,
    state: RefCell<Subscribers<A>>,
}

fn same_sink<A>(a: &SinkRef<A>, b: &SinkRef<A>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

enum Attach<A> {
    Existing(Disposable),
    Ended(Option<A>, Option<StreamError>),
    New {
        handle: Disposable,
        replay: Option<A>,
        start: bool,
    },
}

impl<A: Clone + 'static, E: 'static> Share<A, E> {
    fn new(source: Stream<A, E>, env: E, replay: bool) -> Self {
        Self {
            source,
            env,
            replay,
            state: RefCell::new(Subscribers {
                list: Vec::new(),
                next_id: 0,
                upstream: None,
                running: false,
                generation: 0,
                last: None,
                ended: None,
            }),
        }
    }

    fn is_attached(&self, id: u64, generation: u64) -> bool {
        let state = self.state.borrow();
        state.generation == generation && state.list.iter().any(|s| s.id == id)
    }

    fn detach(&self, id: u64) {
        let upstream = {
            let mut state = self.state.borrow_mut();
            let before = state.list.len();
            state.list.retain(|s| s.id != id);
            if state.list.len() == before || !state.list.is_empty() || !state.running {
                return;
            }
            state.running = false;
            state.generation += 1;
            state.upstream.take()
        };
        log::debug!("share: last subscriber left, stopping upstream");
        if let Some(upstream) = upstream {
            upstream.dispose();
        }
    }
}

fn attach<A: Clone + 'static, E: 'static>(share: &Rc<Share<A, E>>, sink: SinkRef<A>) -> Disposable {
    let attach = {
        let mut state = share.state.borrow_mut();
        if let Some(existing) = state.list.iter().find(|s| same_sink(&s.sink, &sink)) {
            Attach::Existing(existing.handle.clone())
        } else if let Some(reason) = &state.ended {
            Attach::Ended(state.last.clone(), reason.clone())
        } else {
            let id = state.next_id;
            state.next_id += 1;
            let owner = Rc::clone(share);
            let handle = Disposable::new(move || owner.detach(id));
            state.list.push(Subscriber {
                id,
                sink: Rc::clone(&sink),
                handle: handle.clone(),
            });
            let start = !state.running;
            state.running = true;
            let replay = if share.replay { state.last.clone() } else { None };
            Attach::New { handle, replay, start }
        }
    };

    match attach {
        Attach::Existing(handle) => handle,
        Attach::Ended(last, reason) => {
            if let Some(value) = last {
                sink.event(value);
            }
            sink.end(reason);
            Disposable::noop()
        }
        Attach::New { handle, replay, start } => {
            if let Some(value) = replay {
                sink.event(value);
            }
            // A subscriber that left during replay already reset `running`.
            if start && !handle.is_disposed() {
                start_upstream(share);
            }
            handle
        }
    }
}

fn start_upstream<A: Clone + 'static, E: 'static>(share: &Rc<Share<A, E>>) {
    let generation = {
        let mut state = share.state.borrow_mut();
        state.generation += 1;
        state.generation
    };
    log::debug!("share: first subscriber arrived, starting upstream (run {})", generation);

    let fan_out: SinkRef<A> = Rc::new(FanOut {
        share: Rc::clone(share),
        generation,
    });
    let d = share.source.run(fan_out, &share.env);

    let stale = {
        let mut state = share.state.borrow_mut();
        if state.running && state.generation == generation {
            state.upstream = Some(d);
            None
        } else {
            Some(d)
        }
    };
    if let Some(d) = stale {
        d.dispose();
    }
}

/// Delivers one upstream run to every subscriber attached at delivery time
struct FanOut<A, E> {
    share: Rc<Share<A, E>>,
    generation: u64,
}

impl<A: Clone + 'static, E: 'static> Sink<A> for FanOut<A, E> {
    fn event(&self, value: A) {
        let targets: Vec<(u64, SinkRef<A>)> = {
            let mut state = self.share.state.borrow_mut();
            if !state.running || state.generation != self.generation {
                return;
            }
            if self.share.replay {
                state.last = Some(value.clone());
            }
            state.list.iter().map(|s| (s.id, Rc::clone(&s.sink))).collect()
        };
        for (id, sink) in targets {
            // Earlier deliveries may have detached later subscribers.
            if self.share.is_attached(id, self.generation) {
                sink.event(value.clone());
            }
        }
    }

    fn end(&self, reason: Option<StreamError>) {
        let targets = {
            let mut state = self.share.state.borrow_mut();
            if !state.running || state.generation != self.generation {
                return;
            }
            state.running = false;
            state.upstream = None;
            if self.share.replay {
                state.ended = Some(reason.clone());
            }
            std::mem::take(&mut state.list)
        };
        for subscriber in targets {
            subscriber.sink.end(reason.clone());
        }
    }
}

/// Share one run of `stream` among every subscriber.
///
/// The upstream is run with `env` when the first subscriber attaches and
/// disposed when the last one leaves; a later subscriber starts a fresh run.
/// Subscribers are identified by sink identity: attaching the same sink
/// twice returns the same handle. Late subscribers only see live values.
pub fn multicast<A, E, E2>(stream: Stream<A, E>, env: E) -> Stream<A, E2>
where
    A: Clone + 'static,
    E: 'static,
    E2: 'static,
{
    let share = Rc::new(Share::new(stream, env, false));
    Stream::new(move |sink: SinkRef<A>, _env: &E2| attach(&share, sink))
}

/// [`multicast`] that also remembers the latest value.
///
/// A new subscriber receives the remembered value synchronously before any
/// live value. Once the upstream has ended, every later subscriber receives
/// the remembered value (if any) and `end` immediately, and the upstream is
/// not run again.
pub fn hold<A, E, E2>(stream: Stream<A, E>, env: E) -> Stream<A, E2>
where
    A: Clone + 'static,
    E: 'static,
    E2: 'static,
{
    let share = Rc::new(Share::new(stream, env, true));
    Stream::new(move |sink: SinkRef<A>, _env: &E2| attach(&share, sink))
}

/// Pair every value of `first` with the latest value of `second`.
///
/// Values of `first` that arrive before `second` has emitted are dropped.
/// The result ends with `first`, which also disposes `second`.
pub fn with_latest<A, B, E>(first: Stream<A, E>, second: Stream<B, E>) -> Stream<(A, B), E>
where
    A: 'static,
    B: Clone + 'static,
    E: 'static,
{
    Stream::new(move |downstream: SinkRef<(A, B)>, env: &E| {
        let latest: Rc<RefCell<Option<B>>> = Rc::new(RefCell::new(None));

        let store = Rc::clone(&latest);
        let second_run = second.run(
            sink(move |b: B| *store.borrow_mut() = Some(b), |_| {}),
            env,
        );

        let on_end = second_run.clone();
        let first_sink = sink(
            {
                let downstream = Rc::clone(&downstream);
                move |a: A| {
                    let b = latest.borrow().clone();
                    if let Some(b) = b {
                        downstream.event((a, b));
                    }
                }
            },
            move |reason| {
                on_end.dispose();
                downstream.end(reason);
            },
        );
        let first_run = first.run(first_sink, env);
        Disposable::all(vec![first_run, second_run])
    })
}

/// Suppress values equal to the previously forwarded one
pub fn distinct<A, E>(stream: Stream<A, E>) -> Stream<A, E>
where
    A: Clone + PartialEq + 'static,
    E: 'static,
{
    distinct_by(stream, |a, b| a == b)
}

/// Suppress values that `same` considers equal to the previously forwarded
/// one. Non-adjacent repeats are kept.
pub fn distinct_by<A, E, F>(stream: Stream<A, E>, same: F) -> Stream<A, E>
where
    A: Clone + 'static,
    E: 'static,
    F: Fn(&A, &A) -> bool + 'static,
{
    let same = Rc::new(same);
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let same = Rc::clone(&same);
        let last: RefCell<Option<A>> = RefCell::new(None);
        stream.run(
            forward(sink, move |down: &SinkRef<A>, a: A| {
                let repeat = last.borrow().as_ref().is_some_and(|prev| same(prev, &a));
                if !repeat {
                    *last.borrow_mut() = Some(a.clone());
                    down.event(a);
                }
            }),
            env,
        )
    })
}
