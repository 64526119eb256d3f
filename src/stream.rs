//! The lazy, push-based stream and its source constructors

use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use crate::disposable::Disposable;
use crate::env::{Interval, Spawn, Timeout};
use crate::error::StreamError;
use crate::sink::{GuardedSink, Sink, SinkRef};

/// A lazy producer of values followed by one end signal.
///
/// A stream is only a description: nothing happens until it is
/// [`run`](Stream::run) with a sink and an environment. Every run is
/// independent and starts from scratch, and the returned [`Disposable`]
/// cancels that run alone.
///
/// `E` is the environment the stream needs in order to run. Sources that
/// defer work bound it by capability traits ([`Spawn`], [`Timeout`],
/// [`Interval`]); purely synchronous streams work with any environment.
pub struct Stream<A, E = ()> {
    run: Rc<dyn Fn(SinkRef<A>, &E) -> Disposable>,
}

impl<A, E> Clone for Stream<A, E> {
    fn clone(&self) -> Self {
        Stream {
            run: Rc::clone(&self.run),
        }
    }
}

impl<A, E> fmt::Debug for Stream<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

impl<A, E> Stream<A, E> {
    /// Create a stream from its run function
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(SinkRef<A>, &E) -> Disposable + 'static,
    {
        Stream { run: Rc::new(run) }
    }

    /// Start one run of this stream, delivering into `sink`.
    ///
    /// This is the raw entry point used by combinators; it does not guard
    /// the sink. Consumers should prefer [`crate::run::run`].
    pub fn run(&self, sink: SinkRef<A>, env: &E) -> Disposable {
        (self.run)(sink, env)
    }
}

// ================================
// Core Stream Constructors
// ================================

/// Hand `guard` to deferred work; disposing the result closes the guard
/// before cancelling the work, so nothing reaches the sink afterwards.
fn deferred<A: 'static>(guard: Rc<GuardedSink<A>>, work: Disposable) -> Disposable {
    Disposable::new(move || {
        guard.close();
        work.dispose();
    })
}

/// A stream that ends as soon as it is run
pub fn empty<A, E>() -> Stream<A, E>
where
    A: 'static,
    E: 'static,
{
    Stream::new(|sink: SinkRef<A>, _env: &E| {
        sink.end(None);
        Disposable::noop()
    })
}

/// A stream that never emits and never ends.
///
/// The sink is held until the run is disposed.
pub fn never<A, E>() -> Stream<A, E>
where
    A: 'static,
    E: 'static,
{
    Stream::new(|sink: SinkRef<A>, _env: &E| Disposable::new(move || drop(sink)))
}

/// Emit one value on the next scheduler tick, then end
pub fn wrap<A, E>(value: A) -> Stream<A, E>
where
    A: Clone + 'static,
    E: Spawn + 'static,
{
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let value = value.clone();
        let guard = Rc::new(GuardedSink::new(sink));
        let target = Rc::clone(&guard);
        let task = env.spawn(Box::pin(async move {
            target.event(value);
            target.end(None);
        }));
        deferred(guard, task)
    })
}

/// Emit every item of a finite iterable synchronously, then end
pub fn from_iter<I, E>(iter: I) -> Stream<I::Item, E>
where
    I: IntoIterator + Clone + 'static,
    I::Item: 'static,
    E: 'static,
{
    Stream::new(move |sink: SinkRef<I::Item>, _env: &E| {
        for item in iter.clone() {
            sink.event(item);
        }
        sink.end(None);
        Disposable::noop()
    })
}

/// Emit the output of a future once it resolves, then end.
///
/// `make` is called once per run. Disposing the run aborts the future.
pub fn from_future<A, E, F, Fut>(make: F) -> Stream<A, E>
where
    A: 'static,
    E: Spawn + 'static,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = A> + 'static,
{
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let fut = make();
        let guard = Rc::new(GuardedSink::new(sink));
        let target = Rc::clone(&guard);
        let task = env.spawn(Box::pin(async move {
            let value = fut.await;
            target.event(value);
            target.end(None);
        }));
        deferred(guard, task)
    })
}

/// Like [`from_future`], but an `Err` output ends the stream with the error
/// as its reason instead of emitting.
pub fn from_result_future<A, Er, E, F, Fut>(make: F) -> Stream<A, E>
where
    A: 'static,
    Er: fmt::Display,
    E: Spawn + 'static,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<A, Er>> + 'static,
{
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let fut = make();
        let guard = Rc::new(GuardedSink::new(sink));
        let target = Rc::clone(&guard);
        let task = env.spawn(Box::pin(async move {
            match fut.await {
                Ok(value) => {
                    target.event(value);
                    target.end(None);
                }
                Err(err) => target.end(Some(StreamError::Failed(err.to_string()))),
            }
        }));
        deferred(guard, task)
    })
}

/// Emit `count` numbers starting at `start`, spaced by `step`, then end
pub fn range<E>(count: usize, start: i64, step: i64) -> Stream<i64, E>
where
    E: 'static,
{
    Stream::new(move |sink: SinkRef<i64>, _env: &E| {
        let mut current = start;
        for i in 0..count {
            // step only between values, so the last one may sit at the edge
            if i > 0 {
                current += step;
            }
            sink.event(current);
        }
        sink.end(None);
        Disposable::noop()
    })
}

/// Emit `value` once `delay` has elapsed, then end
pub fn at<A, E>(delay: Duration, value: A) -> Stream<A, E>
where
    A: Clone + 'static,
    E: Timeout + 'static,
{
    Stream::new(move |sink: SinkRef<A>, env: &E| {
        let value = value.clone();
        let guard = Rc::new(GuardedSink::new(sink));
        let target = Rc::clone(&guard);
        let timer = env.set_timeout(
            delay,
            Box::new(move || {
                target.event(value);
                target.end(None);
            }),
        );
        deferred(guard, timer)
    })
}

/// Emit `()` every `period`, forever
pub fn periodic<E>(period: Duration) -> Stream<(), E>
where
    E: Interval + 'static,
{
    Stream::new(move |sink: SinkRef<()>, env: &E| {
        env.set_interval(period, Box::new(move || sink.event(())))
    })
}
