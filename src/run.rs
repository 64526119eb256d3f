//! Running streams and settling them into values

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::{mpsc, oneshot};
use futures::stream::Stream as FuturesStream;

use crate::disposable::Disposable;
use crate::error::{StreamError, StreamResult};
use crate::sink::{sink, GuardedSink, SinkRef};
use crate::stream::Stream;

/// Run `stream` into `sink`.
///
/// The sink is guarded: it never sees anything after `end`, and nothing at
/// all once the returned handle is disposed.
pub fn run<A, E>(stream: &Stream<A, E>, sink: SinkRef<A>, env: &E) -> Disposable
where
    A: 'static,
    E: 'static,
{
    let guard = Rc::new(GuardedSink::new(sink));
    let d = stream.run(guard.clone(), env);
    Disposable::new(move || {
        guard.close();
        d.dispose();
    })
}

/// A future that resolves when a running stream ends.
///
/// Resolves to `Err` with the end reason if the stream ended with one.
/// Dropping the future disposes the subscription.
#[must_use = "dropping a Settle disposes the subscription"]
pub struct Settle<T> {
    receiver: oneshot::Receiver<StreamResult<T>>,
    subscription: Disposable,
}

impl<T> Future for Settle<T> {
    type Output = StreamResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(canceled)) => Poll::Ready(Err(canceled.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Settle<T> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}

fn settle<A, T, E, F, G>(stream: &Stream<A, E>, env: &E, on_event: F, finish: G) -> Settle<T>
where
    A: 'static,
    T: 'static,
    E: 'static,
    F: Fn(A) + 'static,
    G: Fn() -> T + 'static,
{
    let (tx, rx) = oneshot::channel();
    let tx = RefCell::new(Some(tx));
    let target = sink(on_event, move |reason: Option<StreamError>| {
        if let Some(tx) = tx.borrow_mut().take() {
            let result = match reason {
                None => Ok(finish()),
                Some(err) => Err(err),
            };
            let _ = tx.send(result);
        }
    });
    Settle {
        receiver: rx,
        subscription: run(stream, target, env),
    }
}

/// Run `stream` and resolve once it ends (the `runPromise` of other
/// reactive libraries)
pub fn run_future<A, E>(stream: &Stream<A, E>, env: &E) -> Settle<()>
where
    A: 'static,
    E: 'static,
{
    settle(stream, env, |_| {}, || ())
}

/// Run `f` for every value and resolve once the stream ends
pub fn for_each<A, E, F>(stream: &Stream<A, E>, f: F, env: &E) -> Settle<()>
where
    A: 'static,
    E: 'static,
    F: Fn(A) + 'static,
{
    settle(stream, env, f, || ())
}

/// Gather every value and resolve with them once the stream ends
pub fn collect<A, E>(stream: &Stream<A, E>, env: &E) -> Settle<Vec<A>>
where
    A: 'static,
    E: 'static,
{
    let items = Rc::new(RefCell::new(Vec::new()));
    let push = Rc::clone(&items);
    settle(
        stream,
        env,
        move |a| push.borrow_mut().push(a),
        move || std::mem::take(&mut *items.borrow_mut()),
    )
}

/// A pull-based view of a running stream
///
/// Each value arrives as `Ok`; an end reason arrives as a final `Err`.
/// Dropping it disposes the subscription.
pub struct PullStream<A> {
    receiver: mpsc::UnboundedReceiver<StreamResult<A>>,
    subscription: Disposable,
}

impl<A> FuturesStream for PullStream<A> {
    type Item = StreamResult<A>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl<A> Drop for PullStream<A> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}

/// Run `stream` and expose its values as a [`futures::Stream`]
pub fn into_pull_stream<A, E>(stream: &Stream<A, E>, env: &E) -> PullStream<A>
where
    A: 'static,
    E: 'static,
{
    let (tx, rx) = mpsc::unbounded();
    let end_tx = tx.clone();
    let target = sink(
        move |a| {
            let _ = tx.unbounded_send(Ok(a));
        },
        move |reason: Option<StreamError>| {
            if let Some(err) = reason {
                let _ = end_tx.unbounded_send(Err(err));
            }
            end_tx.close_channel();
        },
    );
    PullStream {
        receiver: rx,
        subscription: run(stream, target, env),
    }
}
