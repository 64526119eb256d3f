//! The consumer side of a stream

use std::cell::Cell;
use std::rc::Rc;

use crate::error::StreamError;

/// Receives zero or more values followed by at most one terminal signal.
///
/// Callbacks take `&self` because delivery is re-entrant: a sink may be
/// called again while one of its own callbacks is still on the stack.
/// Implementations keep their state in `Cell`/`RefCell` and must never hold
/// a borrow across a call into another sink.
pub trait Sink<A> {
    fn event(&self, value: A);

    /// Natural termination, optionally carrying an opaque reason
    fn end(&self, reason: Option<StreamError>);
}

/// Shared handle to a sink. Sharing layers identify subscribers by the
/// address of this allocation.
pub type SinkRef<A> = Rc<dyn Sink<A>>;

/// A sink built from a pair of closures
pub struct FnSink<F, G> {
    on_event: F,
    on_end: G,
}

impl<A, F, G> Sink<A> for FnSink<F, G>
where
    F: Fn(A),
    G: Fn(Option<StreamError>),
{
    fn event(&self, value: A) {
        (self.on_event)(value)
    }

    fn end(&self, reason: Option<StreamError>) {
        (self.on_end)(reason)
    }
}

/// Build a sink from an event callback and an end callback
pub fn sink<A, F, G>(on_event: F, on_end: G) -> SinkRef<A>
where
    A: 'static,
    F: Fn(A) + 'static,
    G: Fn(Option<StreamError>) + 'static,
{
    Rc::new(FnSink { on_event, on_end })
}

/// Enforces the sink contract on behalf of a downstream sink: nothing is
/// delivered after `end` or after [`close`](GuardedSink::close).
pub(crate) struct GuardedSink<A> {
    downstream: SinkRef<A>,
    open: Cell<bool>,
}

impl<A> GuardedSink<A> {
    pub(crate) fn new(downstream: SinkRef<A>) -> Self {
        Self {
            downstream,
            open: Cell::new(true),
        }
    }

    /// Stop all further delivery without signalling `end`
    pub(crate) fn close(&self) {
        self.open.set(false);
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.get()
    }
}

impl<A> Sink<A> for GuardedSink<A> {
    fn event(&self, value: A) {
        if self.open.get() {
            self.downstream.event(value);
        }
    }

    fn end(&self, reason: Option<StreamError>) {
        if self.open.replace(false) {
            self.downstream.end(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_guarded_sink_drops_after_end() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let ends = Rc::new(Cell::new(0));
        let (s, e) = (seen.clone(), ends.clone());
        let guard = GuardedSink::new(sink(
            move |x: i32| s.borrow_mut().push(x),
            move |_| e.set(e.get() + 1),
        ));

        guard.event(1);
        guard.end(None);
        guard.event(2);
        guard.end(None);

        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(ends.get(), 1);
        assert!(!guard.is_open());
    }

    #[test]
    fn test_guarded_sink_close_suppresses_end() {
        let ends = Rc::new(Cell::new(0));
        let e = ends.clone();
        let guard = GuardedSink::new(sink(|_: i32| {}, move |_| e.set(e.get() + 1)));

        guard.close();
        guard.end(None);
        assert_eq!(ends.get(), 0);
    }
}
