//! Bridging imperative pushes into a shared stream

use std::cell::RefCell;
use std::rc::Rc;

use crate::disposable::Disposable;
use crate::share::multicast;
use crate::sink::SinkRef;
use crate::stream::Stream;

type Target<A> = Rc<RefCell<Option<SinkRef<A>>>>;

/// The pushing half of an adapter
pub struct Dispatcher<A> {
    target: Target<A>,
}

impl<A> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            target: Rc::clone(&self.target),
        }
    }
}

impl<A> Dispatcher<A> {
    /// Push `value` to every current subscriber.
    ///
    /// Nothing is buffered: with no subscriber attached the value is lost.
    pub fn dispatch(&self, value: A) {
        let target = self.target.borrow().clone();
        match target {
            Some(sink) => sink.event(value),
            None => log::trace!("adapter: dispatch with no subscribers, value dropped"),
        }
    }

    /// End every current subscriber. Later subscribers start a fresh run.
    pub fn end(&self) {
        let target = self.target.borrow_mut().take();
        if let Some(sink) = target {
            sink.end(None);
        }
    }

    pub fn has_subscribers(&self) -> bool {
        self.target.borrow().is_some()
    }
}

/// Create a `(dispatcher, stream)` pair.
///
/// The stream is a [`multicast`], so any number of subscribers share the
/// values pushed through the dispatcher.
pub fn create_adapter<A, E>() -> (Dispatcher<A>, Stream<A, E>)
where
    A: Clone + 'static,
    E: 'static,
{
    let target: Target<A> = Rc::new(RefCell::new(None));

    let slot = Rc::clone(&target);
    let upstream = Stream::new(move |sink: SinkRef<A>, _env: &()| {
        *slot.borrow_mut() = Some(sink);
        let slot = Rc::clone(&slot);
        Disposable::new(move || {
            slot.borrow_mut().take();
        })
    });

    (Dispatcher { target }, multicast(upstream, ()))
}
