#![allow(dead_code)]

use pulse_stream::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Records everything a stream delivers
pub struct Recorder<A> {
    events: Rc<RefCell<Vec<A>>>,
    ends: Rc<RefCell<Vec<Option<StreamError>>>>,
}

impl<A: Clone + 'static> Recorder<A> {
    pub fn new() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
            ends: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A fresh sink object writing into this recorder
    pub fn sink(&self) -> SinkRef<A> {
        let (events, ends) = (self.events.clone(), self.ends.clone());
        sink(
            move |a| events.borrow_mut().push(a),
            move |reason| ends.borrow_mut().push(reason),
        )
    }

    pub fn values(&self) -> Vec<A> {
        self.events.borrow().clone()
    }

    pub fn end_count(&self) -> usize {
        self.ends.borrow().len()
    }

    pub fn ended(&self) -> bool {
        self.end_count() > 0
    }

    pub fn end_reason(&self) -> Option<StreamError> {
        self.ends.borrow().first().cloned().flatten()
    }
}

/// Emit each value after its delay (relative to the start of the run), then
/// end after the last one
pub fn timed<A: Clone + 'static>(items: Vec<(u64, A)>) -> Stream<A, VirtualEnv> {
    merge(
        items
            .into_iter()
            .map(|(ms, value)| at(Duration::from_millis(ms), value))
            .collect(),
    )
}

/// Wraps `stream` so every run and every disposal is counted
pub fn counted<A: 'static, E: 'static>(
    stream: Stream<A, E>,
) -> (Stream<A, E>, Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let runs = Rc::new(Cell::new(0));
    let disposals = Rc::new(Cell::new(0));
    let (r, d) = (runs.clone(), disposals.clone());
    let wrapped = Stream::new(move |sink: SinkRef<A>, env: &E| {
        r.set(r.get() + 1);
        let inner = stream.run(sink, env);
        let d = d.clone();
        Disposable::new(move || {
            d.set(d.get() + 1);
            inner.dispose();
        })
    });
    (wrapped, runs, disposals)
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
