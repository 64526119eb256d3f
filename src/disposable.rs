//! Cancellation handles for running streams

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

struct Inner {
    disposed: Cell<bool>,
    release: RefCell<Option<Box<dyn FnOnce()>>>,
}

/// Handle to work in progress that can be cancelled.
///
/// The release action runs at most once no matter how many times
/// [`dispose`](Disposable::dispose) is called or how many clones of the
/// handle exist; every call after the first is a no-op.
#[derive(Clone)]
pub struct Disposable {
    inner: Rc<Inner>,
}

impl Disposable {
    /// Create a handle that runs `release` on first disposal
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            inner: Rc::new(Inner {
                disposed: Cell::new(false),
                release: RefCell::new(Some(Box::new(release))),
            }),
        }
    }

    /// A handle with nothing to release
    pub fn noop() -> Self {
        Self {
            inner: Rc::new(Inner {
                disposed: Cell::new(false),
                release: RefCell::new(None),
            }),
        }
    }

    /// Dispose every handle in `all` when this one is disposed
    pub fn all(all: Vec<Disposable>) -> Self {
        Self::new(move || {
            for d in all {
                d.dispose();
            }
        })
    }

    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        // Take the action out first so a release that re-enters this handle
        // finds nothing left to run.
        let release = self.inner.release.borrow_mut().take();
        if let Some(release) = release {
            release();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl Default for Disposable {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A slot for a disposable that may be filled after the work it guards has
/// already been asked to stop.
///
/// Synchronous producers can deliver events (and trigger cancellation)
/// before `run` has returned their handle. Disposing an empty slot marks it,
/// and the handle is disposed as soon as it is [`set`](DisposableSlot::set).
#[derive(Clone, Default)]
pub(crate) struct DisposableSlot {
    inner: Rc<SlotInner>,
}

#[derive(Default)]
struct SlotInner {
    disposed: Cell<bool>,
    handle: RefCell<Option<Disposable>>,
}

impl DisposableSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, handle: Disposable) {
        if self.inner.disposed.get() {
            handle.dispose();
        } else {
            *self.inner.handle.borrow_mut() = Some(handle);
        }
    }

    pub(crate) fn dispose(&self) {
        self.inner.disposed.set(true);
        let handle = self.inner.handle.borrow_mut().take();
        if let Some(handle) = handle {
            handle.dispose();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispose_runs_release_once() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let d = Disposable::new(move || c.set(c.get() + 1));
        let d2 = d.clone();

        d.dispose();
        d.dispose();
        d2.dispose();

        assert_eq!(count.get(), 1);
        assert!(d2.is_disposed());
    }

    #[test]
    fn test_reentrant_dispose_is_noop() {
        let count = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Disposable>>> = Rc::new(RefCell::new(None));
        let (c, s) = (count.clone(), slot.clone());
        let d = Disposable::new(move || {
            c.set(c.get() + 1);
            if let Some(me) = s.borrow().as_ref() {
                me.dispose();
            }
        });
        *slot.borrow_mut() = Some(d.clone());

        d.dispose();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_slot_disposes_late_handle() {
        let count = Rc::new(Cell::new(0));
        let slot = DisposableSlot::new();
        slot.dispose();

        let c = count.clone();
        slot.set(Disposable::new(move || c.set(c.get() + 1)));
        assert_eq!(count.get(), 1);
        assert!(slot.is_disposed());
    }
}
