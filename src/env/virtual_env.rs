//! A deterministic scheduler with a manually advanced clock

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{abortable, LocalBoxFuture};
use futures::task::{noop_waker_ref, LocalSpawnExt};
use futures::FutureExt;

use super::{Interval, Spawn, Timeout};
use crate::disposable::Disposable;

enum TimerTask {
    Once(Box<dyn FnOnce()>),
    Every(Duration, Box<dyn FnMut()>),
}

struct Timer {
    deadline: Duration,
    task: TimerTask,
}

struct Scheduler {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    // Keyed by id so ties on the deadline fire in scheduling order.
    timers: RefCell<BTreeMap<u64, Timer>>,
    // The timer whose callback is on the stack, and whether it was disposed
    // from inside that callback.
    firing: Cell<Option<u64>>,
    firing_cancelled: Cell<bool>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

/// Environment whose time only moves when told to.
///
/// Spawned futures run on an internal [`LocalPool`] when the scheduler is
/// flushed; timers fire in deadline order as [`advance`](VirtualEnv::advance)
/// walks the clock forward. None of the driving methods may be called from
/// inside a task or timer callback.
#[derive(Clone)]
pub struct VirtualEnv {
    inner: Rc<Scheduler>,
}

impl VirtualEnv {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            inner: Rc::new(Scheduler {
                now: Cell::new(Duration::ZERO),
                next_id: Cell::new(0),
                timers: RefCell::new(BTreeMap::new()),
                firing: Cell::new(None),
                firing_cancelled: Cell::new(false),
                pool: RefCell::new(pool),
                spawner,
            }),
        }
    }

    /// Time elapsed on the virtual clock
    pub fn now(&self) -> Duration {
        self.inner.now.get()
    }

    /// Number of timers still scheduled
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Run spawned tasks until none can make progress without time passing
    pub fn run_until_stalled(&self) {
        self.inner.pool.borrow_mut().run_until_stalled();
    }

    /// Move the clock forward by `by`, firing every timer that falls due
    pub fn advance(&self, by: Duration) {
        self.advance_to(self.now() + by);
    }

    fn advance_to(&self, target: Duration) {
        loop {
            self.run_until_stalled();
            let due = {
                let timers = self.inner.timers.borrow();
                timers
                    .iter()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(id, t)| (t.deadline, **id))
                    .map(|(id, _)| *id)
            };
            let Some(id) = due else { break };
            let timer = self.inner.timers.borrow_mut().remove(&id);
            if let Some(timer) = timer {
                self.inner.now.set(timer.deadline);
                self.fire(id, timer);
            }
        }
        if target > self.now() {
            self.inner.now.set(target);
        }
        self.run_until_stalled();
    }

    fn fire(&self, id: u64, timer: Timer) {
        match timer.task {
            TimerTask::Once(task) => task(),
            TimerTask::Every(period, mut task) => {
                self.inner.firing.set(Some(id));
                self.inner.firing_cancelled.set(false);
                task();
                self.inner.firing.set(None);
                if !self.inner.firing_cancelled.replace(false) {
                    self.inner.timers.borrow_mut().insert(
                        id,
                        Timer {
                            deadline: timer.deadline + period,
                            task: TimerTask::Every(period, task),
                        },
                    );
                }
            }
        }
    }

    fn next_deadline(&self) -> Option<Duration> {
        self.inner.timers.borrow().values().map(|t| t.deadline).min()
    }

    /// Drive the scheduler until `fut` resolves.
    ///
    /// Returns `None` if the future is still pending once no task can run
    /// and no timer remains.
    pub fn block_on<F: Future>(&self, fut: F) -> Option<F::Output> {
        let mut fut = std::pin::pin!(fut);
        let mut cx = Context::from_waker(noop_waker_ref());
        loop {
            if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
                return Some(out);
            }
            self.run_until_stalled();
            if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
                return Some(out);
            }
            match self.next_deadline() {
                Some(deadline) => self.advance_to(deadline),
                None => return None,
            }
        }
    }

    fn schedule(&self, deadline: Duration, task: TimerTask) -> Disposable {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .timers
            .borrow_mut()
            .insert(id, Timer { deadline, task });

        let scheduler = Rc::downgrade(&self.inner);
        Disposable::new(move || {
            if let Some(scheduler) = scheduler.upgrade() {
                let removed = scheduler.timers.borrow_mut().remove(&id).is_some();
                if !removed && scheduler.firing.get() == Some(id) {
                    scheduler.firing_cancelled.set(true);
                }
            }
        })
    }
}

impl Default for VirtualEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawn for VirtualEnv {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) -> Disposable {
        let (task, handle) = abortable(task);
        if let Err(err) = self.inner.spawner.spawn_local(task.map(|_| ())) {
            log::warn!("Virtual scheduler refused task: {}", err);
        }
        Disposable::new(move || handle.abort())
    }
}

impl Timeout for VirtualEnv {
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Disposable {
        self.schedule(self.now() + delay, TimerTask::Once(task))
    }
}

impl Interval for VirtualEnv {
    fn set_interval(&self, period: Duration, task: Box<dyn FnMut()>) -> Disposable {
        let period = period.max(Duration::from_nanos(1));
        self.schedule(self.now() + period, TimerTask::Every(period, task))
    }
}
