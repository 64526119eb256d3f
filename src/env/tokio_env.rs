use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use tokio::time::{interval_at, sleep, Instant};

use super::{Interval, Spawn, Timeout};
use crate::disposable::Disposable;

/// Environment backed by tokio local tasks.
///
/// Every capability spawns onto the current [`tokio::task::LocalSet`], so
/// streams must be run from inside `LocalSet::run_until` (or a task spawned
/// on one).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioEnv;

impl TokioEnv {
    pub fn new() -> Self {
        Self
    }
}

impl Spawn for TokioEnv {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) -> Disposable {
        let handle = tokio::task::spawn_local(task);
        Disposable::new(move || handle.abort())
    }
}

impl Timeout for TokioEnv {
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Disposable {
        self.spawn(Box::pin(async move {
            sleep(delay).await;
            task();
        }))
    }
}

impl Interval for TokioEnv {
    fn set_interval(&self, period: Duration, mut task: Box<dyn FnMut()>) -> Disposable {
        // tokio panics on a zero period
        let period = period.max(Duration::from_nanos(1));
        // abort only lands at the next await, and a late tick may be ready
        // at once, so a callback that disposes its own interval is checked
        let cancelled = Rc::new(Cell::new(false));
        let stop = Rc::clone(&cancelled);
        let ticking = self.spawn(Box::pin(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if cancelled.get() {
                    break;
                }
                task();
            }
        }));
        Disposable::new(move || {
            stop.set(true);
            ticking.dispose();
        })
    }
}
