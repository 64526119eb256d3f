//! Environment capabilities threaded through every stream run
//!
//! A stream never reaches for ambient timers or executors. Sources that need
//! to defer work ask the environment they are run with, through one of the
//! capability traits below, and combinators stay generic over the
//! environment type so the requirements of composed streams add up.

pub mod tokio_env;
pub mod virtual_env;

use std::time::Duration;

use futures::future::LocalBoxFuture;

use crate::disposable::Disposable;

pub use tokio_env::TokioEnv;
pub use virtual_env::VirtualEnv;

/// Run a future on the current thread's scheduler
pub trait Spawn {
    /// Spawn `task`; disposing the handle aborts it at its next suspension
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) -> Disposable;
}

/// Schedule a callback once after a delay
pub trait Timeout {
    fn set_timeout(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Disposable;
}

/// Schedule a callback repeatedly, first firing one `period` from now
pub trait Interval {
    fn set_interval(&self, period: Duration, task: Box<dyn FnMut()>) -> Disposable;
}
