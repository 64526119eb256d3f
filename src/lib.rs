//! pulse-stream - a push-based, lazy, cancellable event-stream engine
//!
//! A [`Stream`] is a function from a [`Sink`] and an environment to a
//! [`Disposable`]. Nothing runs until a stream is run; every run is
//! independent and can be cancelled through its disposable. Delivery is
//! synchronous and single-threaded: "concurrency" in [`join`] means logical
//! overlap of inner streams, never threads.
//!
//! ```
//! use pulse_stream::*;
//!
//! let doubled = from_iter::<_, ()>(vec![1, 2, 3]).map(|x| x * 2);
//! let result = futures::executor::block_on(doubled.collect(&()));
//! assert_eq!(result, Ok(vec![2, 4, 6]));
//! ```

pub mod adapter;
pub mod combinators;
pub mod config;
pub mod disposable;
pub mod env;
pub mod error;
pub mod join;
pub mod pipe;
pub mod run;
pub mod share;
pub mod sink;
pub mod stream;
pub mod stream_ext;

pub use adapter::{create_adapter, Dispatcher};
pub use combinators::{
    filter, filter_map, indexed, loop_with, map, partition, partition_map, repeat, scan, skip,
    start_with, take, take_until, take_while, tap, with_index,
};
pub use config::{Concurrency, JoinConfig, OverflowStrategy};
pub use disposable::Disposable;
pub use env::{Interval, Spawn, Timeout, TokioEnv, VirtualEnv};
pub use error::{StreamError, StreamResult};
pub use join::{apply, combine, concat_map, exhaust_map, flat_map, join, merge, switch_map};
pub use run::{collect, for_each, into_pull_stream, run, run_future, PullStream, Settle};
pub use share::{distinct, distinct_by, hold, multicast, with_latest};
pub use sink::{sink, FnSink, Sink, SinkRef};
pub use stream::{
    at, empty, from_future, from_iter, from_result_future, never, periodic, range, wrap, Stream,
};
pub use stream_ext::StreamExt;
