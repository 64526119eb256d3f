use futures::future::Either;

use crate::combinators;
use crate::disposable::Disposable;
use crate::join;
use crate::run::{self, PullStream, Settle};
use crate::share;
use crate::sink::SinkRef;
use crate::stream::Stream;

/// Extension trait providing method-chaining access to every combinator
pub trait StreamExt<A, E>: Sized
where
    A: 'static,
    E: 'static,
{
    fn into_stream(self) -> Stream<A, E>;

    /// Map elements of the stream with a function
    fn map<B, F>(self, f: F) -> Stream<B, E>
    where
        B: 'static,
        F: Fn(A) -> B + 'static,
    {
        combinators::map(self.into_stream(), f)
    }

    fn filter<P>(self, predicate: P) -> Stream<A, E>
    where
        P: Fn(&A) -> bool + 'static,
    {
        combinators::filter(self.into_stream(), predicate)
    }

    fn filter_map<B, F>(self, f: F) -> Stream<B, E>
    where
        B: 'static,
        F: Fn(A) -> Option<B> + 'static,
    {
        combinators::filter_map(self.into_stream(), f)
    }

    fn tap<F>(self, f: F) -> Stream<A, E>
    where
        F: Fn(&A) + 'static,
    {
        combinators::tap(self.into_stream(), f)
    }

    fn partition<P>(self, predicate: P) -> (Stream<A, E>, Stream<A, E>)
    where
        P: Fn(&A) -> bool + 'static,
    {
        combinators::partition(self.into_stream(), predicate)
    }

    fn partition_map<B, C, F>(self, f: F) -> (Stream<B, E>, Stream<C, E>)
    where
        B: 'static,
        C: 'static,
        F: Fn(A) -> Either<B, C> + 'static,
    {
        combinators::partition_map(self.into_stream(), f)
    }

    /// Emit every intermediate accumulator
    fn scan<S, F>(self, seed: S, f: F) -> Stream<S, E>
    where
        S: Clone + 'static,
        F: Fn(S, A) -> S + 'static,
    {
        combinators::scan(self.into_stream(), seed, f)
    }

    fn loop_with<B, S, F>(self, seed: S, f: F) -> Stream<B, E>
    where
        B: 'static,
        S: Clone + 'static,
        F: Fn(S, A) -> (S, B) + 'static,
    {
        combinators::loop_with(self.into_stream(), seed, f)
    }

    fn indexed(self) -> Stream<(usize, A), E> {
        combinators::indexed(self.into_stream())
    }

    fn with_index(self, start: usize, step: usize) -> Stream<(usize, A), E> {
        combinators::with_index(self.into_stream(), start, step)
    }

    fn skip(self, n: usize) -> Stream<A, E> {
        combinators::skip(self.into_stream(), n)
    }

    fn start_with(self, value: A) -> Stream<A, E>
    where
        A: Clone,
    {
        combinators::start_with(self.into_stream(), value)
    }

    fn take(self, n: usize) -> Stream<A, E> {
        combinators::take(self.into_stream(), n)
    }

    fn take_until<P>(self, predicate: P) -> Stream<A, E>
    where
        P: Fn(&A) -> bool + 'static,
    {
        combinators::take_until(self.into_stream(), predicate)
    }

    fn take_while<P>(self, predicate: P) -> Stream<A, E>
    where
        P: Fn(&A) -> bool + 'static,
    {
        combinators::take_while(self.into_stream(), predicate)
    }

    fn repeat(self, times: usize) -> Stream<A, E>
    where
        E: Clone,
    {
        combinators::repeat(self.into_stream(), times)
    }

    fn flat_map<B, F>(self, f: F) -> Stream<B, E>
    where
        B: 'static,
        E: Clone,
        F: Fn(A) -> Stream<B, E> + 'static,
    {
        join::flat_map(self.into_stream(), f)
    }

    fn switch_map<B, F>(self, f: F) -> Stream<B, E>
    where
        B: 'static,
        E: Clone,
        F: Fn(A) -> Stream<B, E> + 'static,
    {
        join::switch_map(self.into_stream(), f)
    }

    fn exhaust_map<B, F>(self, f: F) -> Stream<B, E>
    where
        B: 'static,
        E: Clone,
        F: Fn(A) -> Stream<B, E> + 'static,
    {
        join::exhaust_map(self.into_stream(), f)
    }

    fn concat_map<B, F>(self, f: F) -> Stream<B, E>
    where
        B: 'static,
        E: Clone,
        F: Fn(A) -> Stream<B, E> + 'static,
    {
        join::concat_map(self.into_stream(), f)
    }

    fn with_latest<B>(self, other: Stream<B, E>) -> Stream<(A, B), E>
    where
        B: Clone + 'static,
    {
        share::with_latest(self.into_stream(), other)
    }

    fn distinct(self) -> Stream<A, E>
    where
        A: Clone + PartialEq,
    {
        share::distinct(self.into_stream())
    }

    fn distinct_by<F>(self, same: F) -> Stream<A, E>
    where
        A: Clone,
        F: Fn(&A, &A) -> bool + 'static,
    {
        share::distinct_by(self.into_stream(), same)
    }

    /// Share one upstream run, bound to `env`, among all subscribers
    fn multicast<E2: 'static>(self, env: E) -> Stream<A, E2>
    where
        A: Clone,
    {
        share::multicast(self.into_stream(), env)
    }

    /// Like [`StreamExt::multicast`], replaying the latest value to newcomers
    fn hold<E2: 'static>(self, env: E) -> Stream<A, E2>
    where
        A: Clone,
    {
        share::hold(self.into_stream(), env)
    }

    /// Run with a guarded sink; see [`run::run`]
    fn subscribe(self, sink: SinkRef<A>, env: &E) -> Disposable {
        run::run(&self.into_stream(), sink, env)
    }

    fn collect(self, env: &E) -> Settle<Vec<A>> {
        run::collect(&self.into_stream(), env)
    }

    fn for_each<F>(self, f: F, env: &E) -> Settle<()>
    where
        F: Fn(A) + 'static,
    {
        run::for_each(&self.into_stream(), f, env)
    }

    fn run_future(self, env: &E) -> Settle<()> {
        run::run_future(&self.into_stream(), env)
    }

    fn into_pull_stream(self, env: &E) -> PullStream<A> {
        run::into_pull_stream(&self.into_stream(), env)
    }
}

impl<A: 'static, E: 'static> StreamExt<A, E> for Stream<A, E> {
    fn into_stream(self) -> Stream<A, E> {
        self
    }
}
