use std::rc::Rc;

use crate::combinators;
use crate::stream::Stream;

/// A Pipe represents a stream transformation from one type to another.
/// It's a function from Stream<I> to Stream<O>.
pub struct Pipe<I, O, E = ()> {
    f: Rc<dyn Fn(Stream<I, E>) -> Stream<O, E>>,
}

impl<I, O, E> Clone for Pipe<I, O, E> {
    fn clone(&self) -> Self {
        Pipe {
            f: Rc::clone(&self.f),
        }
    }
}

impl<I, O, E> Pipe<I, O, E> {
    /// Create a new pipe from a function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Stream<I, E>) -> Stream<O, E> + 'static,
    {
        Pipe { f: Rc::new(f) }
    }

    /// Apply this pipe to a stream
    pub fn apply(&self, input: Stream<I, E>) -> Stream<O, E> {
        (self.f)(input)
    }
}

/// Create a pipe that applies the given function to each element
pub fn map<I, O, E, F>(f: F) -> Pipe<I, O, E>
where
    F: Fn(I) -> O + Clone + 'static,
    I: 'static,
    O: 'static,
    E: 'static,
{
    Pipe::new(move |input| combinators::map(input, f.clone()))
}

/// Create a pipe that filters elements based on the predicate
pub fn filter<I, E, F>(predicate: F) -> Pipe<I, I, E>
where
    F: Fn(&I) -> bool + Clone + 'static,
    I: 'static,
    E: 'static,
{
    Pipe::new(move |input| combinators::filter(input, predicate.clone()))
}

/// Compose two pipes together
pub fn compose<I, M, O, E>(p1: Pipe<I, M, E>, p2: Pipe<M, O, E>) -> Pipe<I, O, E>
where
    I: 'static,
    M: 'static,
    O: 'static,
    E: 'static,
{
    Pipe::new(move |input| p2.apply(p1.apply(input)))
}

/// Identity pipe that doesn't transform the stream
pub fn identity<I, E>() -> Pipe<I, I, E>
where
    I: 'static,
    E: 'static,
{
    Pipe::new(|input| input)
}

/// Extension trait for pipes
pub trait PipeExt<I, O, E> {
    /// Compose this pipe with another pipe
    fn compose<P>(self, other: Pipe<O, P, E>) -> Pipe<I, P, E>
    where
        P: 'static;
}

impl<I, O, E> PipeExt<I, O, E> for Pipe<I, O, E>
where
    I: 'static,
    O: 'static,
    E: 'static,
{
    fn compose<P>(self, other: Pipe<O, P, E>) -> Pipe<I, P, E>
    where
        P: 'static,
    {
        compose(self, other)
    }
}
