//! Configuration types for the join engine

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};

/// What a join does with a new inner stream when every slot is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowStrategy {
    /// Queue it and start it when a slot frees up (first in, first out)
    Hold,
    /// Dispose the oldest running inner stream and start the new one
    Swap,
    /// Ignore the new inner stream
    Drop,
}

/// Maximum number of inner streams a join runs at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    Bounded(NonZeroUsize),
    #[default]
    Unbounded,
}

impl Concurrency {
    /// A limit of `n` running inner streams; zero is rejected
    pub fn bounded(n: usize) -> StreamResult<Self> {
        NonZeroUsize::new(n)
            .map(Concurrency::Bounded)
            .ok_or(StreamError::InvalidConcurrency(n))
    }

    pub fn one() -> Self {
        Concurrency::Bounded(NonZeroUsize::MIN)
    }

    pub(crate) fn limit(&self) -> usize {
        match self {
            Concurrency::Bounded(n) => n.get(),
            Concurrency::Unbounded => usize::MAX,
        }
    }
}

/// Configuration for [`crate::join::join`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
    #[serde(default)]
    pub concurrency: Concurrency,
    pub strategy: OverflowStrategy,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            concurrency: Concurrency::Unbounded,
            strategy: OverflowStrategy::Hold,
        }
    }
}

impl JoinConfig {
    /// Unbounded merge; the strategy never comes into play
    pub fn new() -> Self {
        Self::default()
    }

    /// One inner stream at a time, each new one preempting the last
    pub fn switching() -> Self {
        Self::new().concurrency(Concurrency::one()).strategy(OverflowStrategy::Swap)
    }

    /// One inner stream at a time, new ones ignored while busy
    pub fn exhausting() -> Self {
        Self::new().concurrency(Concurrency::one()).strategy(OverflowStrategy::Drop)
    }

    /// One inner stream at a time, in arrival order
    pub fn sequential() -> Self {
        Self::new().concurrency(Concurrency::one()).strategy(OverflowStrategy::Hold)
    }

    /// Set the concurrency limit
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the overflow strategy
    pub fn strategy(mut self, strategy: OverflowStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}
