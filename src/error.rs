//! Error types and handling for pulse-stream
//!
//! Streams have no error channel distinct from termination: a producer that
//! fails ends with a [`StreamError`] as its reason. The engine never
//! interprets the reason, it only carries it to the consumer.

use thiserror::Error;

/// Main error type, used as the optional reason carried by `end`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The subscription was cancelled before it settled
    #[error("Operation cancelled")]
    Cancelled,
    /// A join was configured with a concurrency of zero
    #[error("Invalid concurrency: {0} (must be at least 1)")]
    InvalidConcurrency(usize),
    /// A producer failed, e.g. a future resolved to an error
    #[error("Producer failed: {0}")]
    Failed(String),
    /// Custom error with message
    #[error("Stream error: {0}")]
    Custom(String),
}

impl StreamError {
    pub fn custom(msg: impl Into<String>) -> Self {
        StreamError::Custom(msg.into())
    }
}

impl From<futures::channel::oneshot::Canceled> for StreamError {
    fn from(_: futures::channel::oneshot::Canceled) -> Self {
        StreamError::Cancelled
    }
}

/// Result type for pulse-stream operations
pub type StreamResult<T> = Result<T, StreamError>;
