//! Broker-facing seams.
//!
//! The engine consumes and produces opaque byte payloads on named queues.
//! Concrete brokers implement these traits in the daemon; tests substitute
//! in-memory doubles.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Failure to hand a payload to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The queue no longer accepts messages.
    #[error("queue '{queue}' is closed")]
    Closed {
        /// Queue the payload was addressed to.
        queue: String,
    },

    /// The broker rejected the payload.
    #[error("failed to publish to '{queue}': {message}")]
    Transport {
        /// Queue the payload was addressed to.
        queue: String,
        /// Broker-provided reason.
        message: String,
    },
}

/// Publishes payloads to named queues.
pub trait MessagePublisher: Send + Sync {
    /// Hands `payload` to the broker for delivery on `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the broker does not accept the payload.
    fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), PublishError>;
}

impl<T: MessagePublisher + ?Sized> MessagePublisher for Arc<T> {
    fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), PublishError> {
        (**self).publish(queue, payload)
    }
}

/// Delivers payloads from named queues.
pub trait MessageSource: Send + Sync {
    /// Waits up to `wait` for the next payload on `queue`.
    ///
    /// Returns `None` when nothing arrived in time or the source is closed.
    fn receive(&self, queue: &str, wait: Duration) -> Option<Vec<u8>>;
}

impl<T: MessageSource + ?Sized> MessageSource for Arc<T> {
    fn receive(&self, queue: &str, wait: Duration) -> Option<Vec<u8>> {
        (**self).receive(queue, wait)
    }
}
