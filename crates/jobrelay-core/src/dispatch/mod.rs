//! Result publication.

use thiserror::Error;
use tracing::{debug, error};

use crate::result::JobResult;
use crate::transport::{MessagePublisher, PublishError};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Failure to deliver a result to the response queue.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The result could not be encoded.
    #[error("failed to serialise job result: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The broker refused the encoded result.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Serialises job results and publishes them to the response queue.
#[derive(Debug, Clone)]
pub struct Dispatcher<P> {
    publisher: P,
    response_queue: String,
}

impl<P: MessagePublisher> Dispatcher<P> {
    /// Creates a dispatcher publishing to `response_queue`.
    #[must_use]
    pub fn new(publisher: P, response_queue: impl Into<String>) -> Self {
        Self {
            publisher,
            response_queue: response_queue.into(),
        }
    }

    /// Returns the queue results are published to.
    #[must_use]
    pub fn response_queue(&self) -> &str {
        &self.response_queue
    }

    /// Publishes one result.
    ///
    /// Failures are logged with the job identifier before being returned;
    /// the result is not retried.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when encoding or publication fails.
    pub fn dispatch(&self, result: &JobResult) -> Result<(), DispatchError> {
        let outcome = result
            .to_json()
            .map_err(DispatchError::from)
            .and_then(|payload| {
                self.publisher
                    .publish(&self.response_queue, &payload)
                    .map_err(DispatchError::from)
            });
        match &outcome {
            Ok(()) => debug!(
                target: DISPATCH_TARGET,
                job_id = result.job_id(),
                queue = %self.response_queue,
                success = result.is_success(),
                "published job result"
            ),
            Err(err) => error!(
                target: DISPATCH_TARGET,
                job_id = result.job_id(),
                queue = %self.response_queue,
                error = %err,
                "failed to publish job result"
            ),
        }
        outcome
    }
}
