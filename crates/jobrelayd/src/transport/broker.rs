//! In-process named FIFO queues.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::trace;

use jobrelay_core::{MessagePublisher, MessageSource, PublishError};

use super::LISTENER_TARGET;

#[derive(Debug, Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<Vec<u8>>>,
    closed_queues: HashSet<String>,
    closed: bool,
}

impl BrokerState {
    fn accepts(&self, queue: &str) -> bool {
        !self.closed && !self.closed_queues.contains(queue)
    }
}

/// Broker holding named queues in memory.
///
/// Publishing appends to the named queue and wakes waiting receivers. After
/// [`QueueBroker::close`], or [`QueueBroker::close_queue`] for that queue,
/// publishing fails while receivers may still drain what was queued before
/// the close. Receiving from a closed, empty queue returns `None` at once.
#[derive(Debug, Default)]
pub struct QueueBroker {
    state: Mutex<BrokerState>,
    available: Condvar,
}

impl QueueBroker {
    /// Creates an empty, open broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops accepting new payloads and wakes every waiting receiver.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Stops accepting payloads on `queue` only; other queues stay open.
    pub fn close_queue(&self, queue: &str) {
        self.lock().closed_queues.insert(queue.to_owned());
        self.available.notify_all();
    }

    /// Returns whether [`QueueBroker::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns the number of payloads waiting on `queue`.
    #[must_use]
    pub fn depth(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, VecDeque::len)
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl MessagePublisher for QueueBroker {
    fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), PublishError> {
        let mut state = self.lock();
        if !state.accepts(queue) {
            return Err(PublishError::Closed {
                queue: queue.to_owned(),
            });
        }
        let pending = state.queues.entry(queue.to_owned()).or_default();
        pending.push_back(payload.to_vec());
        trace!(
            target: LISTENER_TARGET,
            queue,
            depth = pending.len(),
            "payload queued"
        );
        drop(state);
        self.available.notify_all();
        Ok(())
    }
}

impl MessageSource for QueueBroker {
    fn receive(&self, queue: &str, wait: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now().checked_add(wait);
        let mut state = self.lock();
        loop {
            if let Some(payload) = state.queues.get_mut(queue).and_then(VecDeque::pop_front) {
                return Some(payload);
            }
            if !state.accepts(queue) {
                return None;
            }
            let remaining = deadline.map_or(wait, |instant| {
                instant.saturating_duration_since(Instant::now())
            });
            if remaining.is_zero() {
                return None;
            }
            state = self
                .available
                .wait_timeout(state, remaining)
                .map_or_else(|poison| poison.into_inner().0, |(guard, _)| guard);
        }
    }
}
