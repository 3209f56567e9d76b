//! Consumer worker pool.
//!
//! Each worker owns one job at a time: it receives a payload from the request
//! queue, runs it through the shared pipeline, and dispatches the result
//! before taking the next payload. Receives use a bounded wait so the
//! shutdown flag is observed promptly when the queue is idle.
//!
//! Shutdown never abandons an accepted payload: once the flag is set, workers
//! keep taking payloads until the request queue comes back empty, so every
//! message already queued still yields its result. Producers must stop
//! publishing to the request queue before the pool is joined.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use jobrelay_core::{Dispatcher, JobPipeline, MessagePublisher, MessageSource, ProcessExecutor};

const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::worker");
const RECEIVE_WAIT: Duration = Duration::from_millis(100);

/// Errors raised while starting or joining workers.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A worker thread could not be started.
    #[error("failed to start worker {index}: {source}")]
    Spawn {
        /// Zero-based worker index.
        index: usize,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// One or more workers panicked outside the pipeline.
    #[error("{count} worker thread(s) panicked")]
    ThreadPanic {
        /// Number of panicked workers.
        count: usize,
    },
}

/// Everything a worker needs, shared between all workers.
pub struct WorkerContext<E> {
    /// Pipeline run for each payload.
    pub pipeline: Arc<JobPipeline<E>>,
    /// Source of inbound payloads.
    pub source: Arc<dyn MessageSource>,
    /// Publisher of job results.
    pub dispatcher: Arc<Dispatcher<Arc<dyn MessagePublisher>>>,
    /// Queue the workers consume.
    pub request_queue: String,
}

impl<E> Clone for WorkerContext<E> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            source: Arc::clone(&self.source),
            dispatcher: Arc::clone(&self.dispatcher),
            request_queue: self.request_queue.clone(),
        }
    }
}

/// Fixed-size pool of consumer threads.
#[derive(Debug)]
pub struct WorkerPool {
    shutdown: Arc<AtomicBool>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `count` workers sharing `context`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Spawn`] if a thread cannot be created; workers
    /// already started are stopped before returning.
    pub fn start<E>(count: usize, context: &WorkerContext<E>) -> Result<Self, WorkerError>
    where
        E: ProcessExecutor + 'static,
    {
        let mut pool = Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::with_capacity(count),
        };
        for index in 0..count {
            let worker_context = context.clone();
            let stop = Arc::clone(&pool.shutdown);
            let spawned = thread::Builder::new()
                .name(format!("jobrelay-worker-{index}"))
                .spawn(move || run_worker(index, &worker_context, &stop));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(source) => {
                    pool.shutdown();
                    drop(pool.join());
                    return Err(WorkerError::Spawn { index, source });
                }
            }
        }
        info!(
            target: WORKER_TARGET,
            workers = count,
            queue = %context.request_queue,
            "worker pool started"
        );
        Ok(pool)
    }

    /// Returns the number of running workers.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns whether the pool has no workers.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Asks workers to stop once the request queue is empty.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for every worker to exit.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::ThreadPanic`] if any worker panicked.
    pub fn join(mut self) -> Result<(), WorkerError> {
        let count = self
            .workers
            .drain(..)
            .map(thread::JoinHandle::join)
            .filter(Result::is_err)
            .count();
        if count == 0 {
            Ok(())
        } else {
            Err(WorkerError::ThreadPanic { count })
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_worker<E: ProcessExecutor>(index: usize, context: &WorkerContext<E>, stop: &AtomicBool) {
    debug!(target: WORKER_TARGET, worker = index, "worker started");
    loop {
        let Some(payload) = context.source.receive(&context.request_queue, RECEIVE_WAIT) else {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            continue;
        };
        debug!(
            target: WORKER_TARGET,
            worker = index,
            bytes = payload.len(),
            "received job payload"
        );
        if let Err(error) = context.pipeline.handle(&payload, context.dispatcher.as_ref()) {
            warn!(
                target: WORKER_TARGET,
                worker = index,
                error = %error,
                "job result was not delivered"
            );
        }
    }
    debug!(target: WORKER_TARGET, worker = index, "worker stopped");
}
