//! Outbound adapter writing published results as JSON lines.

use std::io::Write;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use jobrelay_core::MessageSource;

use super::{ForwarderError, LISTENER_TARGET};

const RECEIVE_WAIT: Duration = Duration::from_millis(100);

/// Drains the response queue into a writer, one payload per line.
pub(crate) struct ResponseForwarder;

impl ResponseForwarder {
    /// Spawns the forwarder thread.
    ///
    /// After [`ForwarderHandle::shutdown`] the thread keeps writing until the
    /// queue is empty, so results dispatched before shutdown are not lost.
    pub(crate) fn spawn<W>(
        source: Arc<dyn MessageSource>,
        queue: impl Into<String>,
        mut writer: W,
    ) -> Result<ForwarderHandle, ForwarderError>
    where
        W: Write + Send + 'static,
    {
        let queue = queue.into();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name(String::from("jobrelay-forwarder"))
            .spawn(move || {
                let mut forwarded = 0_u64;
                loop {
                    match source.receive(&queue, RECEIVE_WAIT) {
                        Some(payload) => {
                            if let Err(err) = write_line(&mut writer, &payload) {
                                error!(
                                    target: LISTENER_TARGET,
                                    queue = %queue,
                                    error = %err,
                                    "failed to write job result"
                                );
                            } else {
                                forwarded += 1;
                            }
                        }
                        None if stop.load(Ordering::SeqCst) => break,
                        None => {}
                    }
                }
                debug!(
                    target: LISTENER_TARGET,
                    queue = %queue,
                    forwarded,
                    "response forwarder stopped"
                );
            })
            .map_err(|source| ForwarderError::Spawn { source })?;
        Ok(ForwarderHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

fn write_line<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    writer.write_all(payload)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Handle to the forwarder thread.
pub(crate) struct ForwarderHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ForwarderHandle {
    /// Asks the forwarder to stop once the queue is drained.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub(crate) fn join(mut self) -> Result<(), ForwarderError> {
        self.handle.take().map_or(Ok(()), |handle| {
            handle.join().map_err(|_| ForwarderError::ThreadPanic)
        })
    }
}

impl Drop for ForwarderHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
