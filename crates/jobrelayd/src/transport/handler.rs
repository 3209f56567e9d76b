//! Connection handling for the inbound listener.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use tracing::{debug, warn};

use jobrelay_core::MessagePublisher;

use super::LISTENER_TARGET;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Upper bound on one inbound JSON line, excluding the newline.
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Stream types accepted by the daemon listener.
pub(crate) enum ConnectionStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Handles accepted socket connections.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, stream: ConnectionStream);
}

/// Publishes every newline-delimited payload of a connection to a queue.
///
/// Blank lines are skipped. An oversized line or read error ends the
/// connection; lines already published stay published.
pub(crate) struct IngestHandler {
    publisher: Arc<dyn MessagePublisher>,
    queue: String,
}

impl IngestHandler {
    pub(crate) fn new(publisher: Arc<dyn MessagePublisher>, queue: impl Into<String>) -> Self {
        Self {
            publisher,
            queue: queue.into(),
        }
    }

    fn ingest<R: Read>(&self, stream: R) {
        let mut reader = BufReader::new(stream);
        let mut accepted = 0_usize;
        loop {
            match read_bounded_line(&mut reader, MAX_LINE_BYTES) {
                Ok(Some(line)) => {
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    if let Err(error) = self.publisher.publish(&self.queue, &line) {
                        warn!(
                            target: LISTENER_TARGET,
                            queue = %self.queue,
                            error = %error,
                            "failed to enqueue inbound payload"
                        );
                        break;
                    }
                    accepted += 1;
                }
                Ok(None) => break,
                Err(error) => {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "connection handler error"
                    );
                    break;
                }
            }
        }
        debug!(
            target: LISTENER_TARGET,
            queue = %self.queue,
            accepted,
            "connection closed"
        );
    }
}

impl ConnectionHandler for IngestHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.ingest(stream);
    }
}

/// Reads one line without its terminator, refusing lines over `limit` bytes.
///
/// Returns `Ok(None)` at end of stream; a final unterminated line is returned
/// as-is.
fn read_bounded_line<R: BufRead>(reader: &mut R, limit: usize) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    loop {
        let available = match reader.fill_buf() {
            Ok(buffer) => buffer,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        if available.is_empty() {
            return Ok((!line.is_empty()).then_some(line));
        }

        let newline = available.iter().position(|byte| *byte == b'\n');
        let consumed = newline.map_or(available.len(), |position| position + 1);
        line.extend(available.iter().take(newline.unwrap_or(consumed)));
        reader.consume(consumed);

        if line.len() > limit.saturating_add(1) {
            return Err(oversized());
        }
        if newline.is_some() {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.len() > limit {
                return Err(oversized());
            }
            return Ok(Some(line));
        }
    }
}

fn oversized() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "request exceeds maximum size")
}
