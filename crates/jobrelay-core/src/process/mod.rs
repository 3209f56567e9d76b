//! Bounded-time process execution.
//!
//! [`SystemExecutor`] spawns the command with stdin closed and stdout and
//! stderr both attached to the write end of a single pipe, so the two streams
//! reach the reader in exactly the order the child wrote them. One reader
//! thread drains the pipe in chunks; the calling thread collects them while
//! polling the child until it exits and the pipe closes, or until the
//! deadline passes. Captured output is capped at a configurable size.
//!
//! On Unix the child leads its own process group. A timeout kills the whole
//! group, then kills and reaps the child, so nothing the job started is left
//! running once [`ProcessExecutor::execute`] returns.

use std::io::{self, PipeReader, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use jobrelay_config::DEFAULT_MAX_OUTPUT_BYTES;

use crate::command::Command;
use crate::error::{ExecutionError, SpawnError, TimeoutError};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// How often the child is polled while no output arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to keep collecting output after a timed-out process is killed.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Longest deadline honoured; larger values are clamped.
const MAX_DEADLINE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Size of each read from the output pipe.
const READ_CHUNK: usize = 8 * 1024;

/// Exit code reported for timeouts and processes without a status.
pub const FAILED_EXIT_CODE: i32 = -1;

/// Appended to output that was cut at the capture limit.
pub const TRUNCATION_MARKER: &str = "[output truncated]";

/// What a finished (or killed) process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    exit_code: i32,
    output: String,
    elapsed_ms: u64,
    timed_out: bool,
}

impl ExecutionOutcome {
    /// Outcome of a process that exited on its own.
    #[must_use]
    pub const fn completed(exit_code: i32, output: String, elapsed_ms: u64) -> Self {
        Self {
            exit_code,
            output,
            elapsed_ms,
            timed_out: false,
        }
    }

    /// Outcome of a process killed at its deadline.
    #[must_use]
    pub const fn timed_out(output: String, elapsed_ms: u64) -> Self {
        Self {
            exit_code: FAILED_EXIT_CODE,
            output,
            elapsed_ms,
            timed_out: true,
        }
    }

    /// Returns the exit code; `-1` when the process timed out.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Returns the captured, trimmed output.
    #[must_use]
    pub const fn output(&self) -> &str {
        self.output.as_str()
    }

    /// Returns the milliseconds between spawn and exit.
    #[must_use]
    pub const fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Returns whether the process was killed at its deadline.
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        self.timed_out
    }
}

/// Trait abstracting process execution for testability.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use jobrelay_core::{Command, ExecutionError, ExecutionOutcome, ProcessExecutor};
///
/// struct CannedExecutor;
///
/// impl ProcessExecutor for CannedExecutor {
///     fn execute(
///         &self,
///         _command: &Command,
///         _deadline: Duration,
///     ) -> Result<ExecutionOutcome, ExecutionError> {
///         Ok(ExecutionOutcome::completed(0, String::from("OK"), 3))
///     }
/// }
/// ```
pub trait ProcessExecutor: Send + Sync {
    /// Runs the command, waiting at most `deadline` for it to finish.
    ///
    /// A non-zero exit is returned as an ordinary outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::Spawn`] if the process cannot start,
    /// [`ExecutionError::Timeout`] if it is still running at the deadline,
    /// and [`ExecutionError::Wait`] if polling it fails.
    fn execute(
        &self,
        command: &Command,
        deadline: Duration,
    ) -> Result<ExecutionOutcome, ExecutionError>;
}

impl<T: ProcessExecutor + ?Sized> ProcessExecutor for Arc<T> {
    fn execute(
        &self,
        command: &Command,
        deadline: Duration,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        (**self).execute(command, deadline)
    }
}

/// Executes commands as local child processes.
#[derive(Debug, Clone, Copy)]
pub struct SystemExecutor {
    poll_interval: Duration,
    output_limit: usize,
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            output_limit: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl SystemExecutor {
    /// Creates an executor polling the child at the given interval.
    #[must_use]
    pub const fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            output_limit: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    /// Caps the bytes of output kept per job. Anything beyond is read and
    /// discarded, and the result ends with [`TRUNCATION_MARKER`].
    #[must_use]
    pub const fn with_output_limit(mut self, output_limit: usize) -> Self {
        self.output_limit = output_limit;
        self
    }
}

impl ProcessExecutor for SystemExecutor {
    fn execute(
        &self,
        command: &Command,
        requested: Duration,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let program = command.executable();
        let deadline = requested.min(MAX_DEADLINE);
        let started = Instant::now();
        let (mut child, pipe) = spawn(command)?;

        debug!(
            target: PROCESS_TARGET,
            program,
            pid = child.id(),
            deadline_ms = millis(deadline),
            "spawned job process"
        );

        let (sender, chunks) = mpsc::channel();
        let reader = spawn_reader(pipe, sender);

        let mut output = OutputBuffer::new(self.output_limit);
        let waited = wait_with_deadline(
            &mut child,
            &chunks,
            &mut output,
            started + deadline,
            self.poll_interval,
        );

        match waited {
            Ok(Some(status)) => {
                drop(reader.join());
                let elapsed_ms = millis(started.elapsed());
                let exit_code = exit_code(status);
                debug!(
                    target: PROCESS_TARGET,
                    program,
                    exit_code,
                    elapsed_ms,
                    "job process exited"
                );
                Ok(ExecutionOutcome::completed(
                    exit_code,
                    output.finish(),
                    elapsed_ms,
                ))
            }
            Ok(None) => {
                warn!(
                    target: PROCESS_TARGET,
                    program,
                    deadline_ms = millis(deadline),
                    "job process timed out, killing it"
                );
                terminate(&mut child);
                drain_remaining(&chunks, &mut output);
                let outcome =
                    ExecutionOutcome::timed_out(output.finish(), millis(started.elapsed()));
                Err(TimeoutError::new(deadline, outcome).into())
            }
            Err(source) => {
                terminate(&mut child);
                Err(ExecutionError::Wait {
                    program: program.to_owned(),
                    source: Arc::new(source),
                })
            }
        }
    }
}

fn spawn(command: &Command) -> Result<(Child, PipeReader), SpawnError> {
    let program = command.executable();
    let failed = |source| SpawnError::new(program, source);
    let (reader, writer) = io::pipe().map_err(failed)?;
    let stderr = writer.try_clone().map_err(failed)?;

    let mut process = std::process::Command::new(program);
    process
        .args(command.arguments())
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        process.process_group(0);
    }

    let child = process.spawn().map_err(failed)?;
    // The pipe only reports EOF once the parent's write ends are closed.
    drop(process);
    Ok((child, reader))
}

/// Forwards raw chunks of `stream` until EOF.
fn spawn_reader<R>(mut stream: R, sender: Sender<Vec<u8>>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = vec![0_u8; READ_CHUNK];
        loop {
            match stream.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => {
                    let chunk = buffer.get(..read).map(<[u8]>::to_vec).unwrap_or_default();
                    if sender.send(chunk).is_err() {
                        break;
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
    })
}

/// Output kept for a job, bounded at `limit` bytes.
#[derive(Debug)]
struct OutputBuffer {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    const fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes
            .extend_from_slice(chunk.get(..room.min(chunk.len())).unwrap_or_default());
    }

    /// Decodes lossily and trims; a cut at the limit may leave a replacement
    /// character where a multi-byte sequence was split.
    fn finish(self) -> String {
        let text = String::from_utf8_lossy(&self.bytes);
        let trimmed = text.trim();
        if !self.truncated {
            return trimmed.to_owned();
        }
        if trimmed.is_empty() {
            return TRUNCATION_MARKER.to_owned();
        }
        format!("{trimmed}\n{TRUNCATION_MARKER}")
    }
}

/// Collects output until the child has exited and the pipe has closed.
///
/// Returns `Ok(None)` when the deadline passes first.
fn wait_with_deadline(
    child: &mut Child,
    chunks: &Receiver<Vec<u8>>,
    output: &mut OutputBuffer,
    deadline_at: Instant,
    poll_interval: Duration,
) -> io::Result<Option<ExitStatus>> {
    let mut status = None;
    let mut pipe_open = true;

    loop {
        if status.is_none() {
            status = child.try_wait()?;
        }
        if status.is_some() && !pipe_open {
            return Ok(status);
        }

        let now = Instant::now();
        if now >= deadline_at {
            return Ok(None);
        }
        let wait = deadline_at.duration_since(now).min(poll_interval);

        if pipe_open {
            match chunks.recv_timeout(wait) {
                Ok(chunk) => output.push(&chunk),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => pipe_open = false,
            }
        } else {
            thread::sleep(wait);
        }
    }
}

/// Picks up output written before the kill landed.
fn drain_remaining(chunks: &Receiver<Vec<u8>>, output: &mut OutputBuffer) {
    let until = Instant::now() + DRAIN_GRACE;
    loop {
        let remaining = until.saturating_duration_since(Instant::now());
        match chunks.recv_timeout(remaining) {
            Ok(chunk) => output.push(&chunk),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn terminate(child: &mut Child) {
    #[cfg(unix)]
    kill_process_group(child.id());
    drop(child.kill());
    drop(child.wait());
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(errno) = killpg(Pid::from_raw(raw), Signal::SIGKILL)
        && errno != Errno::ESRCH
    {
        warn!(
            target: PROCESS_TARGET,
            pid,
            error = %errno,
            "failed to kill job process group"
        );
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    FAILED_EXIT_CODE
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests;
