//! Job-execution engine for the jobrelay worker.
//!
//! A job arrives as a raw message payload and leaves as exactly one
//! [`JobResult`]. In between, the payload is decoded into a [`JobRequest`]
//! ([`request::parse`]), turned into a [`Command`] from the configured
//! template ([`CommandBuilder`]), run under a deadline by a
//! [`ProcessExecutor`], and mapped into a result
//! ([`JobResult::from_outcome`]). Any failure along the way is handed to
//! [`correlate`], which recovers the best available job identifier from the
//! raw payload and produces an error result instead.
//!
//! The engine knows nothing about the message broker. It consumes payloads as
//! byte slices and publishes results through the [`MessagePublisher`] trait,
//! so transport adapters live with the daemon.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use jobrelay_core::{CommandBuilder, JobPipeline, SystemExecutor};
//!
//! let builder = CommandBuilder::new(
//!     Some(String::from("/usr/bin/env")),
//!     &[String::from("echo"), String::from("{Environment}")],
//!     r"^[A-Za-z0-9_.-]*$",
//! )
//! .expect("template is valid");
//! let pipeline = JobPipeline::new(builder, SystemExecutor::default(), Duration::from_secs(5));
//!
//! let result = pipeline.run(br#"{"JobId":"abc123","Body":{"Environment":"prod"}}"#);
//! assert_eq!(result.job_id(), "abc123");
//! ```

pub mod command;
pub mod correlate;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod request;
pub mod result;
pub mod transport;

#[cfg(test)]
mod tests;

pub use self::command::{Command, CommandBuilder};
pub use self::correlate::{correlate, recover_job_id};
pub use self::dispatch::{DispatchError, Dispatcher};
pub use self::error::{
    CommandBuildError, ExecutionError, JobError, ParseError, SpawnError, TimeoutError,
    UNKNOWN_JOB_ID,
};
pub use self::pipeline::JobPipeline;
pub use self::process::{
    ExecutionOutcome, FAILED_EXIT_CODE, ProcessExecutor, SystemExecutor, TRUNCATION_MARKER,
};
pub use self::request::{JobHeaders, JobRequest, SecurityContext};
pub use self::result::{JobResult, TIMEOUT_MESSAGE};
pub use self::transport::{MessagePublisher, MessageSource, PublishError};
