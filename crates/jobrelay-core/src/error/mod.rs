//! Failure taxonomy for the job pipeline.
//!
//! Every stage reports its own `thiserror` type carrying structured context;
//! [`JobError`] unifies them at the pipeline boundary where they are turned
//! into correlated error results. A non-zero exit is not an error: it is an
//! ordinary [`ExecutionOutcome`]. I/O errors are wrapped in `Arc` so the
//! errors stay small and `Send + Sync`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::process::ExecutionOutcome;

/// Job identifier used when none can be recovered from a message.
pub const UNKNOWN_JOB_ID: &str = "unknown";

/// The payload could not be decoded into a job request.
///
/// The raw payload is kept untouched so the job identifier can still be
/// recovered for the error result.
#[derive(Debug, Clone, Error)]
#[error("malformed job request: {message}")]
pub struct ParseError {
    raw: String,
    message: String,
    #[source]
    source: Option<Arc<serde_json::Error>>,
}

impl ParseError {
    /// Builds a parse error from a description of the problem.
    #[must_use]
    pub fn new(raw: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Builds a parse error from a JSON decoding failure.
    #[must_use]
    pub fn from_json(raw: impl Into<String>, source: serde_json::Error) -> Self {
        Self {
            raw: raw.into(),
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Returns the payload that failed to parse.
    #[must_use]
    pub const fn raw(&self) -> &str {
        self.raw.as_str()
    }

    /// Returns the failure description without the prefix.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// The command for a job could not be derived.
#[derive(Debug, Clone, Error)]
pub enum CommandBuildError {
    /// No executable is configured.
    #[error("no executable configured for job commands")]
    MissingExecutable,

    /// A template argument opens a placeholder without closing it.
    #[error("argument template '{template}' has an unclosed placeholder")]
    UnclosedPlaceholder {
        /// Offending template entry.
        template: String,
    },

    /// A template argument contains `{}`.
    #[error("argument template '{template}' has an empty placeholder")]
    EmptyPlaceholder {
        /// Offending template entry.
        template: String,
    },

    /// The request carries no value for a placeholder.
    #[error("job request has no value for placeholder '{placeholder}'")]
    MissingValue {
        /// Placeholder name.
        placeholder: String,
    },

    /// A substituted value failed the allow-list.
    #[error("value {value:?} for placeholder '{placeholder}' is not allowed")]
    DisallowedValue {
        /// Placeholder name.
        placeholder: String,
        /// Rejected value.
        value: String,
    },

    /// A request-supplied argument failed the allow-list.
    #[error("request argument {value:?} is not allowed")]
    DisallowedArgument {
        /// Rejected argument.
        value: String,
    },

    /// The allow-list pattern does not compile.
    #[error("argument pattern '{pattern}' is invalid: {source}")]
    InvalidPattern {
        /// Pattern as configured.
        pattern: String,
        /// Compilation failure.
        #[source]
        source: Box<regex::Error>,
    },
}

/// The child process could not be started.
#[derive(Debug, Clone, Error)]
#[error("failed to start '{program}': {source}")]
pub struct SpawnError {
    program: String,
    #[source]
    source: Arc<io::Error>,
}

impl SpawnError {
    /// Wraps the I/O error reported by the OS.
    #[must_use]
    pub fn new(program: impl Into<String>, source: io::Error) -> Self {
        Self {
            program: program.into(),
            source: Arc::new(source),
        }
    }

    /// Returns the program that failed to start.
    #[must_use]
    pub const fn program(&self) -> &str {
        self.program.as_str()
    }

    /// Returns the kind of the underlying I/O error.
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// The process outlived its deadline and was killed.
///
/// Carries the outcome recorded at termination, including any output
/// captured before the deadline.
#[derive(Debug, Clone, Error)]
#[error("Process execution timeout")]
pub struct TimeoutError {
    deadline: Duration,
    outcome: ExecutionOutcome,
}

impl TimeoutError {
    /// Pairs the deadline with the outcome of the killed process.
    #[must_use]
    pub const fn new(deadline: Duration, outcome: ExecutionOutcome) -> Self {
        Self { deadline, outcome }
    }

    /// Returns the deadline that elapsed.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Returns the outcome recorded when the process was killed.
    #[must_use]
    pub const fn outcome(&self) -> &ExecutionOutcome {
        &self.outcome
    }

    /// Milliseconds between spawn and termination.
    #[must_use]
    pub const fn elapsed_ms(&self) -> u64 {
        self.outcome.elapsed_ms()
    }
}

/// Errors raised while running a command.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// The process could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// The process exceeded its deadline.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// Polling the running process failed; the process was killed.
    #[error("failed waiting for '{program}': {source}")]
    Wait {
        /// Program being waited on.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Any failure that diverts a job to error correlation.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// The payload was not a decodable job request.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// No command could be derived for the request.
    #[error(transparent)]
    CommandBuild(#[from] CommandBuildError),

    /// The command failed to run to completion.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// A stage failed in a way the pipeline did not anticipate.
    #[error("unexpected failure: {message}")]
    Unexpected {
        /// Description of the failure.
        message: String,
    },
}

impl JobError {
    /// Short machine-readable label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse",
            Self::CommandBuild(_) => "command_build",
            Self::Execution(ExecutionError::Spawn(_)) => "spawn",
            Self::Execution(ExecutionError::Timeout(_)) => "timeout",
            Self::Execution(ExecutionError::Wait { .. }) => "wait",
            Self::Unexpected { .. } => "unexpected",
        }
    }

    /// Returns the timeout details when the job ran out of time.
    #[must_use]
    pub const fn as_timeout(&self) -> Option<&TimeoutError> {
        match self {
            Self::Execution(ExecutionError::Timeout(timeout)) => Some(timeout),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
