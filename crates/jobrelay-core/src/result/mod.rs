//! Structured job results published for every inbound message.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::process::{ExecutionOutcome, FAILED_EXIT_CODE};

/// Error text for jobs killed at their deadline.
pub const TIMEOUT_MESSAGE: &str = "Process execution timeout";

/// Outcome of one job, serialised with the consumer's `PascalCase` keys.
///
/// `success` is derived from `exit_code` and `error` is present exactly when
/// `success` is false; the constructors are the only way to build a result.
///
/// # Example
///
/// ```
/// use jobrelay_core::{ExecutionOutcome, JobResult};
///
/// let result = JobResult::from_outcome("abc123", &ExecutionOutcome::completed(2, String::new(), 12));
/// assert!(!result.is_success());
/// assert_eq!(result.error(), Some("Process exited with code: 2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobResult {
    job_id: String,
    exit_code: i32,
    success: bool,
    output: String,
    execution_time_ms: u64,
    timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl JobResult {
    /// Maps an execution outcome into a result.
    #[must_use]
    pub fn from_outcome(job_id: impl Into<String>, outcome: &ExecutionOutcome) -> Self {
        let error = if outcome.is_timed_out() {
            Some(TIMEOUT_MESSAGE.to_owned())
        } else if outcome.exit_code() != 0 {
            Some(format!("Process exited with code: {}", outcome.exit_code()))
        } else {
            None
        };
        Self::build(
            job_id.into(),
            if outcome.is_timed_out() {
                FAILED_EXIT_CODE
            } else {
                outcome.exit_code()
            },
            outcome.output().to_owned(),
            outcome.elapsed_ms(),
            error,
        )
    }

    /// Builds an error result with exit code `-1`.
    #[must_use]
    pub fn failure(
        job_id: impl Into<String>,
        error: impl Into<String>,
        output: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self::build(
            job_id.into(),
            FAILED_EXIT_CODE,
            output.into(),
            execution_time_ms,
            Some(error.into()),
        )
    }

    fn build(
        job_id: String,
        exit_code: i32,
        output: String,
        execution_time_ms: u64,
        error: Option<String>,
    ) -> Self {
        let success = exit_code == 0;
        let error = if success {
            None
        } else {
            Some(error.unwrap_or_else(|| format!("Process exited with code: {exit_code}")))
        };
        Self {
            job_id,
            exit_code,
            success,
            output,
            execution_time_ms,
            timestamp: now_timestamp(),
            error,
        }
    }

    /// Returns the job identifier (real or `unknown`).
    #[must_use]
    pub const fn job_id(&self) -> &str {
        self.job_id.as_str()
    }

    /// Returns the exit code; `-1` for timeouts and pipeline failures.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Returns whether the exit code was zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the captured output.
    #[must_use]
    pub const fn output(&self) -> &str {
        self.output.as_str()
    }

    /// Returns the execution time in milliseconds.
    #[must_use]
    pub const fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    /// Returns the RFC 3339 construction timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> &str {
        self.timestamp.as_str()
    }

    /// Returns the error description of a failed job.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Serialises the result as a single-line JSON document.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialisation fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

fn now_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
