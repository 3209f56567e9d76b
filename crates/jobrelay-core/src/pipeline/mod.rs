//! Per-message job pipeline.
//!
//! Composes parsing, command construction, execution and result mapping.
//! Failures at any stage, including panics, are diverted to [`correlate`] so
//! each payload yields exactly one [`JobResult`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use jobrelay_config::Config;
use tracing::{error, info};

use crate::command::CommandBuilder;
use crate::correlate::correlate;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::error::{CommandBuildError, JobError, UNKNOWN_JOB_ID};
use crate::process::ProcessExecutor;
use crate::request;
use crate::result::JobResult;
use crate::transport::MessagePublisher;

const PIPELINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pipeline");

/// Failure at a pipeline stage, with the job identifier once known.
struct StageFailure {
    job_id: Option<String>,
    error: JobError,
}

impl StageFailure {
    fn new(job_id: Option<&str>, error: impl Into<JobError>) -> Self {
        Self {
            job_id: job_id.map(str::to_owned),
            error: error.into(),
        }
    }
}

/// Runs jobs from raw payload to [`JobResult`].
///
/// The pipeline holds only immutable state and can be shared between worker
/// threads behind an `Arc`.
#[derive(Debug)]
pub struct JobPipeline<E> {
    builder: CommandBuilder,
    executor: E,
    deadline: Duration,
}

impl<E: ProcessExecutor> JobPipeline<E> {
    /// Creates a pipeline from its stages.
    #[must_use]
    pub const fn new(builder: CommandBuilder, executor: E, deadline: Duration) -> Self {
        Self {
            builder,
            executor,
            deadline,
        }
    }

    /// Creates a pipeline from the resolved worker configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CommandBuildError`] when the configured argument template or
    /// pattern is malformed.
    pub fn from_config(config: &Config, executor: E) -> Result<Self, CommandBuildError> {
        Ok(Self::new(
            CommandBuilder::from_config(config)?,
            executor,
            config.execution_timeout(),
        ))
    }

    /// Returns the per-job execution deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Runs one payload through every stage.
    ///
    /// Never fails: stage errors and panics become correlated error results.
    #[must_use]
    pub fn run(&self, payload: &[u8]) -> JobResult {
        let started = Instant::now();
        let failure = match panic::catch_unwind(AssertUnwindSafe(|| self.execute(payload))) {
            Ok(Ok(result)) => return result,
            Ok(Err(failure)) => failure,
            Err(panic) => StageFailure::new(
                None,
                JobError::Unexpected {
                    message: panic_message(panic.as_ref()),
                },
            ),
        };

        let elapsed = started.elapsed();
        panic::catch_unwind(AssertUnwindSafe(|| {
            correlate(payload, failure.job_id.as_deref(), &failure.error, elapsed)
        }))
        .unwrap_or_else(|_| {
            error!(
                target: PIPELINE_TARGET,
                "error correlation panicked; reporting job as unknown"
            );
            JobResult::failure(
                UNKNOWN_JOB_ID,
                failure.error.to_string(),
                String::new(),
                u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            )
        })
    }

    /// Runs one payload and publishes its result.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the result could not be published. The
    /// job itself is not retried.
    pub fn handle<P: MessagePublisher>(
        &self,
        payload: &[u8],
        dispatcher: &Dispatcher<P>,
    ) -> Result<(), DispatchError> {
        let result = self.run(payload);
        dispatcher.dispatch(&result)
    }

    fn execute(&self, payload: &[u8]) -> Result<JobResult, StageFailure> {
        let request = request::parse(payload).map_err(|err| StageFailure::new(None, err))?;
        let job_id = request.job_id();

        let command = self
            .builder
            .build(&request)
            .map_err(|err| StageFailure::new(Some(job_id), err))?;

        info!(
            target: PIPELINE_TARGET,
            job_id,
            command = %command,
            deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
            "executing job"
        );
        let outcome = self
            .executor
            .execute(&command, self.deadline)
            .map_err(|err| StageFailure::new(Some(job_id), err))?;

        let result = JobResult::from_outcome(job_id, &outcome);
        info!(
            target: PIPELINE_TARGET,
            job_id,
            exit_code = result.exit_code(),
            elapsed_ms = result.execution_time_ms(),
            "job finished"
        );
        Ok(result)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("job pipeline panicked"))
}
