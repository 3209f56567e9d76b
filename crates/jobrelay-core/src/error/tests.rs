//! Unit tests for pipeline error types.

use std::time::Duration;

use rstest::rstest;

use super::*;

#[test]
fn parse_error_keeps_raw_payload() {
    let error = ParseError::new("{not json", "expected value");
    assert_eq!(error.raw(), "{not json");
    let message = error.to_string();
    assert!(
        message.contains("expected value"),
        "expected detail in message: {message}"
    );
}

#[test]
fn spawn_error_message_includes_program() {
    let error = SpawnError::new(
        "/opt/missing/tool",
        io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
    );
    let message = error.to_string();
    assert!(
        message.contains("/opt/missing/tool"),
        "expected program in message: {message}"
    );
    assert_eq!(error.kind(), io::ErrorKind::NotFound);
}

#[test]
fn timeout_error_displays_fixed_message_and_keeps_outcome() {
    let outcome = ExecutionOutcome::timed_out(String::from("partial"), 1_250);
    let error = TimeoutError::new(Duration::from_secs(1), outcome);
    assert_eq!(error.to_string(), "Process execution timeout");
    assert_eq!(error.elapsed_ms(), 1_250);
    assert_eq!(error.outcome().output(), "partial");
    assert_eq!(error.outcome().exit_code(), -1);
}

#[rstest]
#[case::parse(JobError::from(ParseError::new("x", "bad")), "parse")]
#[case::build(JobError::from(CommandBuildError::MissingExecutable), "command_build")]
#[case::spawn(
    JobError::from(ExecutionError::from(SpawnError::new("x", io::Error::other("denied")))),
    "spawn"
)]
#[case::timeout(
    JobError::from(ExecutionError::from(TimeoutError::new(
        Duration::from_millis(5),
        ExecutionOutcome::timed_out(String::new(), 5),
    ))),
    "timeout"
)]
#[case::unexpected(JobError::Unexpected { message: String::from("boom") }, "unexpected")]
fn job_error_kind_labels(#[case] error: JobError, #[case] expected: &str) {
    assert_eq!(error.kind(), expected);
}

#[test]
fn job_error_is_transparent_over_stage_errors() {
    let error = JobError::from(CommandBuildError::DisallowedArgument {
        value: String::from("a;b"),
    });
    assert_eq!(error.to_string(), "request argument \"a;b\" is not allowed");
}

#[test]
fn errors_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<JobError>();
}
