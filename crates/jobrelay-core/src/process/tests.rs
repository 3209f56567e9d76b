//! Tests for local process execution. They drive `/bin/sh`, so they only
//! run on Unix.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use rstest::rstest;

use super::*;
use crate::error::ExecutionError;

const GENEROUS: Duration = Duration::from_secs(20);

fn shell(script: &str) -> Command {
    Command::new("/bin/sh", vec![String::from("-c"), script.to_owned()])
}

fn run(script: &str, deadline: Duration) -> Result<ExecutionOutcome, ExecutionError> {
    SystemExecutor::default().execute(&shell(script), deadline)
}

#[test]
fn captures_output_of_successful_process() {
    let outcome = run("echo OK", GENEROUS).expect("execute");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.output(), "OK");
    assert!(!outcome.is_timed_out());
}

#[test]
fn preserves_line_order() {
    let outcome = run("for i in 1 2 3 4 5 6 7 8; do echo line$i; done", GENEROUS).expect("execute");
    let expected = (1..=8)
        .map(|index| format!("line{index}"))
        .collect::<Vec<_>>()
        .join("\n");
    assert_eq!(outcome.output(), expected);
}

#[test]
fn interleaves_stderr_in_arrival_order() {
    let outcome = run(
        "echo first; sleep 0.2; echo second 1>&2; sleep 0.2; echo third",
        GENEROUS,
    )
    .expect("execute");
    assert_eq!(outcome.output(), "first\nsecond\nthird");
}

#[test]
fn alternating_streams_keep_write_order() {
    let script = "i=0; while [ $i -lt 3000 ]; do echo o$i; echo e$i 1>&2; i=$((i+1)); done";
    let outcome = run(script, GENEROUS).expect("execute");
    let expected = (0..3000).flat_map(|index| [format!("o{index}"), format!("e{index}")]);
    let lines = outcome.output().lines().map(str::to_owned).collect::<Vec<_>>();
    assert_eq!(lines.len(), 6000);
    let divergence = lines
        .iter()
        .zip(expected)
        .position(|(line, wanted)| *line != wanted);
    assert_eq!(divergence, None, "streams were reordered");
}

#[test]
fn stderr_only_output_is_captured() {
    let outcome = run("echo broken 1>&2; exit 3", GENEROUS).expect("execute");
    assert_eq!(outcome.exit_code(), 3);
    assert_eq!(outcome.output(), "broken");
}

#[test]
fn output_beyond_limit_is_truncated_with_marker() {
    let executor = SystemExecutor::default().with_output_limit(10);
    let outcome = executor
        .execute(&shell("echo 0123456789abcdef; echo more 1>&2"), GENEROUS)
        .expect("execute");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.output(), format!("0123456789\n{TRUNCATION_MARKER}"));
}

#[test]
fn large_output_is_drained_without_blocking_the_child() {
    let executor = SystemExecutor::default().with_output_limit(1024);
    let outcome = executor
        .execute(&shell("head -c 4000000 /dev/zero | tr '\\0' x; echo; echo done"), GENEROUS)
        .expect("execute");
    assert_eq!(outcome.exit_code(), 0);
    assert!(outcome.output().ends_with(TRUNCATION_MARKER));
    assert!(outcome.output().len() <= 1024 + TRUNCATION_MARKER.len() + 1);
}

#[test]
fn output_exactly_at_limit_is_not_marked() {
    let executor = SystemExecutor::default().with_output_limit(3);
    let outcome = executor.execute(&shell("printf abc"), GENEROUS).expect("execute");
    assert_eq!(outcome.output(), "abc");
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(42)]
fn reports_non_zero_exit_as_outcome(#[case] code: i32) {
    let outcome = run(&format!("echo failing; exit {code}"), GENEROUS).expect("execute");
    assert_eq!(outcome.exit_code(), code);
    assert_eq!(outcome.output(), "failing");
}

#[test]
fn signal_termination_maps_to_shell_convention() {
    let outcome = run("kill -TERM $$", GENEROUS).expect("execute");
    assert_eq!(outcome.exit_code(), 128 + 15);
}

#[test]
fn timeout_kills_process_and_keeps_partial_output() {
    let deadline = Duration::from_millis(300);
    let error = run("echo started; sleep 30", deadline).expect_err("should time out");
    let ExecutionError::Timeout(timeout) = error else {
        panic!("expected timeout, got {error}");
    };
    assert_eq!(timeout.deadline(), deadline);
    let outcome = timeout.outcome();
    assert!(outcome.is_timed_out());
    assert_eq!(outcome.exit_code(), FAILED_EXIT_CODE);
    assert_eq!(outcome.output(), "started");
    assert!(outcome.elapsed_ms() >= 300, "elapsed {}", outcome.elapsed_ms());
    assert!(outcome.elapsed_ms() < 10_000, "elapsed {}", outcome.elapsed_ms());
    assert_eq!(timeout.elapsed_ms(), outcome.elapsed_ms());
}

#[cfg(target_os = "linux")]
#[test]
fn timeout_kills_descendants() {
    let error = run("sleep 30 & echo $!; wait", Duration::from_millis(300))
        .expect_err("should time out");
    let ExecutionError::Timeout(timeout) = error else {
        panic!("expected timeout, got {error}");
    };
    let pid: u32 = timeout
        .outcome()
        .output()
        .trim()
        .parse()
        .expect("script prints the background pid");

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let stat = fs::read_to_string(format!("/proc/{pid}/stat"));
        let gone = match stat {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state == "Z" || state == "X"),
        };
        if gone {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "background process {pid} survived the timeout"
        );
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn missing_executable_is_a_spawn_error() {
    let command = Command::new("/nonexistent/jobrelay-missing-tool", Vec::new());
    let error = SystemExecutor::default()
        .execute(&command, GENEROUS)
        .expect_err("should fail to spawn");
    let ExecutionError::Spawn(spawn) = error else {
        panic!("expected spawn error, got {error}");
    };
    assert_eq!(spawn.kind(), io::ErrorKind::NotFound);
    assert_eq!(spawn.program(), "/nonexistent/jobrelay-missing-tool");
}

#[test]
fn non_executable_file_is_a_spawn_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let script = dir.path().join("not-executable.sh");
    fs::write(&script, "#!/bin/sh\necho never\n").expect("write script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).expect("chmod");

    let command = Command::new(script.to_str().expect("utf8 path"), Vec::new());
    let error = SystemExecutor::default()
        .execute(&command, GENEROUS)
        .expect_err("should fail to spawn");
    assert!(matches!(error, ExecutionError::Spawn(_)), "got {error}");
}

#[test]
fn quiet_process_still_reports_elapsed_time() {
    let outcome = run("sleep 0.2", GENEROUS).expect("execute");
    assert_eq!(outcome.output(), "");
    assert!(outcome.elapsed_ms() >= 200, "elapsed {}", outcome.elapsed_ms());
}
