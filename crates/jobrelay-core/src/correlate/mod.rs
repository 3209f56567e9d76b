//! Error-to-result correlation.
//!
//! Every inbound message must yield exactly one [`JobResult`], including the
//! ones that never reach a process. When a stage fails, the correlator
//! recovers the best available job identifier from the raw payload and wraps
//! the failure into an error result the consumer can match against its
//! request.

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::error::{JobError, UNKNOWN_JOB_ID};
use crate::request::scalar_text;
use crate::result::JobResult;

const CORRELATE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::correlate");

/// Builds the error result for a job that failed at any stage.
///
/// `known_job_id` is the identifier from a successfully parsed request; when
/// absent the identifier is recovered from `raw`. Timeouts keep the partial
/// output and elapsed time of the killed process. Every other failure
/// reports exit code `-1`, empty output, and `elapsed` as its execution time.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use jobrelay_core::{correlate, request};
///
/// let raw = br#"{"JobId":"abc123","Body":"#;
/// let error = request::parse(raw).expect_err("payload is truncated");
/// let result = correlate(raw, None, &error.into(), Duration::ZERO);
/// assert_eq!(result.job_id(), "abc123");
/// assert_eq!(result.exit_code(), -1);
/// ```
#[must_use]
pub fn correlate(
    raw: &[u8],
    known_job_id: Option<&str>,
    error: &JobError,
    elapsed: Duration,
) -> JobResult {
    let job_id = known_job_id
        .filter(|id| !id.is_empty())
        .map_or_else(|| recover_job_id(raw), str::to_owned);

    if let Some(timeout) = error.as_timeout() {
        warn!(
            target: CORRELATE_TARGET,
            job_id = %job_id,
            deadline_ms = u64::try_from(timeout.deadline().as_millis()).unwrap_or(u64::MAX),
            elapsed_ms = timeout.elapsed_ms(),
            "job exceeded its deadline"
        );
        return JobResult::from_outcome(job_id, timeout.outcome());
    }

    warn!(
        target: CORRELATE_TARGET,
        job_id = %job_id,
        kind = error.kind(),
        error = %error,
        "job failed before producing an exit status"
    );
    JobResult::failure(
        job_id,
        error.to_string(),
        String::new(),
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    )
}

/// Recovers a job identifier from a payload that may not parse.
///
/// A well-formed object yields its `JobId`. Otherwise the text is scanned for
/// the first `"JobId"` key followed by a quoted or bare value. Falls back to
/// [`UNKNOWN_JOB_ID`].
#[must_use]
pub fn recover_job_id(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let parsed = match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(fields)) => fields.get("JobId").and_then(scalar_text),
        _ => scan_job_id(&text),
    };
    parsed
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| UNKNOWN_JOB_ID.to_owned())
}

fn scan_job_id(text: &str) -> Option<String> {
    let (_, after_key) = text.split_once("\"JobId\"")?;
    let value = after_key.trim_start().strip_prefix(':')?.trim_start();
    let token = value.strip_prefix('"').map_or_else(
        || {
            value
                .split(|ch: char| ch == ',' || ch == '}' || ch.is_whitespace())
                .next()
                .map(str::to_owned)
        },
        quoted_literal,
    )?;
    (!token.is_empty() && token != "null").then_some(token)
}

/// Decodes the string literal at the start of `quoted`, up to the first
/// unescaped quote.
fn quoted_literal(quoted: &str) -> Option<String> {
    let mut escaped = false;
    let end = quoted.char_indices().find_map(|(index, ch)| match (escaped, ch) {
        (true, _) => {
            escaped = false;
            None
        }
        (false, '\\') => {
            escaped = true;
            None
        }
        (false, '"') => Some(index),
        (false, _) => None,
    })?;
    let literal = quoted.get(..end)?;
    Some(
        serde_json::from_str::<String>(&format!("\"{literal}\""))
            .unwrap_or_else(|_| literal.to_owned()),
    )
}
