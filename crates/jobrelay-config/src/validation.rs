//! Semantic checks applied after the configuration layers are merged.

use regex::Regex;
use thiserror::Error;

use crate::Config;

/// Errors raised when a merged configuration is unusable.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    /// At least one worker is required.
    #[error("consumer_concurrency must be at least 1")]
    ZeroConcurrency,
    /// A zero deadline would time out every job immediately.
    #[error("execution_timeout_secs must be at least 1")]
    ZeroTimeout,
    /// A zero cap would discard all job output.
    #[error("max_output_bytes must be at least 1")]
    ZeroOutputLimit,
    /// The queue names must be non-empty.
    #[error("{field} must not be empty")]
    EmptyQueueName {
        /// Offending configuration key.
        field: &'static str,
    },
    /// The argument allow-list is not a valid regular expression.
    #[error("argument_pattern '{pattern}' is invalid: {source}")]
    ArgumentPattern {
        /// Pattern as configured.
        pattern: String,
        /// Compilation failure.
        #[source]
        source: Box<regex::Error>,
    },
}

/// Wraps `pattern` so it only matches a value in full.
///
/// Without the wrapper an unanchored allow-list such as `[a-z]+` accepts any
/// value that merely contains a match.
#[must_use]
pub fn anchored_pattern(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

impl Config {
    /// Checks the invariants the worker relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigValidationError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.consumer_concurrency == 0 {
            return Err(ConfigValidationError::ZeroConcurrency);
        }
        if self.execution_timeout_secs == 0 {
            return Err(ConfigValidationError::ZeroTimeout);
        }
        if self.max_output_bytes == 0 {
            return Err(ConfigValidationError::ZeroOutputLimit);
        }
        if self.request_queue.trim().is_empty() {
            return Err(ConfigValidationError::EmptyQueueName {
                field: "request_queue",
            });
        }
        if self.response_queue.trim().is_empty() {
            return Err(ConfigValidationError::EmptyQueueName {
                field: "response_queue",
            });
        }
        Regex::new(&anchored_pattern(&self.argument_pattern)).map_err(|source| {
            ConfigValidationError::ArgumentPattern {
                pattern: self.argument_pattern.clone(),
                source: Box::new(source),
            }
        })?;
        Ok(())
    }
}
