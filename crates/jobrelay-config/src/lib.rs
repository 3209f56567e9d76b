//! Layered configuration for the jobrelay worker.
//!
//! [`Config`] is resolved once at start-up by `ortho_config` from built-in
//! defaults, an optional configuration file (`--config-path` or
//! `JOBRELAY_CONFIG_PATH`), `JOBRELAY_*` environment variables and
//! command-line flags, in increasing order of precedence. The resolved value
//! is immutable and handed to each component explicitly.

mod defaults;
mod logging;
mod socket;
mod validation;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use self::defaults::{
    DEFAULT_ARGUMENT_PATTERN, DEFAULT_CONSUMER_CONCURRENCY, DEFAULT_EXECUTION_TIMEOUT_SECS,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_REQUEST_QUEUE, DEFAULT_RESPONSE_QUEUE,
    DEFAULT_TCP_PORT, default_argument_pattern, default_consumer_concurrency,
    default_execution_timeout_secs, default_listen_socket, default_log_filter,
    default_log_filter_string, default_log_format, default_max_output_bytes,
    default_request_queue, default_response_queue,
};
pub use self::logging::{LogFormat, LogFormatParseError};
pub use self::socket::{SocketEndpoint, SocketParseError, SocketPreparationError};
pub use self::validation::{ConfigValidationError, anchored_pattern};

/// Resolved worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "JOBRELAY")]
pub struct Config {
    /// `tracing` filter expression, e.g. `info` or `jobrelay_core=debug`.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,

    /// Output format of the log stream.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,

    /// Endpoint the inbound message listener binds.
    #[serde(default = "default_listen_socket")]
    #[ortho_config(default = default_listen_socket())]
    pub listen_socket: SocketEndpoint,

    /// Queue jobs are consumed from.
    #[serde(default = "default_request_queue")]
    #[ortho_config(default = default_request_queue())]
    pub request_queue: String,

    /// Queue results are published to.
    #[serde(default = "default_response_queue")]
    #[ortho_config(default = default_response_queue())]
    pub response_queue: String,

    /// Number of workers processing jobs in parallel.
    #[serde(default = "default_consumer_concurrency")]
    #[ortho_config(default = default_consumer_concurrency())]
    pub consumer_concurrency: usize,

    /// Deadline applied to each job's process, in seconds.
    #[serde(default = "default_execution_timeout_secs")]
    #[ortho_config(default = default_execution_timeout_secs())]
    pub execution_timeout_secs: u64,

    /// Bytes of combined job output kept per result; the rest is discarded
    /// and the output is marked as truncated.
    #[serde(default = "default_max_output_bytes")]
    #[ortho_config(default = default_max_output_bytes())]
    pub max_output_bytes: usize,

    /// Program every job runs. Jobs fail to build a command while unset.
    #[serde(default)]
    pub executable: Option<String>,

    /// Argument template passed to the executable. Entries may contain
    /// `{Name}` placeholders resolved from the job request.
    #[serde(default)]
    pub arguments: Vec<String>,

    /// Regular expression every substituted value must match in full.
    #[serde(default = "default_argument_pattern")]
    #[ortho_config(default = default_argument_pattern())]
    pub argument_pattern: String,

    /// Appends a request's own `Arguments` after the template when enabled.
    #[serde(default)]
    pub allow_request_arguments: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            listen_socket: default_listen_socket(),
            request_queue: default_request_queue(),
            response_queue: default_response_queue(),
            consumer_concurrency: default_consumer_concurrency(),
            execution_timeout_secs: default_execution_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            executable: None,
            arguments: Vec::new(),
            argument_pattern: default_argument_pattern(),
            allow_request_arguments: false,
        }
    }
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the inbound listener endpoint.
    #[must_use]
    pub const fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Returns the per-job execution deadline.
    #[must_use]
    pub const fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}
