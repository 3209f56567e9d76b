use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default TCP port for the inbound message listener.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Queue jobs are consumed from unless configured otherwise.
pub const DEFAULT_REQUEST_QUEUE: &str = "java.exec.queue";

/// Queue results are published to unless configured otherwise.
pub const DEFAULT_RESPONSE_QUEUE: &str = "java.result.queue";

/// Number of workers consuming the request queue.
pub const DEFAULT_CONSUMER_CONCURRENCY: usize = 1;

/// Execution deadline applied to every job: five minutes.
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 300;

/// Bytes of job output kept per result: one mebibyte.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Allow-list applied to every value substituted into a command line.
///
/// Shell metacharacters, whitespace and quotes are excluded.
pub const DEFAULT_ARGUMENT_PATTERN: &str = r"^[A-Za-z0-9_.,:@/=+-]*$";

/// Default log filter expression used by the daemon.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Endpoint the inbound listener binds when none is configured.
#[must_use]
pub fn default_listen_socket() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}

/// Owned default request queue name.
#[must_use]
pub fn default_request_queue() -> String {
    DEFAULT_REQUEST_QUEUE.to_owned()
}

/// Owned default response queue name.
#[must_use]
pub fn default_response_queue() -> String {
    DEFAULT_RESPONSE_QUEUE.to_owned()
}

/// Default consumer concurrency.
#[must_use]
pub const fn default_consumer_concurrency() -> usize {
    DEFAULT_CONSUMER_CONCURRENCY
}

/// Default execution deadline in seconds.
#[must_use]
pub const fn default_execution_timeout_secs() -> u64 {
    DEFAULT_EXECUTION_TIMEOUT_SECS
}

/// Owned default argument allow-list.
#[must_use]
pub fn default_argument_pattern() -> String {
    DEFAULT_ARGUMENT_PATTERN.to_owned()
}

/// Default cap on captured job output.
#[must_use]
pub const fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}
