//! Runtime for the jobrelay worker daemon.
//!
//! The daemon bridges a message queue to local process execution. Inbound
//! job payloads arrive as JSON lines on the configured listen socket and are
//! queued on the request queue of an in-process broker. A pool of
//! `consumer_concurrency` workers takes payloads one at a time, runs each
//! through the [`jobrelay_core`] pipeline, and publishes exactly one result per
//! payload to the response queue. A forwarder writes every result to standard
//! output as a single JSON line; logs go to standard error.
//!
//! Startup follows a fixed sequence: load configuration, validate it,
//! initialise structured telemetry, prepare the socket filesystem, compile the
//! command template, then start the forwarder, the workers and the listener.
//! Health reporting hooks emit structured events at each stage. A termination
//! signal stops the listener, lets every worker finish its current job, and
//! drains the remaining results before the process exits.

mod bootstrap;
mod health;
mod process;
mod telemetry;
mod transport;
mod worker;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ForwarderError, ListenerError, QueueBroker};
pub use worker::{WorkerContext, WorkerError, WorkerPool};

#[cfg(test)]
mod tests;
