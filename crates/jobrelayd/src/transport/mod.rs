//! Message transport for the daemon.
//!
//! Inbound payloads arrive over a socket listener and are published to the
//! request queue of an in-process [`QueueBroker`]. Workers consume that queue
//! and publish results to the response queue, which a forwarder drains to
//! standard output as JSON lines.

mod broker;
mod errors;
mod forwarder;
mod handler;
mod listener;
#[cfg(test)]
mod listener_tests;
#[cfg(test)]
mod test_utils;

pub use self::broker::QueueBroker;
pub use self::errors::{ForwarderError, ListenerError};
pub(crate) use self::forwarder::{ForwarderHandle, ResponseForwarder};
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream, IngestHandler};
pub(crate) use self::listener::{ListenerHandle, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, SharedBuffer};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
