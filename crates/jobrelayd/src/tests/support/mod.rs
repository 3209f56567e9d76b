//! Test harness utilities for the daemon suites.

mod config_loader;
mod reporter;
mod shutdown;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use shutdown::ChannelShutdown;
pub use world::{TestWorld, fresh_world};
