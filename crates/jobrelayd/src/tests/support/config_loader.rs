//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use jobrelay_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that provisions a Unix socket path under a temporary directory and
/// runs jobs through `/bin/sh`.
pub struct TestConfigLoader {
    socket_dir: TempDir,
    overrides: Box<dyn Fn(&mut Config) + Send + Sync>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::with(|_| {})
    }

    /// Builds a loader whose configuration is adjusted by `overrides`.
    #[must_use]
    pub fn with(overrides: impl Fn(&mut Config) + Send + Sync + 'static) -> Self {
        Self {
            socket_dir: TempDir::new().expect("failed to create temporary directory for socket"),
            overrides: Box::new(overrides),
        }
    }

    /// Path of the socket the daemon will listen on.
    #[must_use]
    pub fn socket_path(&self) -> String {
        self.socket_dir
            .path()
            .join("run")
            .join("jobrelayd.sock")
            .to_str()
            .expect("temporary socket path was not valid UTF-8")
            .to_owned()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let mut config = Config {
            listen_socket: SocketEndpoint::unix(self.socket_path()),
            executable: Some(String::from("/bin/sh")),
            arguments: vec![
                String::from("-c"),
                String::from("echo \"ran $1\""),
                String::from("job"),
                String::from("{JobId}"),
            ],
            execution_timeout_secs: 5,
            log_filter: String::from("off"),
            ..Config::default()
        };
        (self.overrides)(&mut config);
        Ok(config)
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("jobrelayd"),
            OsString::from("--consumer-concurrency"),
            OsString::from("many"),
        ];
        Config::load_from_iter(args)
    }
}
