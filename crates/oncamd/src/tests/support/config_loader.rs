//! Configuration loaders for success and failure paths.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use oncam_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader that places the Unix socket in a temporary directory.
pub struct TestConfigLoader {
    dir: TempDir,
    discovery_interval_secs: u64,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temporary directory for socket"),
            discovery_interval_secs: 600,
        }
    }

    /// Socket path the loaded configuration points at.
    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        self.dir.path().join("run").join("oncam.sock")
    }

    /// Directory holding the lock, pid and health files.
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.dir.path().join("run")
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let path = Utf8PathBuf::from_path_buf(self.socket_path())
            .expect("temporary socket path was not valid UTF-8");
        Ok(Config {
            daemon_socket: SocketEndpoint::unix(path),
            discovery_interval_secs: self.discovery_interval_secs,
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an invalid socket URL on the command line.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("oncamd"),
            OsString::from("--daemon-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
