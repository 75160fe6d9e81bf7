//! Locations of the daemon's lock, pid and health files.
//!
//! They live beside the Unix control socket so a service manager can clean a
//! single directory. TCP deployments fall back to the per-user runtime
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::defaults::user_runtime_directory;
use crate::{Config, SocketEndpoint};

/// Lifecycle file paths for one daemon instance.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    lock_path: PathBuf,
    pid_path: PathBuf,
    health_path: PathBuf,
}

impl RuntimePaths {
    /// Resolves and creates the runtime directory for `config`.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let runtime_dir = match config.daemon_socket() {
            SocketEndpoint::Unix { path } => path
                .parent()
                .filter(|parent| !parent.as_str().is_empty())
                .map(|parent| parent.as_std_path().to_path_buf())
                .ok_or_else(|| RuntimePathsError::MissingSocketParent {
                    path: path.to_string(),
                })?,
            SocketEndpoint::Tcp { .. } => user_runtime_directory().into_std_path_buf(),
        };
        Self::in_directory(runtime_dir)
    }

    /// Uses `runtime_dir` directly, creating it when absent.
    pub fn in_directory(runtime_dir: impl Into<PathBuf>) -> Result<Self, RuntimePathsError> {
        let runtime_dir = runtime_dir.into();
        fs::create_dir_all(&runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self {
            lock_path: runtime_dir.join("oncamd.lock"),
            pid_path: runtime_dir.join("oncamd.pid"),
            health_path: runtime_dir.join("oncamd.health"),
            runtime_dir,
        })
    }

    /// Directory holding every lifecycle file.
    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    /// Exclusive-create lock guarding single-instance startup.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Pid file.
    pub fn pid_path(&self) -> &Path {
        &self.pid_path
    }

    /// JSON health snapshot.
    pub fn health_path(&self) -> &Path {
        &self.health_path
    }
}

/// Errors raised while resolving runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The Unix socket path is a bare file name.
    #[error("socket path '{path}' has no parent directory")]
    MissingSocketParent { path: String },
    /// The runtime directory could not be created.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
