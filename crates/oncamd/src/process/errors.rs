//! Errors surfaced while launching or supervising the daemon process.

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use oncam_config::RuntimePathsError;

use crate::bootstrap::BootstrapError;
use crate::device_service::ServiceError;
use crate::discovery::GateClosed;
use crate::transport::ListenerError;

use super::privileges::PrivilegeError;
use super::shutdown::SignalError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        #[source]
        source: BootstrapError,
    },
    /// The runtime directory could not be resolved or created.
    #[error("failed to prepare runtime paths: {source}")]
    RuntimePaths {
        #[source]
        source: RuntimePathsError,
    },
    /// Switching to the configured user or group failed.
    #[error("failed to drop privileges: {source}")]
    Privileges {
        #[source]
        source: PrivilegeError,
    },
    /// The device service could not be constructed.
    #[error("failed to build device service: {source}")]
    Service {
        #[source]
        source: ServiceError,
    },
    /// Lock file creation failed.
    #[error("failed to create lock file '{path}': {source}")]
    LockCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A running daemon already holds the lock.
    #[error("daemon already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded in the existing PID file.
        pid: u32,
    },
    /// Removing a stale runtime artefact failed.
    #[error("failed to remove stale file '{path}': {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Writing the PID file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Writing the health snapshot failed.
    #[error("failed to write health snapshot '{path}': {source}")]
    HealthWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Serialising the health snapshot failed.
    #[error("failed to serialise health snapshot: {source}")]
    HealthSerialise {
        #[from]
        source: serde_json::Error,
    },
    /// Attempting to probe an existing PID failed.
    #[error("failed to check existing process {pid}: {source}")]
    CheckProcess { pid: u32, source: Errno },
    /// Health updates were attempted before writing the PID file.
    #[error("pid must be written before updating health state")]
    MissingPid,
    /// Installing or reading signal handlers failed.
    #[error("failed to await process signals: {source}")]
    Signals {
        #[source]
        source: SignalError,
    },
    /// Discovery stopped before the first successful cycle.
    #[error("discovery did not become ready: {source}")]
    Discovery {
        #[source]
        source: GateClosed,
    },
    /// A client listener failed to bind or stop.
    #[error("client listener failed: {source}")]
    Listener {
        #[source]
        source: ListenerError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<RuntimePathsError> for LaunchError {
    fn from(source: RuntimePathsError) -> Self {
        Self::RuntimePaths { source }
    }
}

impl From<PrivilegeError> for LaunchError {
    fn from(source: PrivilegeError) -> Self {
        Self::Privileges { source }
    }
}

impl From<ServiceError> for LaunchError {
    fn from(source: ServiceError) -> Self {
        Self::Service { source }
    }
}

impl From<SignalError> for LaunchError {
    fn from(source: SignalError) -> Self {
        Self::Signals { source }
    }
}

impl From<GateClosed> for LaunchError {
    fn from(source: GateClosed) -> Self {
        Self::Discovery { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}
