//! Process lifecycle for the daemon.
//!
//! Covers the single-instance guard with its pid and health files, the
//! optional privilege drop, signal handling and the launch sequence that
//! ties discovery, dispatch and the listeners together.

mod errors;
mod files;
mod guard;
mod launch;
mod privileges;
mod shutdown;

use std::time::Duration;

pub use self::errors::LaunchError;
pub use self::launch::{
    LaunchPlan, OnvifServiceFactory, ServiceFactory, run_daemon, run_daemon_with,
};
pub use self::privileges::{PrivilegeError, PrivilegeOutcome, drop_privileges};
pub use self::shutdown::{ProcessSignal, SignalError, SignalSource, SystemSignals};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Upper bound on waiting for listeners to drain during shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
