use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::info;

use super::PROCESS_TARGET;

/// What the daemon should do in response to a process signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    /// Run a discovery cycle now.
    Rescan,
    /// Stop listeners and exit.
    Shutdown,
}

/// Source of process signals, replaced by a scripted double in tests.
#[async_trait]
pub trait SignalSource: Send {
    /// Waits for the next signal.
    async fn next(&mut self) -> Result<ProcessSignal, SignalError>;
}

/// Errors reported by signal listeners.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        #[source]
        source: io::Error,
    },
}

/// Listens for SIGHUP (rescan) and SIGINT, SIGTERM or SIGQUIT (shutdown).
#[derive(Debug)]
pub struct SystemSignals {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
}

impl SystemSignals {
    /// Installs the handlers. Must be called inside a Tokio runtime.
    pub fn install() -> Result<Self, SignalError> {
        let install = |kind| signal(kind).map_err(|source| SignalError::Install { source });
        Ok(Self {
            hangup: install(SignalKind::hangup())?,
            interrupt: install(SignalKind::interrupt())?,
            terminate: install(SignalKind::terminate())?,
            quit: install(SignalKind::quit())?,
        })
    }
}

#[async_trait]
impl SignalSource for SystemSignals {
    async fn next(&mut self) -> Result<ProcessSignal, SignalError> {
        let (name, action) = tokio::select! {
            _ = self.hangup.recv() => ("SIGHUP", ProcessSignal::Rescan),
            _ = self.interrupt.recv() => ("SIGINT", ProcessSignal::Shutdown),
            _ = self.terminate.recv() => ("SIGTERM", ProcessSignal::Shutdown),
            _ = self.quit.recv() => ("SIGQUIT", ProcessSignal::Shutdown),
        };
        info!(
            target: PROCESS_TARGET,
            signal = name,
            action = ?action,
            "process signal received"
        );
        Ok(action)
    }
}
