use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Notify, watch};

/// Opened by the reconciler after its first successful cycle.
#[derive(Debug)]
pub struct ReadyGate {
    sender: watch::Sender<bool>,
}

/// Waits for the [`ReadyGate`] to open.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    receiver: watch::Receiver<bool>,
}

/// The gate was dropped without ever opening.
#[derive(Debug, Error)]
#[error("discovery stopped before completing a cycle")]
pub struct GateClosed;

/// Creates a closed gate and its waiting side.
#[must_use]
pub fn ready_gate() -> (ReadyGate, ReadySignal) {
    let (sender, receiver) = watch::channel(false);
    (ReadyGate { sender }, ReadySignal { receiver })
}

impl ReadyGate {
    /// Opens the gate. Later calls are no-ops.
    pub fn open(&self) {
        self.sender.send_if_modified(|ready| {
            let changed = !*ready;
            *ready = true;
            changed
        });
    }
}

impl ReadySignal {
    /// Whether the gate has opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the gate opens.
    pub async fn wait(&mut self) -> Result<(), GateClosed> {
        self.receiver
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| GateClosed)
    }
}

/// Wakes the reconciler for an immediate cycle.
///
/// Requests made while a cycle is running collapse into a single follow-up
/// cycle.
#[derive(Debug, Clone, Default)]
pub struct RescanTrigger {
    notify: Arc<Notify>,
}

impl RescanTrigger {
    /// Fresh trigger with no pending request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks for a rescan.
    pub fn request(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn requested(&self) {
        self.notify.notified().await;
    }
}
