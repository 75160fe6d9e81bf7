use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::process::{ProcessSignal, SignalError, SignalSource};

/// Signal source fed by the test through a channel.
///
/// Once every sender is dropped it reports shutdown.
#[derive(Debug)]
pub struct ScriptedSignals {
    receiver: mpsc::UnboundedReceiver<ProcessSignal>,
}

impl ScriptedSignals {
    #[must_use]
    pub fn new() -> (mpsc::UnboundedSender<ProcessSignal>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }
}

#[async_trait]
impl SignalSource for ScriptedSignals {
    async fn next(&mut self) -> Result<ProcessSignal, SignalError> {
        Ok(self
            .receiver
            .recv()
            .await
            .unwrap_or(ProcessSignal::Shutdown))
    }
}
