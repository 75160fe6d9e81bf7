//! Per-connection framing shared by the socket transports.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::LISTENER_TARGET;

/// Longest accepted frame in bytes, excluding the terminating newline.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Outbound half of a connection.
///
/// Clones may be moved into request tasks; the connection's writer drains
/// them in completion order and stops once every clone is dropped.
#[derive(Debug, Clone)]
pub struct ResponseSink {
    sender: mpsc::UnboundedSender<String>,
}

impl ResponseSink {
    /// Creates a sink and the receiver its writer drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queues one message. Returns `false` once the connection is gone.
    pub fn send(&self, message: String) -> bool {
        self.sender.send(message).is_ok()
    }

    /// Whether the writer has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumes inbound frames.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles one complete frame. Replies may be sent through `sink` later.
    fn on_frame(&self, frame: &[u8], sink: &ResponseSink);
}

/// Serves a newline-framed byte stream until the peer closes it.
///
/// Frames longer than [`MAX_FRAME_BYTES`] are discarded up to the next
/// newline and the connection stays open. Replies still in flight when the
/// peer half-closes are written before the stream is shut down.
pub async fn serve_stream<S>(stream: S, handler: Arc<dyn ConnectionHandler>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (sink, outgoing) = ResponseSink::channel();
    let writer_task = tokio::spawn(write_lines(writer, outgoing));

    let read_result = read_frames(reader, handler.as_ref(), &sink).await;
    drop(sink);

    match writer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            debug!(target: LISTENER_TARGET, %error, "client stopped reading responses");
        }
        Err(error) => {
            warn!(target: LISTENER_TARGET, %error, "connection writer task failed");
        }
    }
    read_result
}

async fn read_frames<R>(
    reader: R,
    handler: &dyn ConnectionHandler,
    sink: &ResponseSink,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut frame = Vec::new();
    let mut discarding = false;

    loop {
        let (consumed, complete) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if !discarding && !frame.is_empty() {
                    handler.on_frame(&frame, sink);
                }
                return Ok(());
            }
            let newline = available.iter().position(|byte| *byte == b'\n');
            let chunk = newline
                .and_then(|end| available.get(..end))
                .unwrap_or(available);
            if !discarding {
                if frame.len() + chunk.len() > MAX_FRAME_BYTES {
                    warn!(
                        target: LISTENER_TARGET,
                        limit = MAX_FRAME_BYTES,
                        "discarding oversized frame"
                    );
                    discarding = true;
                    frame.clear();
                } else {
                    frame.extend_from_slice(chunk);
                }
            }
            (chunk.len() + usize::from(newline.is_some()), newline.is_some())
        };
        reader.consume(consumed);

        if complete {
            if !discarding && !frame.is_empty() {
                handler.on_frame(&frame, sink);
            }
            frame.clear();
            discarding = false;
        }
    }
}

async fn write_lines<W>(
    mut writer: W,
    mut outgoing: mpsc::UnboundedReceiver<String>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outgoing.recv().await {
        writer.write_all(message.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;

    /// Records frames and echoes their length back.
    #[derive(Default)]
    struct EchoLength {
        frames: Mutex<Vec<Vec<u8>>>,
    }

    impl ConnectionHandler for EchoLength {
        fn on_frame(&self, frame: &[u8], sink: &ResponseSink) {
            self.frames.lock().expect("frames lock").push(frame.to_vec());
            sink.send(frame.len().to_string());
        }
    }

    async fn exchange(input: Vec<u8>) -> (Arc<EchoLength>, String) {
        let handler = Arc::new(EchoLength::default());
        let (client, server) = tokio::io::duplex(4096);
        let serve = tokio::spawn(serve_stream(server, handler.clone()));

        let (mut read_half, mut write_half) = tokio::io::split(client);
        let writer = tokio::spawn(async move {
            write_half.write_all(&input).await.expect("write input");
            write_half.shutdown().await.expect("half-close");
        });
        let mut output = String::new();
        read_half
            .read_to_string(&mut output)
            .await
            .expect("read output");
        writer.await.expect("writer task");
        serve.await.expect("serve task").expect("serve result");
        (handler, output)
    }

    #[tokio::test]
    async fn frames_are_split_on_newlines() {
        let (handler, output) = exchange(b"one\ntwo\r\nthree".to_vec()).await;
        let frames = handler.frames.lock().expect("frames lock").clone();
        assert_eq!(
            frames,
            vec![b"one".to_vec(), b"two\r".to_vec(), b"three".to_vec()]
        );
        assert_eq!(output, "3\n4\n5\n");
    }

    #[tokio::test]
    async fn oversized_frame_is_skipped_and_connection_survives() {
        let mut input = vec![b'x'; MAX_FRAME_BYTES + 10];
        input.extend_from_slice(b"\nok\n");
        let (handler, output) = exchange(input).await;
        let frames = handler.frames.lock().expect("frames lock").clone();
        assert_eq!(frames, vec![b"ok".to_vec()]);
        assert_eq!(output, "2\n");
    }

    #[tokio::test]
    async fn frame_at_limit_spans_buffer_refills() {
        let mut input = vec![b'y'; MAX_FRAME_BYTES];
        input.extend_from_slice(b"\nz");
        let (handler, output) = exchange(input).await;
        let frames = handler.frames.lock().expect("frames lock").clone();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames.first().map(Vec::len), Some(MAX_FRAME_BYTES));
        assert_eq!(output, format!("{MAX_FRAME_BYTES}\n1\n"));
    }

    #[tokio::test]
    async fn blank_lines_are_ignored() {
        let (handler, output) = exchange(b"\n\nping\n".to_vec()).await;
        assert_eq!(handler.frames.lock().expect("frames lock").len(), 1);
        assert_eq!(output, "4\n");
    }
}
