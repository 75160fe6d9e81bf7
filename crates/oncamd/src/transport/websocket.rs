//! HTTP server carrying the WebSocket transport and the static web client.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use camino::Utf8Path;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::listener::shutdown_requested;
use super::{ConnectionHandler, LISTENER_TARGET, ListenerError, ListenerHandle, MAX_FRAME_BYTES, ResponseSink};

type SharedHandler = Arc<dyn ConnectionHandler>;

/// HTTP listener serving `/ws` upgrades and files under the web root.
#[derive(Debug)]
pub struct HttpListener {
    listener: TcpListener,
    router: Router,
}

impl HttpListener {
    /// Binds `listen` and prepares routes.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::BindHttp`] when the address cannot be bound.
    pub async fn bind(
        listen: &str,
        root: &Utf8Path,
        handler: SharedHandler,
    ) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(listen)
            .await
            .map_err(|source| ListenerError::BindHttp {
                listen: listen.to_owned(),
                source,
            })?;
        Ok(Self {
            listener,
            router: router(root, handler),
        })
    }

    /// Bound address.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Serves requests on a background task until shut down.
    pub fn start(self) -> ListenerHandle {
        let (shutdown, mut signal) = watch::channel(false);
        let address = self.local_addr();
        let task = tokio::spawn(async move {
            info!(target: LISTENER_TARGET, ?address, "http listener active");
            let served = axum::serve(self.listener, self.router)
                .with_graceful_shutdown(async move { shutdown_requested(&mut signal).await })
                .await;
            if let Err(error) = served {
                warn!(target: LISTENER_TARGET, %error, "http listener failed");
            }
            info!(target: LISTENER_TARGET, ?address, "http listener stopped");
        });
        ListenerHandle::new(shutdown, task)
    }
}

fn router(root: &Utf8Path, handler: SharedHandler) -> Router {
    let static_files = ServeDir::new(root.as_std_path()).append_index_html_on_directories(true);
    Router::new()
        .route("/ws", get(upgrade))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn upgrade(ws: WebSocketUpgrade, State(handler): State<SharedHandler>) -> Response {
    ws.on_upgrade(move |socket| serve_websocket(socket, handler))
}

/// Text frames are requests; binary frames are ignored.
///
/// Text frames longer than [`MAX_FRAME_BYTES`] are discarded and the
/// connection stays open, as on the socket transport.
async fn serve_websocket(socket: WebSocket, handler: SharedHandler) {
    debug!(target: LISTENER_TARGET, "websocket client connected");
    let (mut sender, mut receiver) = socket.split();
    let (sink, mut outgoing) = ResponseSink::channel();

    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            if sender.send(Message::Text(message.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) if text.len() > MAX_FRAME_BYTES => {
                warn!(
                    target: LISTENER_TARGET,
                    limit = MAX_FRAME_BYTES,
                    "discarding oversized websocket frame"
                );
            }
            Ok(Message::Text(text)) => handler.on_frame(text.as_str().as_bytes(), &sink),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(target: LISTENER_TARGET, %error, "websocket read failed");
                break;
            }
        }
    }

    drop(sink);
    if let Err(error) = writer.await {
        warn!(target: LISTENER_TARGET, %error, "websocket writer task failed");
    }
    debug!(target: LISTENER_TARGET, "websocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct Silent;

    impl ConnectionHandler for Silent {
        fn on_frame(&self, _frame: &[u8], _sink: &ResponseSink) {}
    }

    #[tokio::test]
    async fn serves_index_from_web_root() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("index.html"), "<h1>oncam</h1>").expect("write index");
        let root = Utf8Path::from_path(dir.path()).expect("utf8 root");

        let listener = HttpListener::bind("127.0.0.1:0", root, Arc::new(Silent))
            .await
            .expect("bind http");
        let addr = listener.local_addr().expect("local addr");
        let handle = listener.start();

        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .expect("write request");
        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .await
            .expect("read response");
        assert!(response.starts_with("HTTP/1.1 200"), "got {response}");
        assert!(response.contains("<h1>oncam</h1>"));

        handle.shutdown();
        handle.join().await.expect("join");
    }
}
