//! Control socket listener.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use oncam_config::SocketEndpoint;

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError, serve_stream};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::UnixListener;

const ERROR_BACKOFF: Duration = Duration::from_millis(150);
#[cfg(unix)]
const SOCKET_MODE: u32 = 0o660;

/// Listener bound to the control socket endpoint.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    listener: ListenerKind,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl SocketListener {
    /// Binds `endpoint`, replacing a stale unix socket left by a dead daemon.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be resolved or bound, or when a live
    /// daemon already owns the unix socket.
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let listener = match endpoint {
            SocketEndpoint::Tcp { host, port } => ListenerKind::Tcp(bind_tcp(host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => ListenerKind::Unix(bind_unix(path.as_std_path())?),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(ListenerError::UnsupportedUnix {
                    endpoint: endpoint.to_string(),
                });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
        })
    }

    /// Bound endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Local address of a TCP listener; useful when bound to port 0.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ListenerKind::Unix(_) => None,
        }
    }

    /// Starts accepting connections on a background task.
    pub fn start(self, handler: Arc<dyn ConnectionHandler>) -> ListenerHandle {
        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(run_accept_loop(self, signal, handler));
        ListenerHandle::new(shutdown, task)
    }

    async fn accept(&self, handler: &Arc<dyn ConnectionHandler>) -> io::Result<()> {
        match &self.listener {
            ListenerKind::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                debug!(target: LISTENER_TARGET, %peer, "client connected");
                spawn_connection(stream, Arc::clone(handler));
            }
            #[cfg(unix)]
            ListenerKind::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                debug!(target: LISTENER_TARGET, "client connected");
                spawn_connection(stream, Arc::clone(handler));
            }
        }
        Ok(())
    }
}

fn spawn_connection<S>(stream: S, handler: Arc<dyn ConnectionHandler>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
{
    tokio::spawn(async move {
        match serve_stream(stream, handler).await {
            Ok(()) => debug!(target: LISTENER_TARGET, "client disconnected"),
            Err(error) => debug!(target: LISTENER_TARGET, %error, "connection closed with error"),
        }
    });
}

/// Handle to a running listener task.
///
/// Dropping the handle signals shutdown without waiting for the task.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub(super) fn new(shutdown: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Asks the listener to stop accepting connections.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Waits for the listener task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::TaskPanic`] when the task panicked.
    pub async fn join(mut self) -> Result<(), ListenerError> {
        match self.task.take() {
            Some(task) => task.await.map_err(|_| ListenerError::TaskPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Resolves once `signal` flips to `true` or its sender is dropped.
pub(super) async fn shutdown_requested(signal: &mut watch::Receiver<bool>) {
    if signal.wait_for(|stop| *stop).await.is_err() {
        debug!(target: LISTENER_TARGET, "listener handle dropped");
    }
}

async fn run_accept_loop(
    listener: SocketListener,
    mut signal: watch::Receiver<bool>,
    handler: Arc<dyn ConnectionHandler>,
) {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.endpoint,
        "socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    loop {
        tokio::select! {
            () = shutdown_requested(&mut signal) => break,
            accepted = listener.accept(&handler) => match accepted {
                Ok(()) => last_error = None,
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(target: LISTENER_TARGET, %error, "socket accept error");
                    }
                    last_error = Some(kind);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            },
        }
    }

    info!(target: LISTENER_TARGET, endpoint = %listener.endpoint, "socket listener stopped");
    #[cfg(unix)]
    cleanup_unix_socket(&listener.endpoint);
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })?;
    let listener = std::net::TcpListener::bind(addr)
        .map_err(|source| ListenerError::BindTcp { addr, source })?;
    listener
        .set_nonblocking(true)
        .and_then(|()| TcpListener::from_std(listener))
        .map_err(|source| ListenerError::Register {
            endpoint: addr.to_string(),
            source,
        })
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    let display = || path.display().to_string();
    if path.exists() {
        let metadata = fs::symlink_metadata(path).map_err(|source| {
            ListenerError::UnixMetadata {
                path: display(),
                source,
            }
        })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::UnixNotSocket { path: display() });
        }
        match std::os::unix::net::UnixStream::connect(path) {
            Ok(_stream) => return Err(ListenerError::UnixInUse { path: display() }),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                    path: display(),
                    source,
                })?;
                info!(target: LISTENER_TARGET, path = %path.display(), "removed stale socket");
            }
            Err(source) => {
                return Err(ListenerError::UnixConnect {
                    path: display(),
                    source,
                });
            }
        }
    }

    let listener = std::os::unix::net::UnixListener::bind(path).map_err(|source| {
        ListenerError::BindUnix {
            path: display(),
            source,
        }
    })?;
    fs::set_permissions(path, fs::Permissions::from_mode(SOCKET_MODE)).map_err(|source| {
        ListenerError::UnixPermissions {
            path: display(),
            source,
        }
    })?;
    listener
        .set_nonblocking(true)
        .and_then(|()| UnixListener::from_std(listener))
        .map_err(|source| ListenerError::Register {
            endpoint: display(),
            source,
        })
}

#[cfg(unix)]
fn cleanup_unix_socket(endpoint: &SocketEndpoint) {
    let Some(path) = endpoint.unix_path() else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            %error,
            %path,
            "failed to remove unix socket file"
        );
    }
}
