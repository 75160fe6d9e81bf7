use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Socket used when the daemon runs as root, matching the packaged service layout.
pub const SYSTEM_SOCKET_PATH: &str = "/var/run/oncam/oncam.sock";

/// Fallback TCP port on platforms without Unix domain sockets.
pub const DEFAULT_TCP_PORT: u16 = 8879;

/// Ten minutes between discovery cycles.
pub const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 600;

/// Probe collection window.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;

/// Per-call SOAP timeout.
pub const DEFAULT_DEVICE_TIMEOUT_MS: u64 = 10_000;

/// HTTP listener address used when the WebSocket transport is enabled.
pub const DEFAULT_HTTP_LISTEN: &str = "0.0.0.0:8880";

/// Static content served next to the WebSocket endpoint.
pub const DEFAULT_HTTP_ROOT: &str = "html";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Borrowed default log filter.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log output format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

pub(crate) fn default_discovery_interval_secs() -> u64 {
    DEFAULT_DISCOVERY_INTERVAL_SECS
}

pub(crate) fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

pub(crate) fn default_device_timeout_ms() -> u64 {
    DEFAULT_DEVICE_TIMEOUT_MS
}

pub(crate) fn default_http_listen() -> String {
    DEFAULT_HTTP_LISTEN.to_owned()
}

pub(crate) fn default_http_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_HTTP_ROOT)
}

/// Computes the default control socket.
///
/// Root gets the system-wide path; everyone else a per-user runtime directory.
pub fn default_socket_endpoint() -> SocketEndpoint {
    default_socket_endpoint_inner()
}

#[cfg(unix)]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    if effective_uid() == 0 {
        return SocketEndpoint::unix(SYSTEM_SOCKET_PATH);
    }
    SocketEndpoint::unix(user_runtime_directory().join("oncam.sock"))
}

#[cfg(not(unix))]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}

/// Per-user directory holding the socket and lifecycle files.
#[cfg(unix)]
pub(crate) fn user_runtime_directory() -> Utf8PathBuf {
    if let Some(dir) = runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok()) {
        return dir.join("oncam");
    }
    let base = Utf8PathBuf::from_path_buf(env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    base.join("oncam").join(format!("uid-{}", effective_uid()))
}

#[cfg(not(unix))]
pub(crate) fn user_runtime_directory() -> Utf8PathBuf {
    let base = Utf8PathBuf::from_path_buf(env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("."));
    base.join("oncam")
}

#[cfg(unix)]
pub(crate) fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { geteuid() }
}
