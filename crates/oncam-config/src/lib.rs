//! Shared configuration for the oncam daemon and its tools.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then an
//! `oncam.toml` file supplied through `--config-path` or `ONCAM_CONFIG_PATH`,
//! then `ONCAM_*` environment variables, then command-line flags.

mod defaults;
mod logging;
mod runtime;
mod socket;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_DEVICE_TIMEOUT_MS, DEFAULT_DISCOVERY_INTERVAL_SECS, DEFAULT_HTTP_LISTEN,
    DEFAULT_HTTP_ROOT, DEFAULT_LOG_FILTER, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_TCP_PORT,
    SYSTEM_SOCKET_PATH, default_log_filter, default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "ONCAM")]
pub struct Config {
    /// Control socket clients connect to.
    #[serde(default = "defaults::default_socket_endpoint")]
    pub daemon_socket: SocketEndpoint,
    /// Seconds between the end of one discovery cycle and the start of the next.
    #[serde(default = "defaults::default_discovery_interval_secs")]
    pub discovery_interval_secs: u64,
    /// How long a WS-Discovery probe collects responses.
    #[serde(default = "defaults::default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Timeout applied to each SOAP call against a camera.
    #[serde(default = "defaults::default_device_timeout_ms")]
    pub device_timeout_ms: u64,
    /// Enables the HTTP server carrying the WebSocket transport.
    #[serde(default)]
    pub http_enabled: bool,
    /// Address the HTTP server binds to.
    #[serde(default = "defaults::default_http_listen")]
    pub http_listen: String,
    /// Directory served as static files by the HTTP server.
    #[serde(default = "defaults::default_http_root")]
    pub http_root: Utf8PathBuf,
    /// Unprivileged user to switch to when started as root.
    #[serde(default)]
    pub process_user: Option<String>,
    /// Unprivileged group to switch to when started as root.
    #[serde(default)]
    pub process_group: Option<String>,
    /// `tracing` filter directive.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log records.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Optional file receiving a copy of every log record.
    #[serde(default)]
    pub log_file: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            discovery_interval_secs: DEFAULT_DISCOVERY_INTERVAL_SECS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            device_timeout_ms: DEFAULT_DEVICE_TIMEOUT_MS,
            http_enabled: false,
            http_listen: DEFAULT_HTTP_LISTEN.to_owned(),
            http_root: Utf8PathBuf::from(DEFAULT_HTTP_ROOT),
            process_user: None,
            process_group: None,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            log_file: None,
        }
    }
}

impl Config {
    /// Control socket endpoint.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Delay between discovery cycles.
    #[must_use]
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    /// Window during which probe responses are collected.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Per-request timeout for device calls.
    #[must_use]
    pub fn device_timeout(&self) -> Duration {
        Duration::from_millis(self.device_timeout_ms)
    }

    /// HTTP listen address when the WebSocket transport is enabled.
    #[must_use]
    pub fn http_listen(&self) -> Option<&str> {
        self.http_enabled.then_some(self.http_listen.as_str())
    }

    /// Static file root for the HTTP server.
    #[must_use]
    pub fn http_root(&self) -> &Utf8Path {
        &self.http_root
    }

    /// Configured log filter.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Optional log file path.
    #[must_use]
    pub fn log_file(&self) -> Option<&Utf8Path> {
        self.log_file.as_deref()
    }

    /// User and group to drop privileges to, when configured.
    #[must_use]
    pub fn process_identity(&self) -> Option<(&str, Option<&str>)> {
        self.process_user
            .as_deref()
            .map(|user| (user, self.process_group.as_deref()))
    }
}
