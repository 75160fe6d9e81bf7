//! ONVIF camera control daemon.
//!
//! `oncamd` discovers cameras on the local network with WS-Discovery, keeps
//! them in an in-memory registry keyed by address and serves a small JSON
//! request/response protocol over a Unix or TCP socket and, optionally, a
//! WebSocket. Clients list cameras, authenticate against one, then fetch
//! snapshots or drive pan, tilt and zoom.
//!
//! The daemon speaks to cameras only through the [`DeviceService`] and
//! [`DeviceSession`] traits; [`OnvifDeviceService`] implements them with SOAP
//! over HTTP. Discovery repeats on a fixed interval or when the process
//! receives SIGHUP, and client listeners start only after the first
//! successful cycle.

mod bootstrap;
mod device_service;
mod discover;
mod discovery;
mod dispatch;
mod health;
mod onvif;
mod process;
mod registry;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use device_service::{
    ConnectOutcome, Credentials, DeviceDescriptor, DeviceInfo, DeviceService, DeviceSession,
    Preset, Profile, PtzSummary, PtzVector, ServiceError, ServiceKind, ServiceSet, Snapshot,
    UNKNOWN_HARDWARE_ADDRESS, VideoSummary,
};
pub use discover::{DiscoverError, write_discovery_report};
pub use discovery::{
    CycleReport, DiscoveryReconciler, GateClosed, ReadyGate, ReadySignal, RescanTrigger,
    ready_gate,
};
pub use dispatch::{
    DEFAULT_MOVE_TIMEOUT, DispatchConnectionHandler, DispatchError, Dispatcher, Method, Request,
    Response,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use onvif::{ARP_TABLE, DISCOVERY_MULTICAST, OnvifDeviceService, OnvifSession};
pub use process::{
    LaunchError, LaunchPlan, OnvifServiceFactory, PrivilegeError, PrivilegeOutcome,
    ProcessSignal, SHUTDOWN_TIMEOUT, ServiceFactory, SignalError, SignalSource, SystemSignals,
    drop_privileges, run_daemon, run_daemon_with,
};
pub use registry::{
    DeviceHandle, DeviceRegistry, DeviceSummary, NetworkDevice, Observation, RegistryError,
    SharedRegistry, UpsertOutcome,
};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use transport::{
    ConnectionHandler, HttpListener, ListenerError, ListenerHandle, MAX_FRAME_BYTES,
    ResponseSink, SocketListener, serve_stream,
};

#[cfg(test)]
mod tests;
