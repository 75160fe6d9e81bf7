//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use oncam_config::{Config, RuntimePaths};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::device_service::{DeviceService, ServiceError};
use crate::discovery::{DiscoveryReconciler, ReadySignal, RescanTrigger, ready_gate};
use crate::dispatch::{DispatchConnectionHandler, Dispatcher};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::onvif::OnvifDeviceService;
use crate::registry::SharedRegistry;
use crate::transport::{ConnectionHandler, HttpListener, ListenerHandle, SocketListener};

use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::privileges::drop_privileges;
use super::shutdown::{ProcessSignal, SignalSource, SystemSignals};
use super::{PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Builds the [`DeviceService`] the daemon discovers and controls cameras with.
pub trait ServiceFactory: Send + Sync {
    /// Creates the service for `config`.
    fn build(&self, config: &Config) -> Result<Arc<dyn DeviceService>, ServiceError>;
}

impl<F> ServiceFactory for F
where
    F: Fn(&Config) -> Result<Arc<dyn DeviceService>, ServiceError> + Send + Sync,
{
    fn build(&self, config: &Config) -> Result<Arc<dyn DeviceService>, ServiceError> {
        self(config)
    }
}

/// Production factory backed by [`OnvifDeviceService`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OnvifServiceFactory;

impl ServiceFactory for OnvifServiceFactory {
    fn build(&self, config: &Config) -> Result<Arc<dyn DeviceService>, ServiceError> {
        Ok(Arc::new(OnvifDeviceService::from_config(config)?))
    }
}

/// Collaborators required to launch the daemon runtime.
pub struct LaunchPlan<L, F, S> {
    pub loader: L,
    pub reporter: Arc<dyn HealthReporter>,
    pub services: F,
    pub signals: S,
}

/// Runs the daemon using the production collaborators.
pub async fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        services: OnvifServiceFactory,
        signals: SystemSignals::install()?,
    };
    run_daemon_with(plan).await
}

/// Runs the daemon with injected collaborators.
///
/// Client listeners only start once discovery has completed a cycle. SIGHUP
/// requests a rescan at any point; a shutdown signal before readiness exits
/// without binding anything.
pub async fn run_daemon_with<L, F, S>(plan: LaunchPlan<L, F, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    F: ServiceFactory,
    S: SignalSource,
{
    let LaunchPlan {
        loader,
        reporter,
        services,
        mut signals,
    } = plan;

    let daemon = bootstrap_with(&loader, Arc::clone(&reporter))?;
    let config = daemon.config().clone();
    let runtime_paths = RuntimePaths::from_config(&config)?;
    drop_privileges(config.process_identity(), runtime_paths.runtime_dir())?;

    let mut guard = ProcessGuard::acquire(runtime_paths)?;
    guard.write_pid(std::process::id())?;
    guard.write_health(HealthState::Starting)?;

    let service = services.build(&config)?;
    let registry = SharedRegistry::new();
    let (gate, ready) = ready_gate();
    let rescan = RescanTrigger::new();
    let discovery = tokio::spawn(
        DiscoveryReconciler::new(
            service,
            registry.clone(),
            Arc::clone(&reporter),
            config.discovery_interval(),
        )
        .run(gate, rescan.clone()),
    );

    let outcome = serve(&config, &guard, &*reporter, registry, ready, &rescan, &mut signals).await;
    discovery.abort();
    guard.write_health(HealthState::Stopping)?;
    let listeners = outcome?;
    stop_listeners(listeners).await?;
    await_discovery(discovery).await;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

async fn serve<S: SignalSource>(
    config: &Config,
    guard: &ProcessGuard,
    reporter: &dyn HealthReporter,
    registry: SharedRegistry,
    mut ready: ReadySignal,
    rescan: &RescanTrigger,
    signals: &mut S,
) -> Result<Vec<ListenerHandle>, LaunchError> {
    loop {
        tokio::select! {
            opened = ready.wait() => {
                opened?;
                break;
            }
            signal = signals.next() => match signal? {
                ProcessSignal::Rescan => rescan.request(),
                ProcessSignal::Shutdown => {
                    info!(target: PROCESS_TARGET, "shutdown requested before discovery completed");
                    return Ok(Vec::new());
                }
            },
        }
    }

    let handler: Arc<dyn ConnectionHandler> =
        Arc::new(DispatchConnectionHandler::new(Dispatcher::new(registry)));
    let (listeners, endpoints) = start_listeners(config, handler).await?;
    reporter.listeners_ready(&endpoints);
    guard.write_health(HealthState::Ready)?;

    loop {
        match signals.next().await? {
            ProcessSignal::Rescan => rescan.request(),
            ProcessSignal::Shutdown => return Ok(listeners),
        }
    }
}

async fn start_listeners(
    config: &Config,
    handler: Arc<dyn ConnectionHandler>,
) -> Result<(Vec<ListenerHandle>, Vec<String>), LaunchError> {
    let socket = SocketListener::bind(config.daemon_socket())?;
    let mut endpoints = vec![
        socket
            .local_addr()
            .map_or_else(|| socket.endpoint().to_string(), |addr| format!("tcp://{addr}")),
    ];
    let mut listeners = vec![socket.start(Arc::clone(&handler))];

    if let Some(listen) = config.http_listen() {
        let http = HttpListener::bind(listen, config.http_root(), handler).await?;
        endpoints.push(
            http.local_addr()
                .map_or_else(|| format!("http://{listen}"), |addr| format!("http://{addr}")),
        );
        listeners.push(http.start());
    }
    Ok((listeners, endpoints))
}

async fn stop_listeners(listeners: Vec<ListenerHandle>) -> Result<(), LaunchError> {
    for listener in &listeners {
        listener.shutdown();
    }
    for listener in listeners {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, listener.join()).await {
            Ok(joined) => joined?,
            Err(_) => warn!(
                target: PROCESS_TARGET,
                timeout_ms = SHUTDOWN_TIMEOUT.as_millis(),
                "listener did not stop in time"
            ),
        }
    }
    Ok(())
}

async fn await_discovery(discovery: JoinHandle<()>) {
    if let Err(error) = discovery.await
        && !error.is_cancelled()
    {
        warn!(target: PROCESS_TARGET, %error, "discovery task failed");
    }
}
