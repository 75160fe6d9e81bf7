//! Full launch sequence with scripted discovery and signals.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use oncam_config::Config;

use crate::device_service::{DeviceService, ServiceError};
use crate::process::{LaunchError, LaunchPlan, ProcessSignal, run_daemon_with};

use super::support::{
    HealthEvent, RecordingDeviceService, RecordingHealthReporter, ScriptedSignals,
    TestConfigLoader, descriptor,
};

async fn wait_for_path(path: &Path) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !path.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("path appears");
}

fn factory(
    service: &RecordingDeviceService,
) -> impl Fn(&Config) -> Result<Arc<dyn DeviceService>, ServiceError> + Send + Sync + use<> {
    let service = service.clone();
    move |_config: &Config| Ok(Arc::new(service.clone()) as Arc<dyn DeviceService>)
}

#[tokio::test]
async fn daemon_serves_clients_after_discovery_and_cleans_up() {
    let loader = TestConfigLoader::new();
    let socket = loader.socket_path();
    let runtime_dir = loader.runtime_dir();
    let service = RecordingDeviceService::new().with_devices(vec![descriptor("10.2.2.2", "urn:a")]);
    let reporter = Arc::new(RecordingHealthReporter::default());
    let (signals_tx, signals) = ScriptedSignals::new();
    let plan = LaunchPlan {
        loader,
        reporter: reporter.clone(),
        services: factory(&service),
        signals,
    };

    let client = async {
        wait_for_path(&socket).await;
        let health = runtime_dir.join("oncamd.health");
        wait_for_path(&health).await;
        let stream = tokio::net::UnixStream::connect(&socket)
            .await
            .expect("connect");
        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(b"{\"method\":\"listDevices\",\"seq\":1}\n")
            .await
            .expect("write request");
        let line = BufReader::new(read_half)
            .lines()
            .next_line()
            .await
            .expect("read reply")
            .expect("reply line");
        let reply: Value = serde_json::from_str(&line).expect("json reply");
        assert_eq!(reply["result"]["10.2.2.2"]["address"], "10.2.2.2");

        signals_tx.send(ProcessSignal::Rescan).expect("send rescan");
        tokio::time::timeout(Duration::from_secs(5), async {
            while service.probe_count() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("rescan runs another probe");
        signals_tx.send(ProcessSignal::Shutdown).expect("send shutdown");
    };

    let (outcome, ()) = tokio::join!(run_daemon_with(plan), client);

    outcome.expect("daemon exits cleanly");
    assert!(!socket.exists(), "socket removed on shutdown");
    assert!(!runtime_dir.join("oncamd.pid").exists());
    assert!(!runtime_dir.join("oncamd.lock").exists());
    let events = reporter.events();
    assert!(events.contains(&HealthEvent::BootstrapSucceeded));
    assert!(
        events
            .iter()
            .any(|event| matches!(event, HealthEvent::ListenersReady(endpoints) if endpoints.len() == 1))
    );
}

#[tokio::test]
async fn shutdown_before_first_cycle_never_binds() {
    let loader = TestConfigLoader::new();
    let socket = loader.socket_path();
    let service = RecordingDeviceService::new().then_probe(Err("no network"));
    let (signals_tx, signals) = ScriptedSignals::new();
    signals_tx.send(ProcessSignal::Shutdown).expect("queue shutdown");
    let plan = LaunchPlan {
        loader,
        reporter: Arc::new(RecordingHealthReporter::default()),
        services: factory(&service),
        signals,
    };

    run_daemon_with(plan).await.expect("clean exit");

    assert!(!socket.exists());
}

#[tokio::test]
async fn service_construction_failure_aborts_launch() {
    let loader = TestConfigLoader::new();
    let runtime_dir = loader.runtime_dir();
    let (_signals_tx, signals) = ScriptedSignals::new();
    let plan = LaunchPlan {
        loader,
        reporter: Arc::new(RecordingHealthReporter::default()),
        services: |_config: &Config| -> Result<Arc<dyn DeviceService>, ServiceError> {
            Err(ServiceError::transport("tls backend unavailable"))
        },
        signals,
    };

    let error = run_daemon_with(plan).await.expect_err("launch fails");

    assert!(matches!(error, LaunchError::Service { .. }));
    assert!(!runtime_dir.join("oncamd.lock").exists(), "guard released");
}
