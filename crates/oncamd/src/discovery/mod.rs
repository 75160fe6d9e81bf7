//! Periodic network discovery reconciled into the device registry.
//!
//! A cycle probes the network, resolves hardware addresses concurrently,
//! opens a session per camera and upserts the results. Cycles run once at
//! startup, then after every `interval` of idleness, or immediately when a
//! rescan is requested. A failed probe leaves the registry untouched.

mod gate;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::device_service::{DeviceService, ServiceError, UNKNOWN_HARDWARE_ADDRESS};
use crate::health::HealthReporter;
use crate::registry::{Observation, SharedRegistry, UpsertOutcome};

pub use self::gate::{GateClosed, ReadyGate, ReadySignal, RescanTrigger, ready_gate};

pub(crate) const DISCOVERY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::discovery");

/// Counts from one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub added: usize,
    pub refreshed: usize,
    pub replaced: usize,
    pub skipped: usize,
}

impl CycleReport {
    /// Cameras that answered the probe and were reconciled.
    #[must_use]
    pub fn observed(&self) -> usize {
        self.added + self.refreshed + self.replaced
    }
}

/// Drives discovery cycles against a [`DeviceService`].
pub struct DiscoveryReconciler {
    service: Arc<dyn DeviceService>,
    registry: SharedRegistry,
    reporter: Arc<dyn HealthReporter>,
    interval: Duration,
}

impl DiscoveryReconciler {
    #[must_use]
    pub fn new(
        service: Arc<dyn DeviceService>,
        registry: SharedRegistry,
        reporter: Arc<dyn HealthReporter>,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            registry,
            reporter,
            interval,
        }
    }

    /// Runs one probe and reconciles its results.
    pub async fn run_cycle(&self) -> Result<CycleReport, ServiceError> {
        let descriptors = self.service.probe().await?;
        let hardware_addresses = join_all(
            descriptors
                .iter()
                .map(|descriptor| self.hardware_address(&descriptor.address)),
        )
        .await;
        let seen_at = Utc::now();

        let mut report = CycleReport::default();
        for (descriptor, mac) in descriptors.into_iter().zip(hardware_addresses) {
            let session = match self.service.open_session(&descriptor) {
                Ok(session) => session,
                Err(error) => {
                    warn!(
                        target: DISCOVERY_TARGET,
                        address = %descriptor.address,
                        urn = %descriptor.urn,
                        %error,
                        "skipping camera without usable service address"
                    );
                    report.skipped += 1;
                    continue;
                }
            };
            let address = descriptor.address.clone();
            let urn = descriptor.urn.clone();
            let name = descriptor.name.clone();
            let outcome = self.registry.upsert(Observation {
                descriptor,
                mac,
                session,
                seen_at,
            });
            match outcome {
                UpsertOutcome::Added => {
                    info!(
                        target: DISCOVERY_TARGET,
                        %address,
                        %urn,
                        %name,
                        "new camera {name} found at {address}"
                    );
                    report.added += 1;
                }
                UpsertOutcome::Refreshed => {
                    debug!(target: DISCOVERY_TARGET, %address, %urn, "camera still present");
                    report.refreshed += 1;
                }
                UpsertOutcome::Replaced { previous_urn } => {
                    warn!(
                        target: DISCOVERY_TARGET,
                        %address,
                        %previous_urn,
                        %urn,
                        "device {previous_urn} replaced by {urn} at address {address}"
                    );
                    report.replaced += 1;
                }
            }
        }
        Ok(report)
    }

    async fn hardware_address(&self, address: &str) -> String {
        match self.service.resolve_hardware_address(address).await {
            Ok(mac) => mac,
            Err(error) => {
                debug!(target: DISCOVERY_TARGET, %address, %error, "hardware address unresolved");
                UNKNOWN_HARDWARE_ADDRESS.to_owned()
            }
        }
    }

    /// Runs cycles until the task is aborted.
    ///
    /// `gate` opens after the first successful cycle. The wait before the next
    /// cycle restarts after every cycle regardless of outcome.
    pub async fn run(self, gate: ReadyGate, rescan: RescanTrigger) {
        loop {
            self.reporter.discovery_starting();
            match self.run_cycle().await {
                Ok(report) => {
                    self.reporter
                        .discovery_completed(&report, self.registry.len());
                    gate.open();
                }
                Err(error) => self.reporter.discovery_failed(&error),
            }

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = rescan.requested() => {
                    info!(target: DISCOVERY_TARGET, "rescan requested");
                }
            }
        }
    }
}
