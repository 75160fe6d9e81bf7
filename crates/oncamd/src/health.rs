//! Structured health reporting for daemon lifecycle and discovery events.

use std::sync::Arc;

use oncam_config::Config;

use crate::bootstrap::BootstrapError;
use crate::device_service::ServiceError;
use crate::discovery::CycleReport;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer for lifecycle events, so tests can assert on them.
#[cfg_attr(test, mockall::automock)]
pub trait HealthReporter: Send + Sync {
    /// Before configuration loads.
    fn bootstrap_starting(&self);

    /// After configuration, telemetry and socket preparation succeed.
    fn bootstrap_succeeded(&self, config: &Config);

    /// When bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Before each discovery probe.
    fn discovery_starting(&self);

    /// After a cycle reconciles its results.
    fn discovery_completed(&self, report: &CycleReport, registry_size: usize);

    /// When a probe fails; the registry is left as it was.
    fn discovery_failed(&self, error: &ServiceError);

    /// Once client listeners accept connections.
    fn listeners_ready(&self, endpoints: &[String]);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn discovery_starting(&self) {
        (**self).discovery_starting();
    }

    fn discovery_completed(&self, report: &CycleReport, registry_size: usize) {
        (**self).discovery_completed(report, registry_size);
    }

    fn discovery_failed(&self, error: &ServiceError) {
        (**self).discovery_failed(error);
    }

    fn listeners_ready(&self, endpoints: &[String]) {
        (**self).listeners_ready(endpoints);
    }
}

/// Reporter that emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            discovery_interval_secs = config.discovery_interval_secs,
            http = config.http_listen().unwrap_or("disabled"),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn discovery_starting(&self) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "discovery_starting",
            "starting network discovery"
        );
    }

    fn discovery_completed(&self, report: &CycleReport, registry_size: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "discovery_completed",
            observed = report.observed(),
            added = report.added,
            replaced = report.replaced,
            skipped = report.skipped,
            registry_size,
            "discovery cycle completed"
        );
    }

    fn discovery_failed(&self, error: &ServiceError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "discovery_failed",
            error = %error,
            "discovery cycle failed"
        );
    }

    fn listeners_ready(&self, endpoints: &[String]) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listeners_ready",
            endpoints = ?endpoints,
            "accepting client connections"
        );
    }
}
