//! ONVIF implementation of the device service seam.
//!
//! Discovery uses WS-Discovery over UDP multicast; every other call is SOAP
//! 1.2 over HTTP, signed with a WS-Security `UsernameToken` once credentials
//! are set on the session.

mod arp;
mod probe;
mod responses;
mod security;
mod session;
mod soap;
mod xml;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use oncam_config::Config;

use crate::device_service::{DeviceDescriptor, DeviceService, DeviceSession, ServiceError};

pub use self::arp::ARP_TABLE;
pub use self::probe::DISCOVERY_MULTICAST;
pub use self::session::OnvifSession;

/// Tracing target for camera protocol traffic.
pub(crate) const ONVIF_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::onvif");

/// Discovers cameras and opens [`OnvifSession`]s.
#[derive(Debug, Clone)]
pub struct OnvifDeviceService {
    http: reqwest::Client,
    probe_timeout: Duration,
    arp_table: PathBuf,
}

impl OnvifDeviceService {
    /// Service with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(probe_timeout: Duration, device_timeout: Duration) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(device_timeout)
            .build()
            .map_err(|error| ServiceError::transport(error.to_string()))?;
        Ok(Self {
            http,
            probe_timeout,
            arp_table: PathBuf::from(ARP_TABLE),
        })
    }

    /// Service using the configured probe and device timeouts.
    ///
    /// # Errors
    ///
    /// See [`OnvifDeviceService::new`].
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        Self::new(config.probe_timeout(), config.device_timeout())
    }

    /// Reads hardware addresses from `path` instead of the kernel table.
    #[must_use]
    pub fn with_arp_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.arp_table = path.into();
        self
    }
}

#[async_trait]
impl DeviceService for OnvifDeviceService {
    async fn probe(&self) -> Result<Vec<DeviceDescriptor>, ServiceError> {
        probe::probe(self.probe_timeout).await
    }

    async fn resolve_hardware_address(&self, address: &str) -> Result<String, ServiceError> {
        arp::resolve(&self.arp_table, address).await
    }

    fn open_session(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Arc<dyn DeviceSession>, ServiceError> {
        let session = OnvifSession::new(self.http.clone(), descriptor)?;
        Ok(Arc::new(session))
    }
}
