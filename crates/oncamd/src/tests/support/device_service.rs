//! Scripted double for [`DeviceService`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::device_service::{DeviceDescriptor, DeviceService, DeviceSession, ServiceError};

use super::RecordingSession;

/// Descriptor for a camera at `address` advertising `urn`.
#[must_use]
pub fn descriptor(address: &str, urn: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        urn: urn.to_owned(),
        address: address.to_owned(),
        name: format!("camera-{address}"),
        hardware: "PTZ-1".to_owned(),
        location: "lab".to_owned(),
        types: vec!["dn:NetworkVideoTransmitter".to_owned()],
        service_addresses: vec![format!("http://{address}/onvif/device_service")],
        scopes: vec!["onvif://www.onvif.org/name/camera".to_owned()],
    }
}

#[derive(Debug, Default)]
struct Script {
    scripted: VecDeque<Result<Vec<DeviceDescriptor>, String>>,
    steady: Vec<DeviceDescriptor>,
    macs: HashMap<String, String>,
    unusable: HashSet<String>,
    sessions: HashMap<String, RecordingSession>,
    probes: usize,
}

/// Device service answering probes from a script and handing out
/// [`RecordingSession`]s.
///
/// Scripted probe outcomes are consumed first; afterwards every probe returns
/// the steady device list.
#[derive(Debug, Clone, Default)]
pub struct RecordingDeviceService {
    script: Arc<Mutex<Script>>,
}

impl RecordingDeviceService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices returned once the scripted outcomes run out.
    #[must_use]
    pub fn with_devices(self, devices: Vec<DeviceDescriptor>) -> Self {
        self.lock().steady = devices;
        self
    }

    /// Queues one probe outcome.
    #[must_use]
    pub fn then_probe(self, outcome: Result<Vec<DeviceDescriptor>, &str>) -> Self {
        self.lock()
            .scripted
            .push_back(outcome.map_err(str::to_owned));
        self
    }

    #[must_use]
    pub fn with_mac(self, address: &str, mac: &str) -> Self {
        self.lock().macs.insert(address.to_owned(), mac.to_owned());
        self
    }

    /// Makes `open_session` fail for `address`.
    #[must_use]
    pub fn with_unusable_address(self, address: &str) -> Self {
        self.lock().unusable.insert(address.to_owned());
        self
    }

    /// Most recent session opened for `address`.
    #[must_use]
    pub fn session_for(&self, address: &str) -> Option<RecordingSession> {
        self.lock().sessions.get(address).cloned()
    }

    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.lock().probes
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().expect("device service script mutex poisoned")
    }
}

#[async_trait]
impl DeviceService for RecordingDeviceService {
    async fn probe(&self) -> Result<Vec<DeviceDescriptor>, ServiceError> {
        let mut script = self.lock();
        script.probes += 1;
        match script.scripted.pop_front() {
            Some(outcome) => outcome.map_err(ServiceError::transport),
            None => Ok(script.steady.clone()),
        }
    }

    async fn resolve_hardware_address(&self, address: &str) -> Result<String, ServiceError> {
        self.lock()
            .macs
            .get(address)
            .cloned()
            .ok_or_else(|| ServiceError::HardwareAddressUnknown {
                address: address.to_owned(),
            })
    }

    fn open_session(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Arc<dyn DeviceSession>, ServiceError> {
        let mut script = self.lock();
        if script.unusable.contains(&descriptor.address) {
            return Err(ServiceError::InvalidAddress {
                address: descriptor
                    .service_addresses
                    .first()
                    .cloned()
                    .unwrap_or_default(),
            });
        }
        let session = RecordingSession::new();
        script
            .sessions
            .insert(descriptor.address.clone(), session.clone());
        Ok(session.into_session())
    }
}
