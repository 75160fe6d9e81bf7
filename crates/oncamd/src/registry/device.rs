use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::device_service::{DeviceDescriptor, DeviceInfo, DeviceSession, ServiceSet};

/// One discovery sighting, ready to be reconciled into the registry.
pub struct Observation {
    pub descriptor: DeviceDescriptor,
    pub mac: String,
    pub session: Arc<dyn DeviceSession>,
    pub seen_at: DateTime<Utc>,
}

/// Registry entry for one camera.
pub struct NetworkDevice {
    pub urn: String,
    pub address: String,
    pub mac: String,
    pub name: String,
    pub hardware: String,
    pub location: String,
    pub types: Vec<String>,
    pub service_addresses: Vec<String>,
    pub scopes: Vec<String>,
    pub services: ServiceSet,
    pub connected: bool,
    pub last_seen: DateTime<Utc>,
    pub session: Arc<dyn DeviceSession>,
    pub device_info: Option<DeviceInfo>,
}

impl NetworkDevice {
    /// Fresh, unauthenticated entry built from a sighting.
    #[must_use]
    pub fn from_observation(observation: Observation) -> Self {
        let Observation {
            descriptor,
            mac,
            session,
            seen_at,
        } = observation;
        Self {
            urn: descriptor.urn,
            address: descriptor.address,
            mac,
            name: descriptor.name,
            hardware: descriptor.hardware,
            location: descriptor.location,
            types: descriptor.types,
            service_addresses: descriptor.service_addresses,
            scopes: descriptor.scopes,
            services: ServiceSet::default(),
            connected: false,
            last_seen: seen_at,
            session,
            device_info: None,
        }
    }

    /// Whether `session` is the session this entry currently owns.
    #[must_use]
    pub fn owns_session(&self, session: &Arc<dyn DeviceSession>) -> bool {
        Arc::ptr_eq(&self.session, session)
    }
}

impl std::fmt::Debug for NetworkDevice {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("NetworkDevice")
            .field("urn", &self.urn)
            .field("address", &self.address)
            .field("mac", &self.mac)
            .field("name", &self.name)
            .field("connected", &self.connected)
            .field("last_seen", &self.last_seen)
            .finish_non_exhaustive()
    }
}

/// Entry shape returned by `listDevices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub address: String,
}

impl From<&NetworkDevice> for DeviceSummary {
    fn from(device: &NetworkDevice) -> Self {
        Self {
            name: device.name.clone(),
            address: device.address.clone(),
        }
    }
}

/// Everything a dispatcher needs from an entry, copied out of the lock.
#[derive(Clone)]
pub struct DeviceHandle {
    pub address: String,
    pub connected: bool,
    pub services: ServiceSet,
    pub session: Arc<dyn DeviceSession>,
}

impl From<&NetworkDevice> for DeviceHandle {
    fn from(device: &NetworkDevice) -> Self {
        Self {
            address: device.address.clone(),
            connected: device.connected,
            services: device.services.clone(),
            session: Arc::clone(&device.session),
        }
    }
}
