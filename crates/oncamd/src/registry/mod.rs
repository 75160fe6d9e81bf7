//! In-memory address-keyed device registry.
//!
//! Entries keep insertion order; a replaced entry keeps its slot. Nothing is
//! ever evicted, so a camera that stops answering probes stays listed.

mod device;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use indexmap::map::Entry;
use thiserror::Error;

use crate::device_service::{DeviceInfo, DeviceSession, ServiceSet};

pub use self::device::{DeviceHandle, DeviceSummary, NetworkDevice, Observation};

/// Lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No entry for the address.
    #[error("The specified device is not found: {address}")]
    NotFound { address: String },
}

/// How an observation was reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting at this address.
    Added,
    /// Same device seen again.
    Refreshed,
    /// A different device now answers at this address.
    Replaced { previous_urn: String },
}

/// Address-keyed device map.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: IndexMap<String, NetworkDevice>,
}

impl DeviceRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles a sighting.
    ///
    /// A matching urn only advances `last_seen`; a different urn rebuilds the
    /// entry in place, dropping the previous session and authentication.
    pub fn upsert(&mut self, observation: Observation) -> UpsertOutcome {
        match self.devices.entry(observation.descriptor.address.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(NetworkDevice::from_observation(observation));
                UpsertOutcome::Added
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if existing.urn == observation.descriptor.urn {
                    existing.last_seen = existing.last_seen.max(observation.seen_at);
                    UpsertOutcome::Refreshed
                } else {
                    let replacement = NetworkDevice::from_observation(observation);
                    let previous = std::mem::replace(existing, replacement);
                    UpsertOutcome::Replaced {
                        previous_urn: previous.urn,
                    }
                }
            }
        }
    }

    /// Entry registered at `address`.
    pub fn lookup(&self, address: &str) -> Result<&NetworkDevice, RegistryError> {
        self.devices
            .get(address)
            .ok_or_else(|| RegistryError::NotFound {
                address: address.to_owned(),
            })
    }

    /// Summaries of every entry, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceSummary> {
        self.devices.values().map(DeviceSummary::from).collect()
    }

    /// Records a successful handshake.
    ///
    /// Ignored unless the entry still owns `session`; a replacement that landed
    /// while the handshake was in flight keeps its unauthenticated state.
    /// Returns whether the entry was updated.
    pub fn mark_connected(
        &mut self,
        address: &str,
        session: &Arc<dyn DeviceSession>,
        info: DeviceInfo,
        services: ServiceSet,
    ) -> bool {
        match self.devices.get_mut(address) {
            Some(device) if device.owns_session(session) => {
                device.connected = true;
                device.device_info = Some(info);
                device.services = services;
                true
            }
            _ => false,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Cloneable handle to the daemon's registry.
///
/// Every method takes the lock for a synchronous section only; callers copy
/// what they need out before awaiting device calls.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<DeviceRegistry>>,
}

impl SharedRegistry {
    /// Wraps an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DeviceRegistry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut DeviceRegistry) -> R) -> R {
        f(&mut self.lock())
    }

    /// See [`DeviceRegistry::upsert`].
    pub fn upsert(&self, observation: Observation) -> UpsertOutcome {
        self.lock().upsert(observation)
    }

    /// Copies the dispatch-relevant parts of the entry at `address`.
    pub fn handle(&self, address: &str) -> Result<DeviceHandle, RegistryError> {
        self.lock().lookup(address).map(DeviceHandle::from)
    }

    /// See [`DeviceRegistry::snapshot`].
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceSummary> {
        self.lock().snapshot()
    }

    /// See [`DeviceRegistry::mark_connected`].
    pub fn mark_connected(
        &self,
        address: &str,
        session: &Arc<dyn DeviceSession>,
        info: DeviceInfo,
        services: ServiceSet,
    ) -> bool {
        self.lock().mark_connected(address, session, info, services)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_service::{DeviceDescriptor, ServiceKind};
    use crate::tests::support::RecordingSession;
    use chrono::{Duration, TimeZone, Utc};
    use rstest::rstest;

    fn observation(address: &str, urn: &str, offset_secs: i64) -> Observation {
        let seen_at = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
            + Duration::seconds(offset_secs);
        Observation {
            descriptor: DeviceDescriptor {
                urn: urn.to_owned(),
                address: address.to_owned(),
                name: format!("cam-{urn}"),
                ..DeviceDescriptor::default()
            },
            mac: "00:2a:2a:2d:02:49".to_owned(),
            session: RecordingSession::new().into_session(),
            seen_at,
        }
    }

    fn connect(registry: &mut DeviceRegistry, address: &str) {
        let session = Arc::clone(&registry.lookup(address).expect("present").session);
        assert!(registry.mark_connected(
            address,
            &session,
            DeviceInfo::default(),
            ServiceSet::from_kinds([ServiceKind::Ptz]),
        ));
    }

    #[rstest]
    fn first_sighting_is_added() {
        let mut registry = DeviceRegistry::new();
        assert_eq!(registry.upsert(observation("10.0.0.5", "a", 0)), UpsertOutcome::Added);
        assert_eq!(registry.len(), 1);
    }

    #[rstest]
    fn refresh_preserves_authentication() {
        let mut registry = DeviceRegistry::new();
        registry.upsert(observation("10.0.0.5", "a", 0));
        connect(&mut registry, "10.0.0.5");
        let original = Arc::clone(&registry.lookup("10.0.0.5").expect("present").session);

        let outcome = registry.upsert(observation("10.0.0.5", "a", 30));

        assert_eq!(outcome, UpsertOutcome::Refreshed);
        let device = registry.lookup("10.0.0.5").expect("present");
        assert!(device.connected);
        assert!(device.services.supports_ptz());
        assert!(device.owns_session(&original));
        assert!(device.device_info.is_some());
    }

    #[rstest]
    fn refresh_never_moves_last_seen_backwards() {
        let mut registry = DeviceRegistry::new();
        registry.upsert(observation("10.0.0.5", "a", 60));
        let before = registry.lookup("10.0.0.5").expect("present").last_seen;
        registry.upsert(observation("10.0.0.5", "a", 0));
        assert_eq!(registry.lookup("10.0.0.5").expect("present").last_seen, before);
    }

    #[rstest]
    fn replacement_resets_state_and_keeps_position() {
        let mut registry = DeviceRegistry::new();
        registry.upsert(observation("10.0.0.5", "a", 0));
        registry.upsert(observation("10.0.0.6", "b", 0));
        connect(&mut registry, "10.0.0.5");

        let outcome = registry.upsert(observation("10.0.0.5", "c", 10));

        assert_eq!(
            outcome,
            UpsertOutcome::Replaced {
                previous_urn: "a".to_owned()
            }
        );
        let device = registry.lookup("10.0.0.5").expect("present");
        assert!(!device.connected);
        assert_eq!(device.urn, "c");
        assert!(device.device_info.is_none());
        let order: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|summary| summary.address)
            .collect();
        assert_eq!(order, ["10.0.0.5", "10.0.0.6"]);
    }

    #[rstest]
    fn stale_handshake_does_not_authenticate_replacement() {
        let mut registry = DeviceRegistry::new();
        registry.upsert(observation("10.0.0.5", "a", 0));
        let stale = Arc::clone(&registry.lookup("10.0.0.5").expect("present").session);
        registry.upsert(observation("10.0.0.5", "b", 5));

        let applied =
            registry.mark_connected("10.0.0.5", &stale, DeviceInfo::default(), ServiceSet::default());

        assert!(!applied);
        assert!(!registry.lookup("10.0.0.5").expect("present").connected);
    }

    #[rstest]
    fn lookup_miss_names_address() {
        let registry = DeviceRegistry::new();
        let error = registry.lookup("10.9.9.9").expect_err("absent");
        assert_eq!(
            error.to_string(),
            "The specified device is not found: 10.9.9.9"
        );
    }
}
