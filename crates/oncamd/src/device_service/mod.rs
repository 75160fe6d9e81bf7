//! Seam between the daemon and the camera wire protocol.
//!
//! The registry, reconciler and dispatcher only speak to cameras through
//! [`DeviceService`] and [`DeviceSession`]. The ONVIF implementation lives in
//! [`crate::onvif`]; tests substitute recording doubles.

mod errors;
mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use self::errors::ServiceError;
pub use self::types::{
    ConnectOutcome, Credentials, DeviceDescriptor, DeviceInfo, Preset, Profile, PtzSummary,
    PtzVector, ServiceKind, ServiceSet, Snapshot, UNKNOWN_HARDWARE_ADDRESS, VideoSummary,
};

/// Network-wide operations: discovery and session construction.
#[async_trait]
pub trait DeviceService: Send + Sync {
    /// Probes the local network and returns one descriptor per responding camera.
    async fn probe(&self) -> Result<Vec<DeviceDescriptor>, ServiceError>;

    /// Resolves the link-layer address for `address`.
    async fn resolve_hardware_address(&self, address: &str) -> Result<String, ServiceError>;

    /// Builds an unauthenticated session for a discovered camera.
    fn open_session(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Arc<dyn DeviceSession>, ServiceError>;
}

/// Per-camera RPC surface.
///
/// A session is owned by exactly one registry entry. Credentials are stored
/// inside the session and applied to every subsequent call.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Stores credentials used by later calls.
    fn set_credentials(&self, credentials: Credentials);

    /// Performs the authenticated handshake and learns the device's services.
    async fn connect(&self) -> Result<ConnectOutcome, ServiceError>;

    /// Downloads a still image from the current profile.
    async fn fetch_snapshot(&self) -> Result<Snapshot, ServiceError>;

    /// Media profiles known to the device.
    async fn list_profiles(&self) -> Result<Vec<Profile>, ServiceError>;

    /// Token of the profile selected after `connect`, if any.
    fn current_profile_token(&self) -> Option<String>;

    /// Starts a continuous move that the camera stops after `timeout`.
    async fn ptz_move(
        &self,
        profile_token: &str,
        speed: PtzVector,
        timeout: Duration,
    ) -> Result<(), ServiceError>;

    /// Stops any pan, tilt or zoom movement.
    async fn ptz_stop(&self, profile_token: &str) -> Result<(), ServiceError>;

    /// Presets stored for `profile_token`.
    async fn get_presets(&self, profile_token: &str) -> Result<Vec<Preset>, ServiceError>;

    /// Moves to a stored preset.
    async fn goto_preset(&self, profile_token: &str, preset_token: &str)
    -> Result<(), ServiceError>;

    /// Stores the current position as a preset.
    async fn set_preset(
        &self,
        profile_token: &str,
        preset_name: &str,
        preset_token: Option<&str>,
    ) -> Result<(), ServiceError>;

    /// Moves to the home position at `speed` (0..=1).
    async fn goto_home_position(&self, profile_token: &str, speed: f64)
    -> Result<(), ServiceError>;

    /// Stores the current position as home.
    async fn set_home_position(&self, profile_token: &str) -> Result<(), ServiceError>;

    /// Requests a device reboot.
    async fn reboot(&self) -> Result<(), ServiceError>;
}
