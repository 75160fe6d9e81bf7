use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

/// Placeholder stored when the link-layer address cannot be resolved.
pub const UNKNOWN_HARDWARE_ADDRESS: &str = "unknown";

/// What a camera advertised in its discovery response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Endpoint reference, stable for the life of the device.
    pub urn: String,
    /// Host part of the first service address.
    pub address: String,
    /// Friendly name taken from the `name` scope.
    pub name: String,
    /// Hardware model taken from the `hardware` scope.
    pub hardware: String,
    /// Location taken from the `location` scope.
    pub location: String,
    /// Advertised WS-Discovery types.
    pub types: Vec<String>,
    /// Device service URLs (`XAddrs`).
    pub service_addresses: Vec<String>,
    /// Raw scope URIs.
    pub scopes: Vec<String>,
}

/// Username and password applied to device calls.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl Credentials {
    #[must_use]
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// Identification returned by `GetDeviceInformation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
    pub serial_number: String,
    pub hardware_id: String,
}

/// ONVIF services a device may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceKind {
    Device,
    Media,
    Ptz,
    Events,
    Imaging,
    Analytics,
}

/// Capability set learned during `connect`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSet(BTreeSet<ServiceKind>);

impl ServiceSet {
    /// Set containing `kinds`.
    pub fn from_kinds(kinds: impl IntoIterator<Item = ServiceKind>) -> Self {
        Self(kinds.into_iter().collect())
    }

    /// Adds a service.
    pub fn insert(&mut self, kind: ServiceKind) {
        self.0.insert(kind);
    }

    /// Whether the device exposes `kind`.
    #[must_use]
    pub fn supports(&self, kind: ServiceKind) -> bool {
        self.0.contains(&kind)
    }

    /// Whether pan-tilt-zoom operations are available.
    #[must_use]
    pub fn supports_ptz(&self) -> bool {
        self.supports(ServiceKind::Ptz)
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub info: DeviceInfo,
    pub services: ServiceSet,
}

/// A still image with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Snapshot {
    /// Encodes the image as `data:<type>;base64,<payload>`.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.body)
        )
    }
}

/// Video encoder summary for a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoSummary {
    pub encoding: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framerate: Option<u32>,
}

/// PTZ configuration summary for a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PtzSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Media profile as reported to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    pub token: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptz: Option<PtzSummary>,
}

/// Stored PTZ position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub name: String,
    pub token: String,
}

/// Pan, tilt and zoom velocity, each component within `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PtzVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PtzVector {
    /// Builds a vector, clamping each component and mapping non-finite values to zero.
    #[must_use]
    pub fn clamped(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
            z: clamp_unit(z),
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
