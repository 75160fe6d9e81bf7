//! Failures surfaced while parsing and executing client requests.
//!
//! `Display` output is what clients receive in the response `error` field,
//! so several messages are fixed strings existing clients match on.

use thiserror::Error;

use crate::device_service::ServiceError;
use crate::registry::RegistryError;

/// Errors surfaced during request parsing and dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Frame was not a JSON request envelope. Logged and dropped.
    #[error("malformed message: {message}")]
    MalformedMessage {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// `method` named nothing the daemon handles. Logged and dropped.
    #[error("unhandled method \"{method}\"")]
    UnknownMethod { method: String },

    /// `params` did not match the method's shape.
    #[error("invalid params: {message}")]
    InvalidParams { message: String },

    /// No registry entry at the requested address.
    #[error(transparent)]
    DeviceNotFound(#[from] RegistryError),

    /// The method needs a completed `connect` first.
    #[error("Not logged in to device {address}. Call 'connect' first")]
    NotAuthenticated { address: String },

    /// The device lacks the PTZ service.
    #[error("The specified device does not support PTZ.")]
    CapabilityUnsupported,

    /// Discovery replaced the entry while `connect` was in flight, so the
    /// new entry is still unauthenticated.
    #[error("Device {address} was replaced by discovery during connect. Call 'connect' again")]
    DeviceReplaced { address: String },

    /// The device call failed.
    #[error(transparent)]
    ExternalService(#[from] ServiceError),

    /// The handler failed unexpectedly.
    #[error("Internal server error")]
    Internal,
}

impl DispatchError {
    /// Malformed-frame error wrapping a JSON parse failure.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedMessage {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Malformed-frame error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
            source: None,
        }
    }

    /// Unknown method error.
    pub fn unknown_method(method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            method: method.into(),
        }
    }

    /// Invalid params error.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }

    /// Whether the error is dropped without answering the client.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage { .. } | Self::UnknownMethod { .. }
        )
    }
}
