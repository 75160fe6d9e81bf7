use thiserror::Error;

/// Failures reported by a [`super::DeviceService`] or [`super::DeviceSession`].
///
/// Clients see the `Display` output verbatim in the `error` field.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Socket or HTTP transport failure.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The device did not answer within the configured timeout.
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    /// Non-success HTTP status without a SOAP fault body.
    #[error("HTTP {status} from {endpoint}")]
    Http { endpoint: String, status: u16 },
    /// SOAP fault returned by the device.
    #[error("{code}: {reason}")]
    Fault { code: String, reason: String },
    /// Response body could not be interpreted.
    #[error("unexpected response: {message}")]
    Parse { message: String },
    /// Service address advertised by the device is unusable.
    #[error("invalid service address '{address}'")]
    InvalidAddress { address: String },
    /// The device does not expose the service a call needs.
    #[error("device does not provide the {service} service")]
    MissingService { service: &'static str },
    /// No media profile is available to target.
    #[error("device has no media profile")]
    NoProfile,
    /// Hardware address lookup failed.
    #[error("hardware address for {address} not found")]
    HardwareAddressUnknown { address: String },
    /// Local IO failure (sockets, ARP table).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Builds a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Builds a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
