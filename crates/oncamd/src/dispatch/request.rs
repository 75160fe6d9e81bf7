//! Request envelope and per-method parameter shapes.
//!
//! Clients send `{"method": ..., "params": {...}, "seq": ...}`. The envelope
//! is parsed eagerly; `params` stay as JSON until the handler decodes them
//! into its typed shape.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::errors::DispatchError;

/// Methods understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    ListDevices,
    ListProfiles,
    Connect,
    FetchSnapshot,
    PtzMove,
    PtzStop,
    GetPresets,
    GotoPreset,
    SetPreset,
    GotoHome,
    SetHome,
    Reboot,
}

impl Method {
    /// Every method, in protocol documentation order.
    pub const ALL: [Self; 12] = [
        Self::ListDevices,
        Self::ListProfiles,
        Self::Connect,
        Self::FetchSnapshot,
        Self::PtzMove,
        Self::PtzStop,
        Self::GetPresets,
        Self::GotoPreset,
        Self::SetPreset,
        Self::GotoHome,
        Self::SetHome,
        Self::Reboot,
    ];

    /// Parses a wire method name (case-sensitive).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }

    /// Wire name, also used as the response `id`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListDevices => "listDevices",
            Self::ListProfiles => "listProfiles",
            Self::Connect => "connect",
            Self::FetchSnapshot => "fetchSnapshot",
            Self::PtzMove => "ptzMove",
            Self::PtzStop => "ptzStop",
            Self::GetPresets => "getPresets",
            Self::GotoPreset => "gotoPreset",
            Self::SetPreset => "setPreset",
            Self::GotoHome => "gotoHome",
            Self::SetHome => "setHome",
            Self::Reboot => "reboot",
        }
    }

    /// Whether the device must have completed `connect`.
    #[must_use]
    pub const fn requires_session(self) -> bool {
        !matches!(self, Self::ListDevices | Self::Connect)
    }

    /// Whether the device must expose the PTZ service.
    #[must_use]
    pub const fn requires_ptz(self) -> bool {
        matches!(
            self,
            Self::PtzMove
                | Self::PtzStop
                | Self::GetPresets
                | Self::GotoPreset
                | Self::SetPreset
                | Self::GotoHome
                | Self::SetHome
        )
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    seq: Option<Value>,
}

/// A parsed client request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub params: Value,
    /// Correlation value echoed verbatim in the response.
    pub seq: Option<Value>,
}

impl Request {
    /// Parses one frame.
    ///
    /// # Errors
    ///
    /// `MalformedMessage` for empty or non-JSON frames and envelopes without
    /// a string `method`; `UnknownMethod` for methods outside [`Method::ALL`].
    pub fn parse(frame: &[u8]) -> Result<Self, DispatchError> {
        let trimmed = frame.trim_ascii();
        if trimmed.is_empty() {
            return Err(DispatchError::malformed("empty frame"));
        }
        let envelope: Envelope =
            serde_json::from_slice(trimmed).map_err(DispatchError::from_json_error)?;
        let method = Method::parse(&envelope.method)
            .ok_or_else(|| DispatchError::unknown_method(envelope.method))?;
        Ok(Self {
            method,
            params: envelope.params,
            seq: envelope.seq,
        })
    }

    /// Decodes `params` into the method's shape.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, DispatchError> {
        T::deserialize(&self.params)
            .map_err(|error| DispatchError::invalid_params(error.to_string()))
    }
}

/// Params carrying only the target address.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressParams {
    pub address: String,
}

/// `connect` params.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectParams {
    pub address: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
}

/// Params for PTZ calls that only need a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileParams {
    pub address: String,
    #[serde(rename = "ProfileToken", default, deserialize_with = "optional_token")]
    pub profile_token: Option<String>,
}

/// Requested velocity for `ptzMove`; missing axes do not move.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SpeedParams {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// `ptzMove` params.
#[derive(Debug, Clone, Deserialize)]
pub struct PtzMoveParams {
    pub address: String,
    #[serde(rename = "ProfileToken", default, deserialize_with = "optional_token")]
    pub profile_token: Option<String>,
    #[serde(default)]
    pub speed: SpeedParams,
    /// Seconds before the camera stops on its own.
    #[serde(default)]
    pub timeout: Option<f64>,
}

/// `gotoPreset` params.
#[derive(Debug, Clone, Deserialize)]
pub struct GotoPresetParams {
    pub address: String,
    #[serde(rename = "ProfileToken", default, deserialize_with = "optional_token")]
    pub profile_token: Option<String>,
    #[serde(rename = "PresetToken", deserialize_with = "required_token")]
    pub preset_token: String,
}

/// `setPreset` params.
#[derive(Debug, Clone, Deserialize)]
pub struct SetPresetParams {
    pub address: String,
    #[serde(rename = "ProfileToken", default, deserialize_with = "optional_token")]
    pub profile_token: Option<String>,
    #[serde(rename = "PresetToken", default, deserialize_with = "optional_token")]
    pub preset_token: Option<String>,
    #[serde(rename = "PresetName", default, deserialize_with = "optional_token")]
    pub preset_name: Option<String>,
}

/// `gotoHome` params. `speed` is loosely typed on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct GotoHomeParams {
    pub address: String,
    #[serde(rename = "ProfileToken", default, deserialize_with = "optional_token")]
    pub profile_token: Option<String>,
    #[serde(default)]
    pub speed: Value,
}

impl GotoHomeParams {
    /// Speed in `[0, 1]`; anything that is not a number becomes full speed.
    #[must_use]
    pub fn normalised_speed(&self) -> f64 {
        let parsed = match &self.speed {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(speed) if speed.is_finite() => speed.clamp(0.0, 1.0),
            _ => 1.0,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenRepr {
    Text(String),
    Number(serde_json::Number),
}

impl TokenRepr {
    fn into_token(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// Tokens may arrive as strings or numbers; empty strings count as absent.
fn optional_token<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let token = Option::<TokenRepr>::deserialize(deserializer)?;
    Ok(token
        .map(TokenRepr::into_token)
        .filter(|token| !token.is_empty()))
}

fn required_token<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let token = TokenRepr::deserialize(deserializer)?.into_token();
    if token.is_empty() {
        return Err(serde::de::Error::custom("token must not be empty"));
    }
    Ok(token)
}
