//! Method table and per-method handlers.
//!
//! Every handler follows the same path: resolve the device by address, check
//! the method's gates against the copied-out [`DeviceHandle`], then await the
//! session call without holding the registry lock.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::device_service::{Credentials, DeviceSession, PtzVector, ServiceError};
use crate::registry::{DeviceHandle, SharedRegistry};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::{
    AddressParams, ConnectParams, GotoHomeParams, GotoPresetParams, Method, ProfileParams,
    PtzMoveParams, Request, SetPresetParams,
};
use super::response::Response;

/// Move duration used when `ptzMove` carries no usable timeout.
pub const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Executes requests against the registry's device sessions.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: SharedRegistry,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Runs `request` and builds the reply, echoing its `seq`.
    pub async fn dispatch(&self, request: Request) -> Response {
        let method = request.method;
        match self.execute(&request).await {
            Ok(result) => {
                debug!(target: DISPATCH_TARGET, %method, "request completed");
                Response::success(method, request.seq, result)
            }
            Err(error) => {
                match &error {
                    DispatchError::ExternalService(_)
                    | DispatchError::DeviceReplaced { .. }
                    | DispatchError::Internal => {
                        warn!(target: DISPATCH_TARGET, %method, %error, "request failed");
                    }
                    _ => debug!(target: DISPATCH_TARGET, %method, %error, "request rejected"),
                }
                Response::failure(method, request.seq, &error)
            }
        }
    }

    /// Runs `request` and returns the raw result value.
    ///
    /// # Errors
    ///
    /// Returns the gate or device failure that ended the request.
    pub async fn execute(&self, request: &Request) -> Result<Value, DispatchError> {
        match request.method {
            Method::ListDevices => Ok(self.list_devices()),
            Method::Connect => self.connect(request.params()?).await,
            Method::ListProfiles => {
                let params: AddressParams = request.params()?;
                let handle = self.authorised(&params.address, Method::ListProfiles)?;
                encode(handle.session.list_profiles().await?)
            }
            Method::FetchSnapshot => {
                let params: AddressParams = request.params()?;
                let handle = self.authorised(&params.address, Method::FetchSnapshot)?;
                let snapshot = handle.session.fetch_snapshot().await?;
                Ok(Value::String(snapshot.to_data_uri()))
            }
            Method::PtzMove => self.ptz_move(request.params()?).await,
            Method::PtzStop => {
                let params: ProfileParams = request.params()?;
                let handle = self.authorised(&params.address, Method::PtzStop)?;
                let profile = profile_token(handle.session.as_ref(), params.profile_token)?;
                handle.session.ptz_stop(&profile).await?;
                Ok(Value::Bool(true))
            }
            Method::GetPresets => {
                let params: ProfileParams = request.params()?;
                let handle = self.authorised(&params.address, Method::GetPresets)?;
                let profile = profile_token(handle.session.as_ref(), params.profile_token)?;
                encode(handle.session.get_presets(&profile).await?)
            }
            Method::GotoPreset => self.goto_preset(request.params()?).await,
            Method::SetPreset => self.set_preset(request.params()?).await,
            Method::GotoHome => self.goto_home(request.params()?).await,
            Method::SetHome => {
                let params: ProfileParams = request.params()?;
                let handle = self.authorised(&params.address, Method::SetHome)?;
                let profile = profile_token(handle.session.as_ref(), params.profile_token)?;
                handle.session.set_home_position(&profile).await?;
                Ok(Value::Bool(true))
            }
            Method::Reboot => {
                let params: AddressParams = request.params()?;
                let handle = self.authorised(&params.address, Method::Reboot)?;
                handle.session.reboot().await?;
                info!(target: DISPATCH_TARGET, address = %params.address, "reboot requested");
                Ok(Value::Bool(true))
            }
        }
    }

    /// Looks up `address` and applies `method`'s session and capability gates.
    fn authorised(&self, address: &str, method: Method) -> Result<DeviceHandle, DispatchError> {
        let handle = self.registry.handle(address)?;
        if method.requires_session() && !handle.connected {
            return Err(DispatchError::NotAuthenticated {
                address: handle.address,
            });
        }
        if method.requires_ptz() && !handle.services.supports_ptz() {
            return Err(DispatchError::CapabilityUnsupported);
        }
        Ok(handle)
    }

    fn list_devices(&self) -> Value {
        let devices = self
            .registry
            .snapshot()
            .into_iter()
            .map(|summary| {
                let address = summary.address.clone();
                let entry = serde_json::json!({
                    "name": summary.name,
                    "address": summary.address,
                });
                (address, entry)
            })
            .collect::<Map<String, Value>>();
        Value::Object(devices)
    }

    async fn connect(&self, params: ConnectParams) -> Result<Value, DispatchError> {
        let handle = self.authorised(&params.address, Method::Connect)?;
        if let Some(user) = params.user.filter(|user| !user.is_empty()) {
            handle
                .session
                .set_credentials(Credentials::new(user, params.pass.unwrap_or_default()));
        }

        let outcome = handle.session.connect().await?;
        let result = encode(&outcome.info)?;
        let updated = self.registry.mark_connected(
            &handle.address,
            &handle.session,
            outcome.info,
            outcome.services,
        );
        if !updated {
            return Err(DispatchError::DeviceReplaced {
                address: handle.address.clone(),
            });
        }
        info!(target: DISPATCH_TARGET, address = %handle.address, "device connected");
        Ok(result)
    }

    async fn ptz_move(&self, params: PtzMoveParams) -> Result<Value, DispatchError> {
        let handle = self.authorised(&params.address, Method::PtzMove)?;
        let profile = profile_token(handle.session.as_ref(), params.profile_token)?;
        let speed = PtzVector::clamped(params.speed.x, params.speed.y, params.speed.z);
        let timeout = move_timeout(params.timeout);
        handle.session.ptz_move(&profile, speed, timeout).await?;
        Ok(Value::Bool(true))
    }

    async fn goto_preset(&self, params: GotoPresetParams) -> Result<Value, DispatchError> {
        let handle = self.authorised(&params.address, Method::GotoPreset)?;
        let profile = profile_token(handle.session.as_ref(), params.profile_token)?;
        handle
            .session
            .goto_preset(&profile, &params.preset_token)
            .await?;
        Ok(Value::Bool(true))
    }

    async fn set_preset(&self, params: SetPresetParams) -> Result<Value, DispatchError> {
        let handle = self.authorised(&params.address, Method::SetPreset)?;
        let profile = profile_token(handle.session.as_ref(), params.profile_token)?;
        let name = params.preset_name.unwrap_or_else(|| profile.clone());
        handle
            .session
            .set_preset(&profile, &name, params.preset_token.as_deref())
            .await?;
        Ok(Value::Bool(true))
    }

    async fn goto_home(&self, params: GotoHomeParams) -> Result<Value, DispatchError> {
        let handle = self.authorised(&params.address, Method::GotoHome)?;
        let profile = profile_token(handle.session.as_ref(), params.profile_token.clone())?;
        handle
            .session
            .goto_home_position(&profile, params.normalised_speed())
            .await?;
        Ok(Value::Bool(true))
    }
}

/// Explicit token wins; otherwise the session's current profile.
fn profile_token(
    session: &dyn DeviceSession,
    explicit: Option<String>,
) -> Result<String, DispatchError> {
    explicit
        .or_else(|| session.current_profile_token())
        .ok_or(DispatchError::ExternalService(ServiceError::NoProfile))
}

fn move_timeout(seconds: Option<f64>) -> Duration {
    seconds
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        .unwrap_or(DEFAULT_MOVE_TIMEOUT)
}

fn encode<T: Serialize>(value: T) -> Result<Value, DispatchError> {
    serde_json::to_value(value).map_err(|_| DispatchError::Internal)
}
