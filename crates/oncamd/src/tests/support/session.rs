//! Recording double for [`DeviceSession`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::device_service::{
    ConnectOutcome, Credentials, DeviceInfo, DeviceSession, Preset, Profile, PtzVector,
    ServiceError, ServiceKind, ServiceSet, Snapshot,
};

/// One call received by a [`RecordingSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
    SetCredentials { user: String, pass: String },
    Connect,
    FetchSnapshot,
    ListProfiles,
    PtzMove {
        profile: String,
        speed: PtzVector,
        timeout: Duration,
    },
    PtzStop { profile: String },
    GetPresets { profile: String },
    GotoPreset { profile: String, preset: String },
    SetPreset {
        profile: String,
        name: String,
        token: Option<String>,
    },
    GotoHome { profile: String, speed: f64 },
    SetHome { profile: String },
    Reboot,
}

#[derive(Debug)]
struct Script {
    calls: Vec<SessionCall>,
    services: ServiceSet,
    connect_failure: Option<String>,
    current_profile: Option<String>,
    snapshot_delay: Duration,
    connect_delay: Duration,
}

/// Session that records every call and answers from a script.
///
/// Clones share the same recording, so a test can keep one clone after
/// handing the other to the registry.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    script: Arc<Mutex<Script>>,
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSession {
    /// Connects successfully, reports PTZ support and selects `profile-1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                calls: Vec::new(),
                services: ServiceSet::from_kinds([
                    ServiceKind::Device,
                    ServiceKind::Media,
                    ServiceKind::Ptz,
                ]),
                connect_failure: None,
                current_profile: Some("profile-1".to_owned()),
                snapshot_delay: Duration::ZERO,
                connect_delay: Duration::ZERO,
            })),
        }
    }

    #[must_use]
    pub fn with_services(self, kinds: impl IntoIterator<Item = ServiceKind>) -> Self {
        self.lock().services = ServiceSet::from_kinds(kinds);
        self
    }

    #[must_use]
    pub fn failing_connect(self, reason: &str) -> Self {
        self.lock().connect_failure = Some(reason.to_owned());
        self
    }

    #[must_use]
    pub fn without_profile(self) -> Self {
        self.lock().current_profile = None;
        self
    }

    #[must_use]
    pub fn with_snapshot_delay(self, delay: Duration) -> Self {
        self.lock().snapshot_delay = delay;
        self
    }

    #[must_use]
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        self.lock().connect_delay = delay;
        self
    }

    #[must_use]
    pub fn into_session(self) -> Arc<dyn DeviceSession> {
        Arc::new(self)
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<SessionCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("session script mutex poisoned")
    }

    fn record(&self, call: SessionCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl DeviceSession for RecordingSession {
    fn set_credentials(&self, credentials: Credentials) {
        self.record(SessionCall::SetCredentials {
            user: credentials.user,
            pass: credentials.pass,
        });
    }

    async fn connect(&self) -> Result<ConnectOutcome, ServiceError> {
        self.record(SessionCall::Connect);
        let delay = self.lock().connect_delay;
        tokio::time::sleep(delay).await;
        let script = self.lock();
        if let Some(reason) = &script.connect_failure {
            return Err(ServiceError::Fault {
                code: "ter:NotAuthorized".to_owned(),
                reason: reason.clone(),
            });
        }
        Ok(ConnectOutcome {
            info: DeviceInfo {
                manufacturer: "Acme".to_owned(),
                model: "PTZ-1".to_owned(),
                firmware_version: "1.0".to_owned(),
                serial_number: "SN-1".to_owned(),
                hardware_id: "HW-1".to_owned(),
            },
            services: script.services.clone(),
        })
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, ServiceError> {
        self.record(SessionCall::FetchSnapshot);
        let delay = self.lock().snapshot_delay;
        tokio::time::sleep(delay).await;
        Ok(Snapshot {
            content_type: "image/jpeg".to_owned(),
            body: vec![0xff, 0xd8, 0xff],
        })
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, ServiceError> {
        self.record(SessionCall::ListProfiles);
        Ok(vec![Profile {
            token: "profile-1".to_owned(),
            name: "Main".to_owned(),
            ..Profile::default()
        }])
    }

    fn current_profile_token(&self) -> Option<String> {
        self.lock().current_profile.clone()
    }

    async fn ptz_move(
        &self,
        profile_token: &str,
        speed: PtzVector,
        timeout: Duration,
    ) -> Result<(), ServiceError> {
        self.record(SessionCall::PtzMove {
            profile: profile_token.to_owned(),
            speed,
            timeout,
        });
        Ok(())
    }

    async fn ptz_stop(&self, profile_token: &str) -> Result<(), ServiceError> {
        self.record(SessionCall::PtzStop {
            profile: profile_token.to_owned(),
        });
        Ok(())
    }

    async fn get_presets(&self, profile_token: &str) -> Result<Vec<Preset>, ServiceError> {
        self.record(SessionCall::GetPresets {
            profile: profile_token.to_owned(),
        });
        Ok(vec![Preset {
            name: "Door".to_owned(),
            token: "1".to_owned(),
        }])
    }

    async fn goto_preset(
        &self,
        profile_token: &str,
        preset_token: &str,
    ) -> Result<(), ServiceError> {
        self.record(SessionCall::GotoPreset {
            profile: profile_token.to_owned(),
            preset: preset_token.to_owned(),
        });
        Ok(())
    }

    async fn set_preset(
        &self,
        profile_token: &str,
        preset_name: &str,
        preset_token: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.record(SessionCall::SetPreset {
            profile: profile_token.to_owned(),
            name: preset_name.to_owned(),
            token: preset_token.map(str::to_owned),
        });
        Ok(())
    }

    async fn goto_home_position(
        &self,
        profile_token: &str,
        speed: f64,
    ) -> Result<(), ServiceError> {
        self.record(SessionCall::GotoHome {
            profile: profile_token.to_owned(),
            speed,
        });
        Ok(())
    }

    async fn set_home_position(&self, profile_token: &str) -> Result<(), ServiceError> {
        self.record(SessionCall::SetHome {
            profile: profile_token.to_owned(),
        });
        Ok(())
    }

    async fn reboot(&self) -> Result<(), ServiceError> {
        self.record(SessionCall::Reboot);
        Ok(())
    }
}
