//! Per-camera ONVIF session.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::device_service::{
    ConnectOutcome, Credentials, DeviceDescriptor, DeviceSession, Preset, Profile, PtzVector,
    ServiceError, Snapshot,
};

use super::ONVIF_TARGET;
use super::responses::{
    parse_capabilities, parse_device_info, parse_presets, parse_profiles, parse_snapshot_uri,
    parse_system_date_time,
};
use super::soap::{self, request_error, with_body};
use super::xml::escape;

const GET_SYSTEM_DATE_AND_TIME: &str = "<tds:GetSystemDateAndTime/>";
const GET_DEVICE_INFORMATION: &str = "<tds:GetDeviceInformation/>";
const GET_CAPABILITIES: &str =
    "<tds:GetCapabilities><tds:Category>All</tds:Category></tds:GetCapabilities>";
const GET_PROFILES: &str = "<trt:GetProfiles/>";
const SYSTEM_REBOOT: &str = "<tds:SystemReboot/>";
const DEFAULT_SNAPSHOT_TYPE: &str = "image/jpeg";

#[derive(Debug, Default)]
struct SessionState {
    credentials: Option<Credentials>,
    media_url: Option<String>,
    ptz_url: Option<String>,
    current_profile: Option<String>,
    clock_offset: Option<TimeDelta>,
}

/// Session bound to one camera's device service address.
#[derive(Debug)]
pub struct OnvifSession {
    http: reqwest::Client,
    address: String,
    device_url: String,
    state: Mutex<SessionState>,
}

impl OnvifSession {
    /// Session against the first advertised service address.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidAddress`] when no usable URL was advertised.
    pub fn new(http: reqwest::Client, descriptor: &DeviceDescriptor) -> Result<Self, ServiceError> {
        let device_url = descriptor
            .service_addresses
            .first()
            .filter(|url| Url::parse(url).is_ok())
            .cloned()
            .ok_or_else(|| ServiceError::InvalidAddress {
                address: descriptor.address.clone(),
            })?;
        Ok(Self {
            http,
            address: descriptor.address.clone(),
            device_url,
            state: Mutex::new(SessionState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn credentials(&self) -> Option<Credentials> {
        self.state().credentials.clone()
    }

    fn media_url(&self) -> Result<String, ServiceError> {
        self.state()
            .media_url
            .clone()
            .ok_or(ServiceError::MissingService { service: "media" })
    }

    fn ptz_url(&self) -> Result<String, ServiceError> {
        self.state()
            .ptz_url
            .clone()
            .ok_or(ServiceError::MissingService { service: "PTZ" })
    }

    fn clock_offset(&self) -> TimeDelta {
        self.state().clock_offset.unwrap_or_else(TimeDelta::zero)
    }

    async fn call(&self, endpoint: &str, body: &str) -> Result<String, ServiceError> {
        let credentials = self.credentials();
        soap::call(
            &self.http,
            endpoint,
            body,
            credentials.as_ref(),
            self.clock_offset(),
        )
        .await
    }

    /// Learns how far the camera clock is from ours so tokens carry its time.
    async fn synchronise_clock(&self) {
        let reply = soap::call(
            &self.http,
            &self.device_url,
            GET_SYSTEM_DATE_AND_TIME,
            None,
            TimeDelta::zero(),
        )
        .await
        .and_then(|text| with_body(&text, parse_system_date_time));
        let offset = reply.map_or_else(
            |error| {
                debug!(
                    target: ONVIF_TARGET,
                    address = %self.address,
                    %error,
                    "camera clock unavailable; signing with local time"
                );
                TimeDelta::zero()
            },
            |camera_now| camera_now - Utc::now(),
        );
        debug!(
            target: ONVIF_TARGET,
            address = %self.address,
            offset_secs = offset.num_seconds(),
            "camera clock offset"
        );
        self.state().clock_offset = Some(offset);
    }

    async fn ptz_call(&self, body: &str) -> Result<String, ServiceError> {
        let endpoint = self.ptz_url()?;
        self.call(&endpoint, body).await
    }

    async fn fetch_profiles(&self, media_url: &str) -> Result<Vec<Profile>, ServiceError> {
        let text = self.call(media_url, GET_PROFILES).await?;
        with_body(&text, parse_profiles)
    }

    async fn download(&self, uri: &str) -> Result<Snapshot, ServiceError> {
        let mut request = self.http.get(uri);
        if let Some(credentials) = self.credentials() {
            request = request.basic_auth(credentials.user, Some(credentials.pass));
        }
        let response = request
            .send()
            .await
            .map_err(|error| request_error(uri, &error))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Http {
                endpoint: uri.to_owned(),
                status: status.as_u16(),
            });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or_else(|| DEFAULT_SNAPSHOT_TYPE.to_owned(), str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|error| request_error(uri, &error))?;
        Ok(Snapshot {
            content_type,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl DeviceSession for OnvifSession {
    fn set_credentials(&self, credentials: Credentials) {
        self.state().credentials = Some(credentials);
    }

    async fn connect(&self) -> Result<ConnectOutcome, ServiceError> {
        self.synchronise_clock().await;
        let info_text = self.call(&self.device_url, GET_DEVICE_INFORMATION).await?;
        let info = with_body(&info_text, parse_device_info)?;
        let capability_text = self.call(&self.device_url, GET_CAPABILITIES).await?;
        let capabilities = with_body(&capability_text, parse_capabilities)?;
        let profiles = match capabilities.media.as_deref() {
            Some(media_url) => self.fetch_profiles(media_url).await?,
            None => Vec::new(),
        };

        let services = capabilities.services();
        let current_profile = profiles.first().map(|profile| profile.token.clone());
        debug!(
            target: ONVIF_TARGET,
            address = %self.address,
            profiles = profiles.len(),
            ?services,
            "session established"
        );
        let mut state = self.state();
        state.media_url = capabilities.media;
        state.ptz_url = capabilities.ptz;
        state.current_profile = current_profile;
        drop(state);
        Ok(ConnectOutcome { info, services })
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, ServiceError> {
        let media_url = self.media_url()?;
        let profile = self.current_profile_token().ok_or(ServiceError::NoProfile)?;
        let body = format!(
            "<trt:GetSnapshotUri><trt:ProfileToken>{}</trt:ProfileToken></trt:GetSnapshotUri>",
            escape(&profile)
        );
        let text = self.call(&media_url, &body).await?;
        let uri = with_body(&text, parse_snapshot_uri)?;
        self.download(&uri).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, ServiceError> {
        let media_url = self.media_url()?;
        self.fetch_profiles(&media_url).await
    }

    fn current_profile_token(&self) -> Option<String> {
        self.state().current_profile.clone()
    }

    async fn ptz_move(
        &self,
        profile_token: &str,
        speed: PtzVector,
        timeout: Duration,
    ) -> Result<(), ServiceError> {
        let body = format!(
            concat!(
                "<tptz:ContinuousMove>",
                "<tptz:ProfileToken>{profile}</tptz:ProfileToken>",
                "<tptz:Velocity>",
                r#"<tt:PanTilt x="{x}" y="{y}"/>"#,
                r#"<tt:Zoom x="{z}"/>"#,
                "</tptz:Velocity>",
                "<tptz:Timeout>{timeout}</tptz:Timeout>",
                "</tptz:ContinuousMove>"
            ),
            profile = escape(profile_token),
            x = speed.x,
            y = speed.y,
            z = speed.z,
            timeout = xml_duration(timeout),
        );
        self.ptz_call(&body).await.map(drop)
    }

    async fn ptz_stop(&self, profile_token: &str) -> Result<(), ServiceError> {
        let body = format!(
            "<tptz:Stop><tptz:ProfileToken>{}</tptz:ProfileToken><tptz:PanTilt>true</tptz:PanTilt><tptz:Zoom>true</tptz:Zoom></tptz:Stop>",
            escape(profile_token)
        );
        self.ptz_call(&body).await.map(drop)
    }

    async fn get_presets(&self, profile_token: &str) -> Result<Vec<Preset>, ServiceError> {
        let body = format!(
            "<tptz:GetPresets><tptz:ProfileToken>{}</tptz:ProfileToken></tptz:GetPresets>",
            escape(profile_token)
        );
        let text = self.ptz_call(&body).await?;
        with_body(&text, parse_presets)
    }

    async fn goto_preset(
        &self,
        profile_token: &str,
        preset_token: &str,
    ) -> Result<(), ServiceError> {
        let body = format!(
            "<tptz:GotoPreset><tptz:ProfileToken>{}</tptz:ProfileToken><tptz:PresetToken>{}</tptz:PresetToken></tptz:GotoPreset>",
            escape(profile_token),
            escape(preset_token)
        );
        self.ptz_call(&body).await.map(drop)
    }

    async fn set_preset(
        &self,
        profile_token: &str,
        preset_name: &str,
        preset_token: Option<&str>,
    ) -> Result<(), ServiceError> {
        let token = preset_token
            .map(|token| format!("<tptz:PresetToken>{}</tptz:PresetToken>", escape(token)))
            .unwrap_or_default();
        let body = format!(
            "<tptz:SetPreset><tptz:ProfileToken>{}</tptz:ProfileToken><tptz:PresetName>{}</tptz:PresetName>{token}</tptz:SetPreset>",
            escape(profile_token),
            escape(preset_name)
        );
        self.ptz_call(&body).await.map(drop)
    }

    async fn goto_home_position(
        &self,
        profile_token: &str,
        speed: f64,
    ) -> Result<(), ServiceError> {
        let body = format!(
            concat!(
                "<tptz:GotoHomePosition>",
                "<tptz:ProfileToken>{profile}</tptz:ProfileToken>",
                "<tptz:Speed>",
                r#"<tt:PanTilt x="{speed}" y="{speed}"/>"#,
                r#"<tt:Zoom x="{speed}"/>"#,
                "</tptz:Speed>",
                "</tptz:GotoHomePosition>"
            ),
            profile = escape(profile_token),
            speed = speed,
        );
        self.ptz_call(&body).await.map(drop)
    }

    async fn set_home_position(&self, profile_token: &str) -> Result<(), ServiceError> {
        let body = format!(
            "<tptz:SetHomePosition><tptz:ProfileToken>{}</tptz:ProfileToken></tptz:SetHomePosition>",
            escape(profile_token)
        );
        self.ptz_call(&body).await.map(drop)
    }

    async fn reboot(&self) -> Result<(), ServiceError> {
        self.call(&self.device_url, SYSTEM_REBOOT).await.map(drop)
    }
}

/// `xs:duration` in seconds, e.g. `PT1S` or `PT2.5S`.
fn xml_duration(duration: Duration) -> String {
    format!("PT{}S", duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::Router;
    use axum::extract::State;
    use axum::routing::{get, post};

    type Requests = Arc<Mutex<Vec<String>>>;

    const MEDIA_PATH: &str = "/onvif/media";
    const CAMERA_AHEAD_HOURS: i64 = 2;
    const PTZ_PATH: &str = "/onvif/ptz";

    fn envelope(body: &str) -> String {
        format!(
            r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body>{body}</env:Body></env:Envelope>"#
        )
    }

    async fn soap_endpoint(State((requests, base)): State<(Requests, String)>, body: String) -> String {
        requests.lock().expect("requests lock").push(body.clone());
        let reply = if body.contains("GetSystemDateAndTime") {
            let now = Utc::now() + TimeDelta::hours(CAMERA_AHEAD_HOURS);
            format!(
                concat!(
                    "<GetSystemDateAndTimeResponse><SystemDateAndTime><UTCDateTime>",
                    "<Time><Hour>{}</Hour><Minute>{}</Minute><Second>{}</Second></Time>",
                    "<Date><Year>{}</Year><Month>{}</Month><Day>{}</Day></Date>",
                    "</UTCDateTime></SystemDateAndTime></GetSystemDateAndTimeResponse>"
                ),
                now.format("%H"),
                now.format("%M"),
                now.format("%S"),
                now.format("%Y"),
                now.format("%m"),
                now.format("%d"),
            )
        } else if body.contains("GetDeviceInformation") {
            "<GetDeviceInformationResponse><Manufacturer>Acme</Manufacturer><Model>PT-200</Model><FirmwareVersion>1.0</FirmwareVersion><SerialNumber>42</SerialNumber><HardwareId>HW</HardwareId></GetDeviceInformationResponse>".to_owned()
        } else if body.contains("GetCapabilities") {
            format!(
                "<GetCapabilitiesResponse><Capabilities><Media><XAddr>{base}{MEDIA_PATH}</XAddr></Media><PTZ><XAddr>{base}{PTZ_PATH}</XAddr></PTZ></Capabilities></GetCapabilitiesResponse>"
            )
        } else if body.contains("GetProfiles") {
            r#"<GetProfilesResponse><Profiles token="main"><Name>Main</Name></Profiles></GetProfilesResponse>"#.to_owned()
        } else if body.contains("GetSnapshotUri") {
            format!("<GetSnapshotUriResponse><MediaUri><Uri>{base}/snapshot.jpg</Uri></MediaUri></GetSnapshotUriResponse>")
        } else {
            "<Ok/>".to_owned()
        };
        envelope(&reply)
    }

    async fn fake_camera() -> (OnvifSession, Requests) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake camera");
        let base = format!("http://{}", listener.local_addr().expect("addr"));
        let requests = Requests::default();
        let router = Router::new()
            .route("/onvif/device_service", post(soap_endpoint))
            .route(MEDIA_PATH, post(soap_endpoint))
            .route(PTZ_PATH, post(soap_endpoint))
            .route(
                "/snapshot.jpg",
                get(|| async { ([(CONTENT_TYPE, "image/jpeg")], vec![0xff_u8, 0xd8]) }),
            )
            .with_state((Arc::clone(&requests), base.clone()));
        tokio::spawn(async move { axum::serve(listener, router).await });

        let descriptor = DeviceDescriptor {
            address: "127.0.0.1".to_owned(),
            service_addresses: vec![format!("{base}/onvif/device_service")],
            ..DeviceDescriptor::default()
        };
        let session = OnvifSession::new(reqwest::Client::new(), &descriptor).expect("session");
        (session, requests)
    }

    #[test]
    fn durations_render_as_seconds() {
        assert_eq!(xml_duration(Duration::from_secs(1)), "PT1S");
        assert_eq!(xml_duration(Duration::from_millis(2500)), "PT2.5S");
    }

    #[test]
    fn rejects_descriptor_without_service_address() {
        let descriptor = DeviceDescriptor {
            address: "10.0.0.7".to_owned(),
            ..DeviceDescriptor::default()
        };
        let error = OnvifSession::new(reqwest::Client::new(), &descriptor).expect_err("no xaddr");
        assert!(matches!(error, ServiceError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn connect_learns_services_and_profile() {
        let (session, requests) = fake_camera().await;
        session.set_credentials(Credentials::new("admin", "secret"));

        let outcome = session.connect().await.expect("connect");
        assert_eq!(outcome.info.manufacturer, "Acme");
        assert!(outcome.services.supports_ptz());
        assert_eq!(session.current_profile_token().as_deref(), Some("main"));

        let recorded = requests.lock().expect("requests lock").clone();
        assert_eq!(recorded.len(), 4);
        let (clock, signed) = recorded.split_first().expect("clock request");
        assert!(clock.contains("GetSystemDateAndTime"));
        assert!(!clock.contains("wsse:Security"));
        assert!(signed.iter().all(|body| body.contains("<wsse:Username>admin</wsse:Username>")));
    }

    #[tokio::test]
    async fn tokens_are_stamped_with_camera_clock() {
        let (session, requests) = fake_camera().await;
        session.set_credentials(Credentials::new("admin", "secret"));
        session.connect().await.expect("connect");

        let recorded = requests.lock().expect("requests lock").clone();
        let info = recorded
            .iter()
            .find(|body| body.contains("GetDeviceInformation"))
            .expect("device information request");
        let stamp = info
            .split_once("<wsu:Created>")
            .and_then(|(_, rest)| rest.split_once("</wsu:Created>"))
            .map(|(stamp, _)| stamp)
            .expect("created stamp");
        let created = chrono::DateTime::parse_from_rfc3339(stamp)
            .expect("rfc3339 stamp")
            .with_timezone(&Utc);
        let drift = created - (Utc::now() + TimeDelta::hours(CAMERA_AHEAD_HOURS));
        assert!(drift.num_seconds().abs() <= 3, "created {created} drifted by {drift}");
    }

    #[tokio::test]
    async fn ptz_calls_target_ptz_service() {
        let (session, requests) = fake_camera().await;
        session.connect().await.expect("connect");

        session
            .ptz_move("main", PtzVector::clamped(0.5, -0.25, 0.0), Duration::from_millis(1500))
            .await
            .expect("move");
        session
            .set_preset("main", "Gate", None)
            .await
            .expect("set preset");

        let recorded = requests.lock().expect("requests lock").clone();
        let movement = recorded
            .iter()
            .find(|body| body.contains("ContinuousMove"))
            .expect("move request");
        assert!(movement.contains(r#"<tt:PanTilt x="0.5" y="-0.25"/>"#));
        assert!(movement.contains("<tptz:Timeout>PT1.5S</tptz:Timeout>"));
        let preset = recorded.last().expect("preset request");
        assert!(preset.contains("<tptz:PresetName>Gate</tptz:PresetName>"));
        assert!(!preset.contains("PresetToken"));
    }

    #[tokio::test]
    async fn snapshot_is_downloaded_from_advertised_uri() {
        let (session, _requests) = fake_camera().await;
        session.connect().await.expect("connect");

        let snapshot = session.fetch_snapshot().await.expect("snapshot");
        assert_eq!(snapshot.content_type, "image/jpeg");
        assert_eq!(snapshot.body, vec![0xff, 0xd8]);
    }

    #[tokio::test]
    async fn ptz_before_connect_reports_missing_service() {
        let (session, _requests) = fake_camera().await;
        let error = session.ptz_stop("main").await.expect_err("not connected");
        assert!(matches!(error, ServiceError::MissingService { service: "PTZ" }));
    }
}
