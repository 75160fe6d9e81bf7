//! Readers for ONVIF response bodies.

use chrono::{DateTime, NaiveDate, Utc};
use roxmltree::Node;

use crate::device_service::{
    DeviceInfo, Preset, Profile, PtzSummary, ServiceError, ServiceKind, ServiceSet, VideoSummary,
};

use super::xml;

/// Service endpoints advertised by `GetCapabilities`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct Capabilities {
    pub(super) media: Option<String>,
    pub(super) ptz: Option<String>,
    pub(super) events: Option<String>,
    pub(super) imaging: Option<String>,
    pub(super) analytics: Option<String>,
}

impl Capabilities {
    pub(super) fn services(&self) -> ServiceSet {
        let mut services = ServiceSet::from_kinds([ServiceKind::Device]);
        let advertised = [
            (ServiceKind::Media, &self.media),
            (ServiceKind::Ptz, &self.ptz),
            (ServiceKind::Events, &self.events),
            (ServiceKind::Imaging, &self.imaging),
            (ServiceKind::Analytics, &self.analytics),
        ];
        for (kind, address) in advertised {
            if address.is_some() {
                services.insert(kind);
            }
        }
        services
    }
}

fn response<'a, 'input>(
    body: Node<'a, 'input>,
    name: &str,
) -> Result<Node<'a, 'input>, ServiceError> {
    xml::descendant(body, name).ok_or_else(|| ServiceError::parse(format!("missing {name}")))
}

pub(super) fn parse_device_info(body: Node<'_, '_>) -> Result<DeviceInfo, ServiceError> {
    let node = response(body, "GetDeviceInformationResponse")?;
    let field = |name: &str| xml::child_text(node, name).unwrap_or_default();
    Ok(DeviceInfo {
        manufacturer: field("Manufacturer"),
        model: field("Model"),
        firmware_version: field("FirmwareVersion"),
        serial_number: field("SerialNumber"),
        hardware_id: field("HardwareId"),
    })
}

pub(super) fn parse_capabilities(body: Node<'_, '_>) -> Result<Capabilities, ServiceError> {
    let response_node = response(body, "GetCapabilitiesResponse")?;
    let capabilities = xml::child(response_node, "Capabilities")
        .ok_or_else(|| ServiceError::parse("missing Capabilities"))?;
    let address = |name: &str| {
        xml::child(capabilities, name)
            .and_then(|section| xml::child_text(section, "XAddr"))
            .filter(|address| !address.is_empty())
    };
    Ok(Capabilities {
        media: address("Media"),
        ptz: address("PTZ"),
        events: address("Events"),
        imaging: address("Imaging"),
        analytics: address("Analytics"),
    })
}

pub(super) fn parse_profiles(body: Node<'_, '_>) -> Result<Vec<Profile>, ServiceError> {
    let node = response(body, "GetProfilesResponse")?;
    Ok(node
        .children()
        .filter(|child| child.has_tag_name("Profiles"))
        .filter_map(|profile| {
            let token = profile.attribute("token")?.to_owned();
            Some(Profile {
                name: xml::child_text(profile, "Name").unwrap_or_default(),
                video: xml::child(profile, "VideoEncoderConfiguration").map(video_summary),
                ptz: xml::child(profile, "PTZConfiguration").map(|ptz| PtzSummary {
                    node: xml::child_text(ptz, "NodeToken"),
                }),
                token,
            })
        })
        .collect())
}

fn video_summary(encoder: Node<'_, '_>) -> VideoSummary {
    let number = |path: &[&str]| {
        xml::path(encoder, path)
            .map(xml::text)
            .and_then(|value| value.parse::<u32>().ok())
    };
    VideoSummary {
        encoding: xml::child_text(encoder, "Encoding").unwrap_or_default(),
        width: number(&["Resolution", "Width"]).unwrap_or_default(),
        height: number(&["Resolution", "Height"]).unwrap_or_default(),
        framerate: number(&["RateControl", "FrameRateLimit"]),
    }
}

pub(super) fn parse_snapshot_uri(body: Node<'_, '_>) -> Result<String, ServiceError> {
    let node = response(body, "GetSnapshotUriResponse")?;
    xml::descendant_text(node, "Uri")
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| ServiceError::parse("snapshot response has no Uri"))
}

/// Camera clock from `GetSystemDateAndTime`, read from `UTCDateTime`.
pub(super) fn parse_system_date_time(body: Node<'_, '_>) -> Result<DateTime<Utc>, ServiceError> {
    let node = response(body, "GetSystemDateAndTimeResponse")?;
    let utc = xml::descendant(node, "UTCDateTime")
        .ok_or_else(|| ServiceError::parse("camera reported no UTC time"))?;
    let field = |section: &str, name: &str| {
        xml::path(utc, &[section, name])
            .map(xml::text)
            .and_then(|value| value.trim().parse::<u32>().ok())
            .ok_or_else(|| ServiceError::parse(format!("missing {section}/{name}")))
    };
    let year = i32::try_from(field("Date", "Year")?)
        .map_err(|_| ServiceError::parse("year out of range"))?;
    NaiveDate::from_ymd_opt(year, field("Date", "Month")?, field("Date", "Day")?)
        .and_then(|date| {
            date.and_hms_opt(
                field("Time", "Hour").ok()?,
                field("Time", "Minute").ok()?,
                field("Time", "Second").ok()?,
            )
        })
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ServiceError::parse("camera reported an invalid date"))
}

pub(super) fn parse_presets(body: Node<'_, '_>) -> Result<Vec<Preset>, ServiceError> {
    let node = response(body, "GetPresetsResponse")?;
    Ok(node
        .children()
        .filter(|child| child.has_tag_name("Preset"))
        .filter_map(|preset| {
            Some(Preset {
                token: preset.attribute("token")?.to_owned(),
                name: xml::child_text(preset, "Name").unwrap_or_default(),
            })
        })
        .collect())
}
