//! WS-Discovery probing for ONVIF network video transmitters.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use roxmltree::Node;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};
use url::Url;

use crate::device_service::{DeviceDescriptor, ServiceError};

use super::ONVIF_TARGET;
use super::xml;

/// WS-Discovery multicast group and port.
pub const DISCOVERY_MULTICAST: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 3702));

const SCOPE_PREFIX: &str = "onvif://www.onvif.org/";
const RECEIVE_BUFFER: usize = 64 * 1024;

/// Sends one probe and collects matches until `window` elapses.
///
/// Duplicate answers from the same endpoint are collapsed; the first wins.
pub(super) async fn probe(window: Duration) -> Result<Vec<DeviceDescriptor>, ServiceError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    let message_id = format!("uuid:{}", random_uuid());
    socket
        .send_to(probe_message(&message_id).as_bytes(), DISCOVERY_MULTICAST)
        .await?;
    debug!(target: ONVIF_TARGET, %message_id, ?window, "probe sent");

    let deadline = Instant::now() + window;
    let mut buffer = vec![0_u8; RECEIVE_BUFFER];
    let mut found = IndexMap::<String, DeviceDescriptor>::new();
    while let Ok(received) = timeout_at(deadline, socket.recv_from(&mut buffer)).await {
        let (length, peer) = match received {
            Ok(received) => received,
            Err(error) => {
                warn!(target: ONVIF_TARGET, %error, "probe receive failed");
                continue;
            }
        };
        let payload = String::from_utf8_lossy(buffer.get(..length).unwrap_or_default());
        match parse_probe_matches(&payload) {
            Ok(matches) => {
                for descriptor in matches {
                    found.entry(descriptor.urn.clone()).or_insert(descriptor);
                }
            }
            Err(error) => debug!(target: ONVIF_TARGET, %peer, %error, "ignoring probe reply"),
        }
    }
    Ok(found.into_values().collect())
}

fn probe_message(message_id: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" "#,
            r#"xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing" "#,
            r#"xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery" "#,
            r#"xmlns:dn="http://www.onvif.org/ver10/network/wsdl">"#,
            "<s:Header>",
            r#"<a:Action s:mustUnderstand="1">http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</a:Action>"#,
            "<a:MessageID>{message_id}</a:MessageID>",
            "<a:ReplyTo><a:Address>http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</a:Address></a:ReplyTo>",
            r#"<a:To s:mustUnderstand="1">urn:schemas-xmlsoap-org:ws:2005:04:discovery</a:To>"#,
            "</s:Header>",
            "<s:Body><d:Probe><d:Types>dn:NetworkVideoTransmitter</d:Types></d:Probe></s:Body>",
            "</s:Envelope>"
        ),
        message_id = message_id,
    )
}

/// RFC 4122 version 4 identifier from random bytes.
fn random_uuid() -> String {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        hex.get(0..8).unwrap_or_default(),
        hex.get(8..12).unwrap_or_default(),
        hex.get(12..16).unwrap_or_default(),
        hex.get(16..20).unwrap_or_default(),
        hex.get(20..32).unwrap_or_default(),
    )
}

/// Extracts every `ProbeMatch` in a reply.
pub(super) fn parse_probe_matches(payload: &str) -> Result<Vec<DeviceDescriptor>, ServiceError> {
    let document = xml::parse(payload)?;
    let descriptors = document
        .descendants()
        .filter(|node| node.has_tag_name("ProbeMatch"))
        .filter_map(|node| match descriptor_from_match(node) {
            Ok(descriptor) => Some(descriptor),
            Err(error) => {
                debug!(target: ONVIF_TARGET, %error, "skipping probe match");
                None
            }
        })
        .collect();
    Ok(descriptors)
}

fn descriptor_from_match(node: Node<'_, '_>) -> Result<DeviceDescriptor, ServiceError> {
    let urn = xml::path(node, &["EndpointReference", "Address"])
        .map(xml::text)
        .filter(|urn| !urn.is_empty())
        .ok_or_else(|| ServiceError::parse("probe match without endpoint reference"))?;
    let list = |name: &str| -> Vec<String> {
        xml::child_text(node, name)
            .map(|value| value.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    };
    let service_addresses = list("XAddrs");
    let scopes = list("Scopes");
    let first = service_addresses
        .first()
        .ok_or_else(|| ServiceError::parse(format!("probe match {urn} has no XAddrs")))?;
    let address = host_of(first)?;

    Ok(DeviceDescriptor {
        name: scope_value(&scopes, "name"),
        hardware: scope_value(&scopes, "hardware"),
        location: scope_value(&scopes, "location"),
        types: list("Types"),
        urn,
        address,
        service_addresses,
        scopes,
    })
}

fn host_of(service_address: &str) -> Result<String, ServiceError> {
    Url::parse(service_address)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .ok_or_else(|| ServiceError::InvalidAddress {
            address: service_address.to_owned(),
        })
}

/// Last path segment of the first `onvif://www.onvif.org/<kind>/...` scope.
fn scope_value(scopes: &[String], kind: &str) -> String {
    scopes
        .iter()
        .filter_map(|scope| scope.strip_prefix(SCOPE_PREFIX))
        .find(|rest| rest.split('/').next() == Some(kind))
        .and_then(|rest| rest.rsplit('/').next())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .unwrap_or_default()
}
