//! SOAP 1.2 envelopes over HTTP.

use chrono::TimeDelta;
use reqwest::header::CONTENT_TYPE;
use roxmltree::Node;
use tracing::trace;

use crate::device_service::{Credentials, ServiceError};

use super::ONVIF_TARGET;
use super::security::UsernameToken;
use super::xml;

const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// Namespace declarations every request body may rely on.
const NAMESPACES: &str = concat!(
    r#"xmlns:s="http://www.w3.org/2003/05/soap-envelope" "#,
    r#"xmlns:tds="http://www.onvif.org/ver10/device/wsdl" "#,
    r#"xmlns:trt="http://www.onvif.org/ver10/media/wsdl" "#,
    r#"xmlns:tptz="http://www.onvif.org/ver20/ptz/wsdl" "#,
    r#"xmlns:tt="http://www.onvif.org/ver10/schema""#,
);

/// Wraps `body` in an envelope, adding a security header when credentials are set.
pub(super) fn envelope(
    body: &str,
    credentials: Option<&Credentials>,
    clock_offset: TimeDelta,
) -> String {
    let header = credentials
        .map(|credentials| UsernameToken::generate(credentials, clock_offset).to_header())
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope {NAMESPACES}><s:Header>{header}</s:Header><s:Body>{body}</s:Body></s:Envelope>"#
    )
}

/// Posts a request and returns the raw response text.
///
/// A SOAP fault is reported as [`ServiceError::Fault`] whatever the HTTP status.
pub(super) async fn call(
    http: &reqwest::Client,
    endpoint: &str,
    body: &str,
    credentials: Option<&Credentials>,
    clock_offset: TimeDelta,
) -> Result<String, ServiceError> {
    trace!(target: ONVIF_TARGET, %endpoint, %body, "soap request");
    let response = http
        .post(endpoint)
        .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
        .body(envelope(body, credentials, clock_offset))
        .send()
        .await
        .map_err(|error| request_error(endpoint, &error))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|error| request_error(endpoint, &error))?;

    if let Some(fault) = parse_fault(&text) {
        return Err(fault);
    }
    if !status.is_success() {
        return Err(ServiceError::Http {
            endpoint: endpoint.to_owned(),
            status: status.as_u16(),
        });
    }
    Ok(text)
}

/// Maps a `reqwest` failure, keeping timeouts distinct.
pub(super) fn request_error(endpoint: &str, error: &reqwest::Error) -> ServiceError {
    if error.is_timeout() {
        ServiceError::Timeout {
            endpoint: endpoint.to_owned(),
        }
    } else {
        ServiceError::transport(format!("{endpoint}: {error}"))
    }
}

/// Runs `read` over the `s:Body` element of `text`.
pub(super) fn with_body<T>(
    text: &str,
    read: impl FnOnce(Node<'_, '_>) -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    let document = xml::parse(text)?;
    let body = xml::descendant(document.root_element(), "Body")
        .ok_or_else(|| ServiceError::parse("response has no SOAP body"))?;
    read(body)
}

/// Extracts a fault, preferring the most specific subcode.
pub(super) fn parse_fault(text: &str) -> Option<ServiceError> {
    let document = xml::parse(text).ok()?;
    let fault = xml::descendant(document.root_element(), "Fault")?;
    let code = xml::descendant(fault, "Code")
        .map(|code| {
            code.descendants()
                .filter(|node| node.has_tag_name("Value"))
                .last()
                .map(xml::text)
                .unwrap_or_default()
        })
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| "Fault".to_owned());
    let reason = xml::descendant(fault, "Reason")
        .and_then(|reason| xml::descendant_text(reason, "Text"))
        .filter(|reason| !reason.is_empty())
        .unwrap_or_else(|| "device returned a SOAP fault".to_owned());
    Some(ServiceError::Fault { code, reason })
}
