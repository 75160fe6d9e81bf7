//! Response envelope written back to clients.
//!
//! Every response is one JSON object: `{"id", "seq"?, "result"?, "error"?}`.
//! Absent keys are omitted rather than serialised as `null`.

use serde::Serialize;
use serde_json::Value;

use super::errors::DispatchError;
use super::request::Method;

/// A reply to one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Method name the response answers.
    pub id: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Successful reply carrying `result`.
    #[must_use]
    pub fn success(method: Method, seq: Option<Value>, result: Value) -> Self {
        Self {
            id: method.as_str(),
            seq,
            result: Some(result),
            error: None,
        }
    }

    /// Failed reply carrying the error's display text.
    #[must_use]
    pub fn failure(method: Method, seq: Option<Value>, error: &DispatchError) -> Self {
        Self {
            id: method.as_str(),
            seq,
            result: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether the reply carries an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Serialises the reply as compact JSON. Framing is left to the transport.
    ///
    /// # Errors
    ///
    /// Propagates serialisation failures, which only arise from non-string
    /// map keys inside `result`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_omits_error_key() {
        let response = Response::success(Method::PtzStop, Some(json!(4)), json!(true));
        let json = response.to_json().expect("serialise");
        assert_eq!(json, r#"{"id":"ptzStop","seq":4,"result":true}"#);
    }

    #[test]
    fn failure_without_seq_omits_seq_and_result() {
        let response = Response::failure(Method::Reboot, None, &DispatchError::Internal);
        let value = serde_json::to_value(&response).expect("serialise");
        assert_eq!(
            value,
            json!({"id": "reboot", "error": "Internal server error"})
        );
        assert!(response.is_error());
    }
}
