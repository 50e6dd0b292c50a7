//! Standard `{code, message, data}` response envelope.
//!
//! Every pipeline response is normalized into this shape: enveloped bodies
//! pass through verbatim, plain JSON bodies are wrapped with `code: 200`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Envelope code signalling success.
pub const SUCCESS_CODE: i64 = 200;

/// Normalized API response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub code: i64,
    pub message: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiEnvelope {
    /// Wrap already-unwrapped data in a success envelope.
    pub fn success(data: Value) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: String::from("success"),
            data,
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub const fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Deserialize the `data` payload into a concrete type.
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    /// Parse a raw response body into an envelope.
    ///
    /// A JSON object carrying a numeric `code` field is treated as an
    /// envelope: `message` falls back to `msg`, `data` defaults to null.
    /// Any other JSON value is wrapped as a success envelope.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        Ok(Self::from_value(value))
    }

    fn from_value(value: Value) -> Self {
        let Value::Object(mut object) = value else {
            return Self::success(value);
        };

        let Some(code) = object.get("code").and_then(Value::as_i64) else {
            return Self::success(Value::Object(object));
        };

        let message = object
            .get("message")
            .or_else(|| object.get("msg"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let timestamp = object
            .get("timestamp")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let request_id = object
            .get("request_id")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let data = object.remove("data").unwrap_or(Value::Null);

        Self {
            code,
            message,
            data,
            timestamp,
            request_id,
        }
    }
}

/// Extract the server-supplied message from an error response body, if any.
pub fn server_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;
    object
        .get("message")
        .or_else(|| object.get("msg"))
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(ToString::to_string)
}

/// Extract the server-supplied business code from an error response body.
pub fn server_code(body: &[u8]) -> Option<i64> {
    serde_json::from_slice::<Value>(body)
        .ok()?
        .get("code")
        .and_then(Value::as_i64)
}
