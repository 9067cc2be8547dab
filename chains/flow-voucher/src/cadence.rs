//! JSON-Cadence encoding helpers
//!
//! The access REST API carries script arguments, script results and event
//! payloads as base64-encoded JSON-Cadence values
//! (`{"type": "...", "value": ...}`).

use crate::error::ClientError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;

/// Address without its `0x` prefix, as the REST paths expect it.
pub fn strip_0x(address: &str) -> &str {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address)
}

/// Address with a `0x` prefix, as Cadence values and imports expect it.
pub fn with_0x(address: &str) -> String {
    format!("0x{}", strip_0x(address))
}

pub fn string(value: &str) -> Value {
    json!({ "type": "String", "value": value })
}

pub fn address(value: &str) -> Value {
    json!({ "type": "Address", "value": with_0x(value) })
}

pub fn int(value: u32) -> Value {
    json!({ "type": "Int", "value": value.to_string() })
}

pub fn array(values: Vec<Value>) -> Value {
    json!({ "type": "Array", "value": values })
}

/// Base64 of the JSON text of `value`.
pub fn encode(value: &Value) -> String {
    STANDARD.encode(value.to_string())
}

/// Decode a base64 JSON-Cadence document.
pub fn decode(encoded: &str) -> Result<Value, ClientError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ClientError::decode("JSON-Cadence payload", e))?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::decode("JSON-Cadence payload", e))
}

pub fn as_bool(value: &Value) -> Result<bool, ClientError> {
    match (value["type"].as_str(), value["value"].as_bool()) {
        (Some("Bool"), Some(b)) => Ok(b),
        _ => Err(ClientError::decode("Bool result", value)),
    }
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    value: EventBody,
}

#[derive(Debug, Deserialize)]
struct EventBody {
    fields: Vec<EventField>,
}

#[derive(Debug, Deserialize)]
struct EventField {
    name: String,
    value: Value,
}

/// Named fields of a decoded event payload.
#[derive(Debug)]
pub struct EventFields {
    fields: HashMap<String, Value>,
}

impl EventFields {
    pub fn decode(encoded_payload: &str) -> Result<Self, ClientError> {
        let payload: EventPayload = serde_json::from_value(decode(encoded_payload)?)
            .map_err(|e| ClientError::decode("event payload", e))?;
        Ok(Self {
            fields: payload
                .value
                .fields
                .into_iter()
                .map(|f| (f.name, f.value))
                .collect(),
        })
    }

    fn get(&self, name: &str) -> Result<&Value, ClientError> {
        self.fields
            .get(name)
            .ok_or_else(|| ClientError::decode("event payload", format!("missing field '{}'", name)))
    }

    /// Unsigned integer field. JSON-Cadence carries these as strings.
    pub fn u64(&self, name: &str) -> Result<u64, ClientError> {
        let value = self.get(name)?;
        value["value"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ClientError::decode(format!("field '{}'", name), value))
    }

    pub fn string(&self, name: &str) -> Result<String, ClientError> {
        let value = self.get(name)?;
        value["value"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::decode(format!("field '{}'", name), value))
    }

    /// `Address?` field; `None` for a nil optional.
    pub fn optional_address(&self, name: &str) -> Result<Option<String>, ClientError> {
        let value = self.get(name)?;
        let inner = if value["type"] == "Optional" {
            &value["value"]
        } else {
            value
        };
        if inner.is_null() {
            return Ok(None);
        }
        inner["value"]
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| ClientError::decode(format!("field '{}'", name), value))
    }
}
