// Hub wire types
//
// Only the fields the client relies on are typed; everything else the hub
// sends is kept in a flattened `extra` map so nothing is silently dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A hub-managed device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device identity. The hub serializes it as `_id`.
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    /// Device class, e.g. `"mx.makerlab.ledservice"`.
    pub class: String,

    /// All remaining hub-defined fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Device {
    /// Human-friendly name if the hub provides one.
    pub fn name(&self) -> Option<&str> {
        self.extra.get("name").and_then(Value::as_str)
    }
}

/// Query for the device directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceQuery {
    pub class: String,
}

impl DeviceQuery {
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
        }
    }
}

/// Observable state of a named service on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceState {
    #[serde(rename = "isOn")]
    pub is_on: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceState {
    pub fn new(is_on: bool) -> Self {
        Self {
            is_on,
            extra: Map::new(),
        }
    }
}

/// Partial state sent on a service write. Absent fields are left
/// untouched by the hub.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServicePatch {
    #[serde(rename = "isOn", skip_serializing_if = "Option::is_none")]
    pub is_on: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServicePatch {
    /// Patch that only sets the on/off flag.
    pub fn is_on(value: bool) -> Self {
        Self {
            is_on: Some(value),
            extra: Map::new(),
        }
    }
}

/// Login request body.
#[derive(Debug, Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub user: &'a str,
    pub password: &'a str,
}

/// Login response body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
