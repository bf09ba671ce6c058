//! Capability sets exchanged during the connection handshake.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Capability set a client offers to the remote side at connect time.
///
/// Capabilities are kept as an open JSON object so new protocol
/// capabilities can be offered without changing this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientCapabilities(Map<String, Value>);

impl ClientCapabilities {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a capability entry.
    #[must_use]
    pub fn with_capability(mut self, name: impl Into<String>, settings: Value) -> Self {
        self.0.insert(name.into(), settings);
        self
    }

    /// Returns whether a capability is offered.
    #[must_use]
    pub fn offers(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the capability set as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Capability set announced by the remote side after a successful handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerCapabilities(Map<String, Value>);

impl ServerCapabilities {
    /// Returns whether the remote side announced a capability.
    #[must_use]
    pub fn supports(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the settings attached to a capability.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns the announced capability names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Name and version of one side of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationInfo {
    /// Implementation name.
    pub name: String,
    /// Implementation version.
    pub version: String,
}

impl ImplementationInfo {
    /// Creates implementation info.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Result of a successful `initialize` handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version selected by the remote side.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Capabilities announced by the remote side.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Remote implementation details.
    #[serde(default)]
    pub server_info: Option<ImplementationInfo>,
    /// Free-text guidance returned by the remote side.
    #[serde(default)]
    pub instructions: Option<String>,
}
