//! JSON-RPC request, response and notification envelopes.
//!
//! The hub does not own the protocol. It only needs to encode outgoing
//! requests and notifications and to classify inbound messages: a message
//! carrying an `id` and no `method` is a response, a message carrying a
//! `method` and no `id` is a notification.

use super::{HubDomainError, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

/// JSON-RPC protocol version string carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Error code returned for server-initiated requests the hub cannot serve.
pub const METHOD_NOT_FOUND: i64 = -32_601;

fn normalize_method(method: impl Into<String>) -> Result<String, HubDomainError> {
    let normalized = method.into().trim().to_owned();
    if normalized.is_empty() {
        return Err(HubDomainError::EmptyMethod);
    }
    Ok(normalized)
}

/// Outgoing request without its correlation identifier.
///
/// The dispatch engine assigns the identifier when the request is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    method: String,
    params: Option<Value>,
}

impl Request {
    /// Creates a request without parameters.
    ///
    /// # Errors
    ///
    /// Returns [`HubDomainError::EmptyMethod`] when `method` is blank.
    pub fn new(method: impl Into<String>) -> Result<Self, HubDomainError> {
        Ok(Self {
            method: normalize_method(method)?,
            params: None,
        })
    }

    /// Attaches request parameters.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request parameters.
    #[must_use]
    pub const fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    /// Encodes the request with its correlation identifier.
    #[must_use]
    pub fn encode(&self, id: RequestId) -> String {
        let mut envelope = json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id.value(),
            "method": self.method,
        });
        if let (Some(params), Some(object)) = (&self.params, envelope.as_object_mut()) {
            object.insert("params".to_owned(), params.clone());
        }
        envelope.to_string()
    }
}

/// Un-correlated message identified only by its method name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    method: String,
    params: Option<Value>,
}

impl Notification {
    /// Creates a notification without parameters.
    ///
    /// # Errors
    ///
    /// Returns [`HubDomainError::EmptyMethod`] when `method` is blank.
    pub fn new(method: impl Into<String>) -> Result<Self, HubDomainError> {
        Ok(Self {
            method: normalize_method(method)?,
            params: None,
        })
    }

    /// Attaches notification parameters.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the notification parameters.
    #[must_use]
    pub const fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    /// Encodes the notification.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut envelope = json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": self.method,
        });
        if let (Some(params), Some(object)) = (&self.params, envelope.as_object_mut()) {
            object.insert("params".to_owned(), params.clone());
        }
        envelope.to_string()
    }
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured error details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Creates an error object without details.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Builds the `method not found` error for an unsupported method.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("method not found: {method}"))
    }

    /// Encodes an error response echoing the peer's raw identifier.
    #[must_use]
    pub fn encode_response(&self, id: &Value) -> String {
        json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "error": self,
        })
        .to_string()
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} (code {})", self.message, self.code)
    }
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Reply to a request this side sent.
    Response {
        /// Correlation identifier echoed by the peer.
        id: RequestId,
        /// Result value or error object.
        outcome: Result<Value, RpcError>,
    },
    /// Un-correlated notification.
    Notification(Notification),
    /// Request initiated by the peer.
    Request {
        /// Raw identifier, echoed verbatim in the reply.
        id: Value,
        /// Requested method.
        method: String,
        /// Request parameters.
        params: Option<Value>,
    },
}

/// Errors returned while classifying an inbound message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The message is not a JSON object of the expected shape.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// The message carries neither an `id` nor a `method`.
    #[error("envelope has neither id nor method")]
    Unclassifiable,

    /// The response identifier is not one this side could have issued.
    #[error("unsupported response id: {0}")]
    UnsupportedId(String),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

fn parse_request_id(raw: &Value) -> Result<RequestId, EnvelopeError> {
    let parsed = match raw {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .map(RequestId::new)
        .ok_or_else(|| EnvelopeError::UnsupportedId(raw.to_string()))
}

impl InboundMessage {
    /// Classifies a raw inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] when the message cannot be decoded or
    /// classified.
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        let envelope: RawEnvelope =
            serde_json::from_str(raw).map_err(|err| EnvelopeError::Malformed(err.to_string()))?;

        match (envelope.id, envelope.method) {
            (Some(id), Some(method)) => Ok(Self::Request {
                id,
                method,
                params: envelope.params,
            }),
            (None, Some(method)) => {
                let notification = Notification {
                    method,
                    params: envelope.params,
                };
                Ok(Self::Notification(notification))
            }
            (Some(id), None) => {
                let request_id = parse_request_id(&id)?;
                let outcome = match envelope.error {
                    Some(error) => Err(error),
                    None => Ok(envelope.result.unwrap_or(Value::Null)),
                };
                Ok(Self::Response {
                    id: request_id,
                    outcome,
                })
            }
            (None, None) => Err(EnvelopeError::Unclassifiable),
        }
    }
}
