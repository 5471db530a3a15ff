//! Protocol envelope and codec.
//!
//! Every frame is a JSON object with a `type` discriminator:
//!
//! | type | direction | fields |
//! |---|---|---|
//! | `connection_init` | client → server | auth payload |
//! | `connection_ack` | server → client | `connectionTimeoutMs` |
//! | `connection_error` | server → client | errors |
//! | `start` | client → server | `id`, query, auth |
//! | `start_ack` | server → client | `id` |
//! | `data` | server → client | `id`, event payload |
//! | `error` | server → client | optional `id`, errors |
//! | `stop` | client → server | `id` |
//! | `complete` | server → client | `id` |
//! | `ka` | server → client | none |

use crate::error::CodecError;
use rtsub_core::AuthPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

// ============================================================================
// Envelope
// ============================================================================

/// Protocol message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<AuthPayload>,
    },
    ConnectionAck {
        #[serde(default)]
        payload: ConnectionAckPayload,
    },
    ConnectionError {
        #[serde(default)]
        payload: ErrorPayload,
    },
    Start {
        id: String,
        payload: StartPayload,
    },
    StartAck {
        id: String,
    },
    Data {
        id: String,
        #[serde(default)]
        payload: Value,
    },
    Error {
        /// Absent for connection-level errors.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        payload: ErrorPayload,
    },
    Stop {
        id: String,
    },
    Complete {
        id: String,
    },
    #[serde(rename = "ka")]
    KeepAlive {},
}

impl ProtocolMessage {
    /// Build a `connection_init` frame.
    pub fn connection_init(auth: AuthPayload) -> Self {
        Self::ConnectionInit {
            payload: Some(auth),
        }
    }

    /// Build a `start` frame.
    pub fn start(
        id: impl Into<String>,
        request: &SubscriptionRequest,
        auth: &AuthPayload,
    ) -> Result<Self, CodecError> {
        Ok(Self::Start {
            id: id.into(),
            payload: StartPayload::new(request, auth)?,
        })
    }

    /// Build a `stop` frame.
    pub fn stop(id: impl Into<String>) -> Self {
        Self::Stop { id: id.into() }
    }

    /// Subscription identifier, if the message carries one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Start { id, .. }
            | Self::StartAck { id }
            | Self::Data { id, .. }
            | Self::Stop { id }
            | Self::Complete { id } => Some(id),
            Self::Error { id, .. } => id.as_deref(),
            Self::ConnectionInit { .. }
            | Self::ConnectionAck { .. }
            | Self::ConnectionError { .. }
            | Self::KeepAlive {} => None,
        }
    }

    /// Wire name of the message type.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::ConnectionInit { .. } => "connection_init",
            Self::ConnectionAck { .. } => "connection_ack",
            Self::ConnectionError { .. } => "connection_error",
            Self::Start { .. } => "start",
            Self::StartAck { .. } => "start_ack",
            Self::Data { .. } => "data",
            Self::Error { .. } => "error",
            Self::Stop { .. } => "stop",
            Self::Complete { .. } => "complete",
            Self::KeepAlive {} => "ka",
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// `connection_ack` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAckPayload {
    /// Keep-alive interval negotiated by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_timeout_ms: Option<u64>,
}

impl ConnectionAckPayload {
    pub fn keep_alive_interval(&self) -> Option<Duration> {
        self.connection_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Error entry as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `error` / `connection_error` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

impl ErrorPayload {
    /// Single-line summary, stable across identical rejections.
    pub fn summary(&self) -> String {
        describe_errors(&self.errors)
    }
}

/// Join error entries into one line.
pub fn describe_errors(errors: &[GraphQlError]) -> String {
    if errors.is_empty() {
        return "no details".to_string();
    }
    errors
        .iter()
        .map(|e| {
            let kind = e.error_type.as_deref().unwrap_or("Error");
            match (&e.message, e.error_code) {
                (Some(message), _) => format!("{kind}: {message}"),
                (None, Some(code)) => format!("{kind} ({code})"),
                (None, None) => kind.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Opaque GraphQL subscription request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl SubscriptionRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: None,
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// `start` payload: the request serialized as a JSON string plus authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartPayload {
    pub data: String,
    pub extensions: StartExtensions,
}

impl StartPayload {
    pub fn new(request: &SubscriptionRequest, auth: &AuthPayload) -> Result<Self, CodecError> {
        Ok(Self {
            data: serde_json::to_string(request).map_err(CodecError::Encode)?,
            extensions: StartExtensions {
                authorization: auth.clone(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartExtensions {
    pub authorization: AuthPayload,
}

// ============================================================================
// Codec
// ============================================================================

/// Serialize a message to a text frame.
pub fn encode(message: &ProtocolMessage) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(CodecError::Encode)
}

/// Parse a text frame.
pub fn decode(text: &str) -> Result<ProtocolMessage, CodecError> {
    serde_json::from_str(text).map_err(|source| CodecError::Malformed {
        message_type: peek_type(text),
        source,
    })
}

/// Best-effort read of the `type` field of an undecodable frame.
fn peek_type(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    value.get("type")?.as_str().map(str::to_string)
}
