//! Real-time client error types.

use crate::message::{describe_errors, GraphQlError};
use rtsub_core::{AuthError, EndpointError};
use std::time::Duration;
use thiserror::Error;

/// Frame encoding/decoding failure.
///
/// Non-fatal on the receive path: the frame is logged and dropped, unless it
/// is a handshake frame received while handshaking.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed frame (type={message_type:?}): {source}")]
    Malformed {
        message_type: Option<String>,
        #[source]
        source: serde_json::Error,
    },

    #[error("Encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CodecError {
    /// The frame's `type` field, if it could be read.
    pub fn message_type(&self) -> Option<&str> {
        match self {
            Self::Malformed { message_type, .. } => message_type.as_deref(),
            Self::Encode(_) => None,
        }
    }

    /// Whether the failed frame belongs to the connection handshake.
    pub fn is_handshake_critical(&self) -> bool {
        matches!(
            self.message_type(),
            Some("connection_ack" | "connection_error")
        )
    }
}

/// Handshake failures. Retried with backoff; repeated identical rejections are fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection init rejected: {0}")]
    Rejected(String),

    #[error("Malformed handshake frame: {0}")]
    Malformed(String),

    #[error("Transport open failed: {0}")]
    TransportOpen(String),
}

/// Loss of an established connection. Recovered transparently by reconnecting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Transport closed: code={code}, reason={reason}")]
    TransportClosed { code: u16, reason: String },

    #[error("Keep-alive timeout after {0:?} of silence")]
    KeepAliveTimeout(Duration),

    #[error("Connection-level server error: {0}")]
    Server(String),
}

/// Error delivered to a single subscription's sink.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubscriptionError {
    /// Server-reported error on an active subscription. Not terminal.
    #[error("Server error: {}", describe_errors(.0))]
    Server(Vec<GraphQlError>),

    #[error("Subscription rejected: {}", describe_errors(.0))]
    StartRejected(Vec<GraphQlError>),

    #[error("Start acknowledgment timed out after {0:?}")]
    StartTimeout(Duration),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Fatal connection failure: {0}")]
    Fatal(String),

    /// The subscriber stopped keeping up and its event queue filled.
    #[error("Subscriber fell behind, event queue full")]
    Overflow,
}

impl SubscriptionError {
    /// Terminal errors end the subscription; no further events follow.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Server(_))
    }
}

/// Errors surfaced to callers of the client facade.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_critical_codec_errors() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let ack = CodecError::Malformed {
            message_type: Some("connection_ack".to_string()),
            source,
        };
        assert!(ack.is_handshake_critical());

        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let data = CodecError::Malformed {
            message_type: Some("data".to_string()),
            source,
        };
        assert!(!data.is_handshake_critical());
    }

    #[test]
    fn test_subscription_error_terminality() {
        assert!(!SubscriptionError::Server(Vec::new()).is_terminal());
        assert!(SubscriptionError::StartRejected(Vec::new()).is_terminal());
        assert!(SubscriptionError::Fatal("auth".to_string()).is_terminal());
    }
}
