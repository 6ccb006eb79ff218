//! Wire frames exchanged with the relay.
//!
//! Every WebSocket text frame is one JSON [`RoutingFrame`]. Data for the peer
//! travels inside it as a [`ReliabilityFrame`].
//!
//! ```text
//! {"type":"MESSAGE","channelId":"c1","message":{"type":"DATA","seq":0,"data":{..}}}
//! {"type":"ERROR","channelId":"c1","error":{"code":"CHANNEL_CLOSED","message":".."}}
//! {"type":"PEER_CONNECTED","channelId":"c1"}
//! {"type":"PING"}
//! ```

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::core::constants::MISSING_ERROR_MESSAGE;
use crate::core::{SignalingError, SignalingErrorCode, TransportError};

/// Discriminator of a [`RoutingFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingFrameType {
    /// Reliability traffic for a channel.
    Message,
    /// An error for a channel.
    Error,
    /// The remote peer joined the channel.
    PeerConnected,
    /// The remote peer left the channel.
    PeerOffline,
    /// Keep-alive request.
    Ping,
    /// Keep-alive reply.
    Pong,
    /// A type this client does not understand. Never sent.
    Unknown,
}

impl RoutingFrameType {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "MESSAGE",
            Self::Error => "ERROR",
            Self::PeerConnected => "PEER_CONNECTED",
            Self::PeerOffline => "PEER_OFFLINE",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::Unknown => "UNKNOWN",
        }
    }

    fn from_wire(s: &str) -> Self {
        match s {
            "MESSAGE" => Self::Message,
            "ERROR" => Self::Error,
            "PEER_CONNECTED" => Self::PeerConnected,
            "PEER_OFFLINE" => Self::PeerOffline,
            "PING" => Self::Ping,
            "PONG" => Self::Pong,
            _ => Self::Unknown,
        }
    }
}

impl Serialize for RoutingFrameType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RoutingFrameType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TypeVisitor;

        impl Visitor<'_> for TypeVisitor {
            type Value = RoutingFrameType;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a routing frame type string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(RoutingFrameType::from_wire(v))
            }
        }

        deserializer.deserialize_str(TypeVisitor)
    }
}

/// Error body of an `ERROR` routing frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingError {
    /// Error code string, e.g. `CHANNEL_CLOSED`.
    pub code: String,
    /// Optional detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&SignalingError> for RoutingError {
    fn from(err: &SignalingError) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: Some(err.message.clone()),
        }
    }
}

impl From<RoutingError> for SignalingError {
    fn from(err: RoutingError) -> Self {
        SignalingError::new(
            SignalingErrorCode::from_wire(&err.code),
            err.message.unwrap_or_else(|| MISSING_ERROR_MESSAGE.to_string()),
        )
    }
}

/// Kind of a [`ReliabilityFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReliabilityKind {
    /// Acknowledges a DATA frame.
    Ack,
    /// Carries an application payload.
    Data,
}

/// The reliability unit: a sequenced ACK or DATA frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityFrame {
    /// ACK or DATA.
    #[serde(rename = "type")]
    pub kind: ReliabilityKind,
    /// Sequence number. Only DATA frames consume numbers.
    pub seq: u64,
    /// The payload; absent on ACKs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ReliabilityFrame {
    /// A DATA frame.
    pub fn data(seq: u64, data: Value) -> Self {
        Self {
            kind: ReliabilityKind::Data,
            seq,
            data: Some(data),
        }
    }

    /// An ACK frame.
    pub fn ack(seq: u64) -> Self {
        Self {
            kind: ReliabilityKind::Ack,
            seq,
            data: None,
        }
    }
}

/// One frame on the relay socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingFrame {
    /// Frame type.
    #[serde(rename = "type")]
    pub frame_type: RoutingFrameType,
    /// Channel the frame belongs to. Absent on PING/PONG.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// Reliability payload of a MESSAGE frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ReliabilityFrame>,
    /// Whether the relay authorized the sender. Informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized: Option<bool>,
    /// Error body of an ERROR frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RoutingError>,
}

impl RoutingFrame {
    fn bare(frame_type: RoutingFrameType) -> Self {
        Self {
            frame_type,
            channel_id: None,
            message: None,
            authorized: None,
            error: None,
        }
    }

    /// A MESSAGE frame carrying reliability traffic.
    pub fn message(channel_id: &str, message: ReliabilityFrame) -> Self {
        Self {
            channel_id: Some(channel_id.to_string()),
            message: Some(message),
            ..Self::bare(RoutingFrameType::Message)
        }
    }

    /// An ERROR frame for a channel.
    pub fn error(channel_id: &str, error: &SignalingError) -> Self {
        Self {
            channel_id: Some(channel_id.to_string()),
            error: Some(error.into()),
            ..Self::bare(RoutingFrameType::Error)
        }
    }

    /// A keep-alive request.
    pub fn ping() -> Self {
        Self::bare(RoutingFrameType::Ping)
    }

    /// A keep-alive reply.
    pub fn pong() -> Self {
        Self::bare(RoutingFrameType::Pong)
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Encode(e.to_string()))
    }

    /// Decode a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_frame_wire_shape() {
        let frame = RoutingFrame::message("chan", ReliabilityFrame::data(3, json!({"foo": "test"})));
        let value: Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "MESSAGE",
                "channelId": "chan",
                "message": {"type": "DATA", "seq": 3, "data": {"foo": "test"}}
            })
        );
    }

    #[test]
    fn test_ping_has_no_channel() {
        let value: Value = serde_json::from_str(&RoutingFrame::ping().encode().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "PING"}));
    }

    #[test]
    fn test_ack_omits_data() {
        let value = serde_json::to_value(ReliabilityFrame::ack(7)).unwrap();
        assert_eq!(value, json!({"type": "ACK", "seq": 7}));
    }

    #[test]
    fn test_error_frame_carries_code() {
        let err = SignalingError::new(SignalingErrorCode::ChannelClosed, "bye");
        let value = serde_json::to_value(RoutingFrame::error("c", &err)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "ERROR",
                "channelId": "c",
                "error": {"code": "CHANNEL_CLOSED", "message": "bye"}
            })
        );
    }

    #[test]
    fn test_decode_unknown_type_and_fields() {
        let frame = RoutingFrame::decode(r#"{"type":"SHINY_NEW","channelId":"c","extra":[1,2]}"#).unwrap();
        assert_eq!(frame.frame_type, RoutingFrameType::Unknown);
        assert_eq!(frame.channel_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_routing_error_without_message() {
        let frame = RoutingFrame::decode(r#"{"type":"ERROR","channelId":"c","error":{"code":"ACCESS_DENIED"}}"#).unwrap();
        let err: SignalingError = frame.error.unwrap().into();
        assert_eq!(err.code, SignalingErrorCode::AccessDenied);
        assert_eq!(err.message, MISSING_ERROR_MESSAGE);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(RoutingFrame::decode("not json").is_err());
        assert!(RoutingFrame::decode(r#"{"channelId":"c"}"#).is_err());
    }
}
