//! Error types for the signaling engine.

use std::fmt;

use thiserror::Error;

/// Error codes carried by a [`SignalingError`].
///
/// Codes this crate does not know are kept verbatim in [`SignalingErrorCode::Unknown`]
/// so that newer relays and peers can extend the set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignalingErrorCode {
    /// A message could not be decoded.
    DecodeError,
    /// A message failed signature, sequence, or nonce verification.
    VerificationError,
    /// The channel was closed by one of the peers.
    ChannelClosed,
    /// The relay does not know the channel.
    ChannelNotFound,
    /// The relay has no capacity for more channels.
    NoMoreChannels,
    /// The peer or relay refused access.
    AccessDenied,
    /// The remote side hit an internal error.
    InternalError,
    /// Any code not covered above.
    Unknown(String),
}

impl SignalingErrorCode {
    /// Wire representation of the code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::DecodeError => "DECODE_ERROR",
            Self::VerificationError => "VERIFICATION_ERROR",
            Self::ChannelClosed => "CHANNEL_CLOSED",
            Self::ChannelNotFound => "CHANNEL_NOT_FOUND",
            Self::NoMoreChannels => "NO_MORE_CHANNELS",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Unknown(code) => code,
        }
    }

    /// Parse a wire code. Never fails.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "DECODE_ERROR" => Self::DecodeError,
            "VERIFICATION_ERROR" => Self::VerificationError,
            "CHANNEL_CLOSED" => Self::ChannelClosed,
            "CHANNEL_NOT_FOUND" => Self::ChannelNotFound,
            "NO_MORE_CHANNELS" => Self::NoMoreChannels,
            "ACCESS_DENIED" => Self::AccessDenied,
            "INTERNAL_ERROR" => Self::InternalError,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for SignalingErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol error sent to, or received from, the remote peer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct SignalingError {
    /// The error code.
    pub code: SignalingErrorCode,
    /// Human readable detail.
    pub message: String,
}

impl SignalingError {
    /// Create a new signaling error.
    pub fn new(code: SignalingErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for a `DECODE_ERROR`.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(SignalingErrorCode::DecodeError, message)
    }

    /// Shorthand for a `VERIFICATION_ERROR`.
    pub fn verification(message: impl Into<String>) -> Self {
        Self::new(SignalingErrorCode::VerificationError, message)
    }
}

/// Errors from the HTTP connect handshake.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The product ID is not known to the service.
    #[error("product not found ({status}): {message}")]
    ProductIdNotFound {
        /// HTTP status code.
        status: u16,
        /// Message from the service.
        message: String,
    },

    /// The device ID is not known to the service.
    #[error("device not found ({status}): {message}")]
    DeviceIdNotFound {
        /// HTTP status code.
        status: u16,
        /// Message from the service.
        message: String,
    },

    /// Any other failure, including transport errors where no status exists.
    #[error("http request failed (status {status:?}): {message}")]
    Unknown {
        /// HTTP status code, if a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },
}

/// Errors in the transport layer.
///
/// These never reach observers directly; the transport turns them into a
/// single closure event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Opening the socket failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The socket reported an error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The socket is closed.
    #[error("socket closed")]
    Closed,

    /// A frame could not be encoded.
    #[error("frame encode failed: {0}")]
    Encode(String),
}

/// Errors reported by the signaling client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The client was used incorrectly, e.g. started twice.
    #[error("connect error: {0}")]
    Connect(String),

    /// The session failed at runtime, e.g. the socket never opened.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The device was required to be online but is not.
    #[error("the requested device is offline, but require_online was set")]
    DeviceOffline,

    /// The connect handshake failed.
    #[error("handshake failed: {0}")]
    Http(#[from] HttpError),

    /// The relay or the peer reported a protocol error.
    #[error("signaling error: {0}")]
    Signaling(#[from] SignalingError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
