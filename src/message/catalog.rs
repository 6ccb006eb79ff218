//! The signaling message catalog.
//!
//! Messages are JSON objects tagged by `type`. Decoding never fails hard:
//! an unknown or missing tag, or a known tag with missing required fields,
//! yields `None`, and unknown extra fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{SignalingCandidate, SignalingDescription, SignalingIceServer, lenient_ice_servers};

/// A decoded signaling message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalingMessage {
    /// Client asks the device to set up a session.
    SetupRequest,
    /// Device answers with the ICE servers to use.
    SetupResponse {
        /// ICE servers, possibly empty.
        #[serde(rename = "iceServers", deserialize_with = "lenient_ice_servers")]
        ice_servers: Vec<SignalingIceServer>,
    },
    /// An offer or answer.
    Description {
        /// The description.
        description: SignalingDescription,
    },
    /// An ICE candidate.
    Candidate {
        /// The candidate.
        candidate: SignalingCandidate,
    },
}

impl SignalingMessage {
    /// Decode from a JSON value. `None` for anything not in the catalog.
    pub fn decode(value: &Value) -> Option<Self> {
        value.get("type")?.as_str()?;
        Self::deserialize(value).ok()
    }

    /// Decode from JSON text.
    pub fn decode_str(text: &str) -> Option<Self> {
        serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|value| Self::decode(&value))
    }

    /// Encode as a JSON value.
    pub fn encode(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The messages exchanged once setup is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebrtcSignalingMessage {
    /// An offer or answer.
    Description(SignalingDescription),
    /// An ICE candidate.
    Candidate(SignalingCandidate),
}

impl From<SignalingDescription> for WebrtcSignalingMessage {
    fn from(description: SignalingDescription) -> Self {
        Self::Description(description)
    }
}

impl From<SignalingCandidate> for WebrtcSignalingMessage {
    fn from(candidate: SignalingCandidate) -> Self {
        Self::Candidate(candidate)
    }
}

impl From<WebrtcSignalingMessage> for SignalingMessage {
    fn from(msg: WebrtcSignalingMessage) -> Self {
        match msg {
            WebrtcSignalingMessage::Description(description) => Self::Description { description },
            WebrtcSignalingMessage::Candidate(candidate) => Self::Candidate { candidate },
        }
    }
}

impl TryFrom<SignalingMessage> for WebrtcSignalingMessage {
    type Error = SignalingMessage;

    fn try_from(msg: SignalingMessage) -> Result<Self, Self::Error> {
        match msg {
            SignalingMessage::Description { description } => Ok(Self::Description(description)),
            SignalingMessage::Candidate { candidate } => Ok(Self::Candidate(candidate)),
            other => Err(other),
        }
    }
}
