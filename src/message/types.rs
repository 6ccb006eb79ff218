//! Payload types carried by signaling messages.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// An ICE server handed out in a setup response.
///
/// TURN servers carry `username` and `credential`; STUN servers carry neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingIceServer {
    /// Server URLs. TURN credentials apply to all of them.
    pub urls: Vec<String>,
    /// TURN credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// TURN username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl SignalingIceServer {
    /// A STUN server.
    pub fn stun(urls: Vec<String>) -> Self {
        Self {
            urls,
            credential: None,
            username: None,
        }
    }

    /// Parse leniently: non-string URLs are skipped, a missing URL list
    /// rejects the entry.
    fn from_value(value: &Value) -> Option<Self> {
        let urls = value
            .get("urls")?
            .as_array()?
            .iter()
            .filter_map(|url| url.as_str().map(str::to_string))
            .collect();
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            urls,
            credential: text("credential"),
            username: text("username"),
        })
    }
}

/// Deserialize an ICE server list, dropping entries that do not parse.
pub(crate) fn lenient_ice_servers<'de, D>(deserializer: D) -> Result<Vec<SignalingIceServer>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw.iter().filter_map(SignalingIceServer::from_value).collect())
}

/// A session description (offer or answer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingDescription {
    /// `offer`, `answer`, `pranswer` or `rollback`.
    #[serde(rename = "type")]
    pub description_type: String,
    /// The SDP body.
    pub sdp: String,
}

impl SignalingDescription {
    /// Create a description.
    pub fn new(description_type: impl Into<String>, sdp: impl Into<String>) -> Self {
        Self {
            description_type: description_type.into(),
            sdp: sdp.into(),
        }
    }
}

/// An ICE candidate. Absent optional fields are omitted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingCandidate {
    /// The candidate line.
    pub candidate: String,
    /// Media stream identification tag.
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Index of the media description.
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u32>,
    /// ICE username fragment.
    #[serde(rename = "usernameFragment", default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl SignalingCandidate {
    /// A candidate with no optional fields.
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }

    /// Set the media stream identification tag.
    pub fn with_sdp_mid(mut self, sdp_mid: impl Into<String>) -> Self {
        self.sdp_mid = Some(sdp_mid.into());
        self
    }

    /// Set the media description index.
    pub fn with_sdp_m_line_index(mut self, index: u32) -> Self {
        self.sdp_m_line_index = Some(index);
        self
    }

    /// Set the username fragment.
    pub fn with_username_fragment(mut self, ufrag: impl Into<String>) -> Self {
        self.username_fragment = Some(ufrag.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_omits_absent_fields() {
        let value = serde_json::to_value(SignalingCandidate::new("candidate:1")).unwrap();
        assert_eq!(value, json!({"candidate": "candidate:1"}));

        let full = SignalingCandidate::new("candidate:1")
            .with_sdp_mid("0")
            .with_sdp_m_line_index(0)
            .with_username_fragment("uf");
        assert_eq!(
            serde_json::to_value(full).unwrap(),
            json!({"candidate": "candidate:1", "sdpMid": "0", "sdpMLineIndex": 0, "usernameFragment": "uf"})
        );
    }

    #[test]
    fn test_ice_server_lenient_parse() {
        let server = SignalingIceServer::from_value(&json!({
            "urls": ["turn:a", 5, "turn:b"],
            "username": "u",
            "credential": "c",
            "extra": true
        }))
        .unwrap();
        assert_eq!(server.urls, vec!["turn:a", "turn:b"]);
        assert_eq!(server.username.as_deref(), Some("u"));

        assert!(SignalingIceServer::from_value(&json!({"url": "stun:x"})).is_none());
    }
}
