//! Message catalog: typed signaling payloads and their JSON shapes.
//!
//! ```text
//! {"type":"SETUP_REQUEST"}
//! {"type":"SETUP_RESPONSE","iceServers":[{"urls":[..],"credential":..,"username":..}]}
//! {"type":"DESCRIPTION","description":{"type":"offer","sdp":".."}}
//! {"type":"CANDIDATE","candidate":{"candidate":"..","sdpMid":"0"}}
//! ```

mod catalog;
mod types;

pub use catalog::{SignalingMessage, WebrtcSignalingMessage};
pub use types::{SignalingCandidate, SignalingDescription, SignalingIceServer};
