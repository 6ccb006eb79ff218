//! Client API.
//!
//! - [`SignalingClient`]: handshake, socket lifecycle, reconnects, presence
//! - [`ClientMessageTransport`]: signed setup and WebRTC signaling over the client
//! - [`ConnectBackend`] / `HttpBackend`: the connect handshake

mod bootstrap;
#[allow(clippy::module_inception)]
mod client;
mod message_transport;
mod state;

pub use bootstrap::{ClientConnectResponse, ConnectBackend, map_error_response, parse_connect_response};
#[cfg(feature = "http")]
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
pub use bootstrap::HttpBackend;
pub use client::{ClientConfig, SignalingClient, SignalingClientBuilder, SignalingClientObserver};
pub use message_transport::{
    ClientMessageTransport, ClientMessageTransportOptions, MessageTransportObserver, MessageTransportPhase,
};
pub use state::{ChannelState, ConnectionState};
