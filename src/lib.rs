//! # Relay Signaling
//!
//! Client-side signaling engine for WebRTC: exchanges session descriptions
//! and ICE candidates with one remote device through a relay service, so the
//! two peers can negotiate a direct connection. It provides:
//!
//! - **Lifecycle**: connect handshake, socket keep-alive, exponential-backoff reconnects
//! - **Reliability**: sequenced, acknowledged, deduplicated delivery across reconnects
//! - **Authentication**: nonce-bound signed envelopes (HS256 JWT or unsigned)
//! - **Catalog**: typed signaling messages with forward-compatible decoding
//!
//! ## Feature Flags
//!
//! - `websocket` (default): tokio-tungstenite [`transport::WebSocketConnector`]
//! - `http` (default): reqwest `HttpBackend` for the connect handshake
//! - `jwt` (default): jsonwebtoken `JwtMessageSigner`
//!
//! ## Modules
//!
//! - [`core`]: constants, errors, the socket seam, observer registry
//! - [`transport`]: wire frames and the relay socket
//! - [`reliability`]: the ACK/DATA layer
//! - [`crypto`]: message signing and verification
//! - [`message`]: the signaling message catalog
//! - [`client`]: [`SignalingClient`] and [`ClientMessageTransport`]
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use relay_signaling::prelude::*;
//!
//! struct Printer;
//!
//! impl MessageTransportObserver for Printer {
//!     fn on_setup_done(&self, ice_servers: &[SignalingIceServer]) {
//!         println!("setup done, {} ICE servers", ice_servers.len());
//!     }
//!
//!     fn on_webrtc_signaling_message(&self, message: &WebrtcSignalingMessage) {
//!         println!("from device: {message:?}");
//!     }
//! }
//!
//! # async fn run() -> Result<(), ClientError> {
//! let client = SignalingClient::builder("pr-abcdefgh", "de-ijklmnop").build()?;
//! let transport = ClientMessageTransport::new(
//!     client.clone(),
//!     ClientMessageTransportOptions::SharedSecret {
//!         shared_secret: "MySecret".into(),
//!         key_id: Some("default".into()),
//!     },
//! )?;
//! let _sub = transport.subscribe(Arc::new(Printer));
//!
//! client.start().await?;
//! transport.start()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod core;
pub mod crypto;
pub mod message;
pub mod reliability;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::*;
    pub use crate::core::{
        ClientError, Connector, FrameSink, FrameStream, HttpError, SignalingError, SignalingErrorCode,
        Subscription, TransportError, WireFrame,
    };
    pub use crate::crypto::{MessageSigner, NoneMessageSigner};
    #[cfg(feature = "jwt")]
    pub use crate::crypto::JwtMessageSigner;
    pub use crate::message::*;
}

pub use client::{
    ChannelState, ClientMessageTransport, ClientMessageTransportOptions, ConnectionState, SignalingClient,
    SignalingClientBuilder, SignalingClientObserver,
};
pub use crate::core::{ClientError, SignalingError, SignalingErrorCode};
