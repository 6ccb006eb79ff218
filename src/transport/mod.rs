//! Transport layer: the socket to the relay.
//!
//! - **Wire frames**: [`RoutingFrame`] and [`ReliabilityFrame`]
//! - **Socket owner**: [`Transport`], with generation-tagged [`TransportEvent`]s
//!   and PING/PONG keep-alive
//! - **WebSocket**: [`WebSocketConnector`] (requires the `websocket` feature)
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          SignalingClient                │
//! ├─────────────────────────────────────────┤
//! │            Reliability                  │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   routing frames, keep-alive            │
//! ├─────────────────────────────────────────┤
//! │          WebSocket (Connector)          │
//! └─────────────────────────────────────────┘
//! ```

mod connection;
mod frame;
#[cfg(feature = "websocket")]
mod websocket;

pub use connection::*;
pub use frame::*;
#[cfg(feature = "websocket")]
#[cfg_attr(docsrs, doc(cfg(feature = "websocket")))]
pub use websocket::WebSocketConnector;
