//! Core traits for the signaling engine.
//!
//! The socket to the relay is reached through [`Connector`] so that the
//! engine does not depend on one WebSocket implementation.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

use super::error::TransportError;

/// An inbound frame as delivered by the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame; decoded as UTF-8 JSON when possible.
    Binary(Vec<u8>),
    /// The remote side closed the socket.
    Close,
    /// Socket-level control traffic (e.g. WebSocket ping/pong), ignored.
    Control,
}

/// Outbound half of a socket. Accepts encoded JSON text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of a socket.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<WireFrame, TransportError>> + Send>>;

/// Opens duplex connections to the relay.
///
/// # Example
///
/// ```ignore
/// struct Loopback;
///
/// #[async_trait]
/// impl Connector for Loopback {
///     async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
///         let (tx, rx) = futures::channel::mpsc::unbounded::<String>();
///         let sink = tx.sink_map_err(|_| TransportError::Closed);
///         let stream = rx.map(|text| Ok(WireFrame::Text(text)));
///         Ok((Box::pin(sink), Box::pin(stream)))
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection to `url`.
    ///
    /// Returning `Ok` means the socket is open and ready for frames.
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}
