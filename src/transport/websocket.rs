//! [`Connector`] backed by tokio-tungstenite.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::core::{Connector, FrameSink, FrameStream, TransportError, WireFrame};

/// Opens WebSocket connections to the relay.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector.
    pub fn new() -> Self {
        Self
    }
}

fn to_wire_frame(item: Result<Message, WsError>) -> Result<WireFrame, TransportError> {
    match item {
        Ok(Message::Text(text)) => Ok(WireFrame::Text(text)),
        Ok(Message::Binary(data)) => Ok(WireFrame::Binary(data)),
        Ok(Message::Close(_)) => Ok(WireFrame::Close),
        Ok(_) => Ok(WireFrame::Control),
        Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(WireFrame::Close),
        Err(err) => Err(TransportError::WebSocket(err.to_string())),
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|err| TransportError::Connect(format!("websocket connect failed: {err}")))?;
        tracing::debug!(url, "relay websocket connected");

        let (write, read) = ws_stream.split();
        let sink = write
            .sink_map_err(|err| TransportError::WebSocket(err.to_string()))
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text))));
        let stream = read.map(to_wire_frame);
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
