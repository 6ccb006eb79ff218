//! The relay socket owner.
//!
//! [`Transport`] keeps at most one live socket. Each call to
//! [`Transport::connect`] starts a new connection generation; every event the
//! socket produces is tagged with it, so the owner can ignore stragglers from
//! a socket it already replaced.
//!
//! Per socket there are two tasks: a reader that decodes and routes inbound
//! frames, and a writer that drains the outbound queue into the sink. Closing
//! the transport drops the queue sender, which lets the writer flush what was
//! already queued and then close the sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Span;

use super::frame::{ReliabilityFrame, RoutingFrame, RoutingFrameType};
use crate::core::{Connector, FrameSink, FrameStream, SignalingError, WireFrame};

/// Why a socket stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The socket could not be opened.
    ConnectFailed(String),
    /// The remote side closed the socket or the stream ended.
    Closed,
    /// The socket reported an I/O error.
    Error(String),
    /// A keep-alive check saw no PONG in time.
    Timeout,
}

/// What happened on the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// The socket is open. Fires at most once per generation.
    Opened,
    /// Reliability traffic for a channel.
    Message {
        /// Channel the frame was routed on.
        channel_id: String,
        /// The reliability frame.
        message: ReliabilityFrame,
        /// Whether the relay marked the sender as authorized.
        authorized: bool,
    },
    /// The relay reported an error.
    Error {
        /// Channel the error belongs to, if the relay named one.
        channel_id: Option<String>,
        /// The decoded error.
        error: SignalingError,
    },
    /// The remote peer joined.
    PeerConnected {
        /// Channel of the peer.
        channel_id: Option<String>,
    },
    /// The remote peer left.
    PeerOffline {
        /// Channel of the peer.
        channel_id: Option<String>,
    },
    /// The socket is dead. Fires exactly once per generation.
    Closed(CloseReason),
}

/// A socket event tagged with its connection generation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    /// Generation returned by the `connect` call that opened the socket.
    pub generation: u64,
    /// The event.
    pub kind: TransportEventKind,
}

/// State shared between a socket's tasks and the [`Transport`].
struct SocketShared {
    generation: u64,
    open: AtomicBool,
    dead: AtomicBool,
    pongs: AtomicU64,
    events: mpsc::UnboundedSender<TransportEvent>,
    span: Span,
}

impl SocketShared {
    fn emit(&self, kind: TransportEventKind) {
        let _ = self.events.send(TransportEvent {
            generation: self.generation,
            kind,
        });
    }

    /// Mark the socket dead. Only the first caller reports the closure.
    fn report_closed(&self, reason: CloseReason) {
        self.open.store(false, Ordering::SeqCst);
        if self.dead.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(parent: &self.span, generation = self.generation, ?reason, "socket closed");
        self.emit(TransportEventKind::Closed(reason));
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.dead.load(Ordering::SeqCst)
    }
}

struct SocketHandle {
    shared: Arc<SocketShared>,
    outbound: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
    keepalive: Option<JoinHandle<()>>,
}

impl SocketHandle {
    /// Stop the socket without reporting a closure. Queued frames still flush.
    fn shutdown(self) {
        self.shared.open.store(false, Ordering::SeqCst);
        self.shared.dead.store(true, Ordering::SeqCst);
        self.reader.abort();
        if let Some(keepalive) = self.keepalive {
            keepalive.abort();
        }
        drop(self.outbound);
    }
}

/// Owner of the socket to the relay.
pub struct Transport {
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<TransportEvent>,
    generation: AtomicU64,
    socket: Mutex<Option<SocketHandle>>,
    span: Span,
}

impl Transport {
    /// Create a transport and the receiver its events arrive on.
    pub fn new(
        connector: Arc<dyn Connector>,
        span: Span,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Self {
            connector,
            events,
            generation: AtomicU64::new(0),
            socket: Mutex::new(None),
            span,
        };
        (transport, rx)
    }

    /// Open a socket to `url`, replacing any current one.
    ///
    /// Returns the generation of the new socket. Its outcome arrives as an
    /// [`TransportEventKind::Opened`] or [`TransportEventKind::Closed`] event.
    pub fn connect(&self, url: &str) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::new(SocketShared {
            generation,
            open: AtomicBool::new(false),
            dead: AtomicBool::new(false),
            pongs: AtomicU64::new(0),
            events: self.events.clone(),
            span: self.span.clone(),
        });
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tracing::debug!(parent: &self.span, generation, url, "connecting to relay");
        let reader = tokio::spawn(run_socket(
            Arc::clone(&self.connector),
            url.to_string(),
            Arc::clone(&shared),
            outbound.clone(),
            outbound_rx,
        ));

        let previous = self.socket.lock().replace(SocketHandle {
            shared,
            outbound,
            reader,
            keepalive: None,
        });
        if let Some(previous) = previous {
            previous.shutdown();
        }
        generation
    }

    /// Whether the current socket is open.
    pub fn is_open(&self) -> bool {
        self.socket
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.shared.is_open())
    }

    /// Generation of the most recent `connect` call, 0 if none.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Send a frame. Dropped silently unless the socket is open.
    pub fn send(&self, frame: &RoutingFrame) {
        let guard = self.socket.lock();
        let Some(handle) = guard.as_ref().filter(|h| h.shared.is_open()) else {
            tracing::trace!(parent: &self.span, frame_type = ?frame.frame_type, "socket not open, dropping frame");
            return;
        };
        match frame.encode() {
            Ok(text) => {
                let _ = handle.outbound.send(text);
            }
            Err(err) => tracing::warn!(parent: &self.span, %err, "failed to encode frame"),
        }
    }

    /// Send reliability traffic for a channel.
    pub fn send_message(&self, channel_id: &str, message: ReliabilityFrame) {
        self.send(&RoutingFrame::message(channel_id, message));
    }

    /// Send an error for a channel.
    pub fn send_error(&self, channel_id: &str, error: &SignalingError) {
        self.send(&RoutingFrame::error(channel_id, error));
    }

    /// Send a PING and report a [`CloseReason::Timeout`] closure if no PONG
    /// arrives within `timeout`.
    ///
    /// Does nothing unless the socket is open. A new check replaces a pending one.
    pub fn check_alive(&self, timeout: Duration) {
        let mut guard = self.socket.lock();
        let Some(handle) = guard.as_mut().filter(|h| h.shared.is_open()) else {
            return;
        };
        let shared = Arc::clone(&handle.shared);
        let before = shared.pongs.load(Ordering::SeqCst);

        match RoutingFrame::ping().encode() {
            Ok(text) => {
                let _ = handle.outbound.send(text);
            }
            Err(err) => tracing::warn!(parent: &self.span, %err, "failed to encode ping"),
        }

        let keepalive = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if shared.pongs.load(Ordering::SeqCst) == before {
                shared.report_closed(CloseReason::Timeout);
            }
        });
        if let Some(stale) = handle.keepalive.replace(keepalive) {
            stale.abort();
        }
    }

    /// Close the socket. Frames already sent are flushed before the sink closes.
    ///
    /// No closure event is reported for a socket closed this way.
    pub fn close(&self) {
        if let Some(handle) = self.socket.lock().take() {
            tracing::debug!(parent: &self.span, generation = handle.shared.generation, "closing socket");
            handle.shutdown();
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(handle) = self.socket.get_mut().take() {
            handle.shutdown();
        }
    }
}

async fn run_socket(
    connector: Arc<dyn Connector>,
    url: String,
    shared: Arc<SocketShared>,
    outbound: mpsc::UnboundedSender<String>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
) {
    let (sink, stream) = match connector.connect(&url).await {
        Ok(halves) => halves,
        Err(err) => {
            tracing::warn!(parent: &shared.span, %err, "failed to open socket");
            shared.report_closed(CloseReason::ConnectFailed(err.to_string()));
            return;
        }
    };

    if shared.dead.load(Ordering::SeqCst) {
        return;
    }
    tokio::spawn(write_loop(sink, outbound_rx, Arc::clone(&shared)));
    shared.open.store(true, Ordering::SeqCst);
    tracing::debug!(parent: &shared.span, generation = shared.generation, "socket open");
    shared.emit(TransportEventKind::Opened);

    read_loop(stream, &shared, &outbound).await;
}

async fn write_loop(
    mut sink: FrameSink,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    shared: Arc<SocketShared>,
) {
    while let Some(text) = outbound_rx.recv().await {
        if let Err(err) = sink.send(text).await {
            tracing::warn!(parent: &shared.span, %err, "socket write failed");
            shared.report_closed(CloseReason::Error(err.to_string()));
            return;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(
    mut stream: FrameStream,
    shared: &SocketShared,
    outbound: &mpsc::UnboundedSender<String>,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(WireFrame::Text(text)) => route_frame(&text, shared, outbound),
            Ok(WireFrame::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => route_frame(&text, shared, outbound),
                Err(_) => tracing::warn!(parent: &shared.span, "binary frame is not UTF-8"),
            },
            Ok(WireFrame::Control) => {}
            Ok(WireFrame::Close) => break,
            Err(err) => {
                tracing::warn!(parent: &shared.span, %err, "socket read failed");
                shared.report_closed(CloseReason::Error(err.to_string()));
                return;
            }
        }
    }
    shared.report_closed(CloseReason::Closed);
}

fn route_frame(text: &str, shared: &SocketShared, outbound: &mpsc::UnboundedSender<String>) {
    let frame = match RoutingFrame::decode(text) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(parent: &shared.span, %err, "dropping undecodable frame");
            return;
        }
    };
    tracing::trace!(parent: &shared.span, frame_type = ?frame.frame_type, "frame received");

    match frame.frame_type {
        RoutingFrameType::Message => match (frame.channel_id, frame.message) {
            (Some(channel_id), Some(message)) => shared.emit(TransportEventKind::Message {
                channel_id,
                message,
                authorized: frame.authorized.unwrap_or(false),
            }),
            _ => tracing::warn!(parent: &shared.span, "MESSAGE frame without channel or body"),
        },
        RoutingFrameType::Error => match frame.error {
            Some(error) => shared.emit(TransportEventKind::Error {
                channel_id: frame.channel_id,
                error: error.into(),
            }),
            None => tracing::warn!(parent: &shared.span, "ERROR frame without error body"),
        },
        RoutingFrameType::PeerConnected => shared.emit(TransportEventKind::PeerConnected {
            channel_id: frame.channel_id,
        }),
        RoutingFrameType::PeerOffline => shared.emit(TransportEventKind::PeerOffline {
            channel_id: frame.channel_id,
        }),
        RoutingFrameType::Ping => {
            if shared.is_open() {
                match RoutingFrame::pong().encode() {
                    Ok(text) => {
                        let _ = outbound.send(text);
                    }
                    Err(err) => tracing::warn!(parent: &shared.span, %err, "failed to encode pong"),
                }
            }
        }
        RoutingFrameType::Pong => {
            shared.pongs.fetch_add(1, Ordering::SeqCst);
        }
        RoutingFrameType::Unknown => {
            tracing::debug!(parent: &shared.span, "ignoring frame of unknown type");
        }
    }
}
