//! Shared harness: an in-memory relay, a scripted handshake, and observers
//! that record what the client reports.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;

use relay_signaling::client::{ClientConnectResponse, ConnectBackend};
use relay_signaling::prelude::*;

pub const CHANNEL_ID: &str = "channel-1";
pub const SIGNALING_URL: &str = "wss://relay.test/signaling";

/// Upper bound on any single wait. Virtual time under `start_paused`.
const WAIT: Duration = Duration::from_secs(3600);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// RELAY
// =============================================================================

/// The relay's end of one client socket.
pub struct RemoteSocket {
    pub url: String,
    from_client: fmpsc::UnboundedReceiver<String>,
    to_client: fmpsc::UnboundedSender<Result<WireFrame, TransportError>>,
}

impl RemoteSocket {
    /// Push a JSON frame to the client.
    pub fn send(&self, frame: Value) {
        let _ = self.to_client.unbounded_send(Ok(WireFrame::Text(frame.to_string())));
    }

    /// Push a DATA frame on the test channel.
    pub fn send_data(&self, seq: u64, data: Value) {
        self.send(json!({
            "type": "MESSAGE",
            "channelId": CHANNEL_ID,
            "message": {"type": "DATA", "seq": seq, "data": data}
        }));
    }

    /// Push an ACK on the test channel.
    pub fn send_ack(&self, seq: u64) {
        self.send(json!({
            "type": "MESSAGE",
            "channelId": CHANNEL_ID,
            "message": {"type": "ACK", "seq": seq}
        }));
    }

    /// Close the socket from the relay side.
    pub fn close(&self) {
        let _ = self.to_client.unbounded_send(Ok(WireFrame::Close));
    }

    /// Next frame the client wrote, or `None` once the client closed the socket.
    pub async fn recv(&mut self) -> Option<Value> {
        let text = timeout(WAIT, self.from_client.next())
            .await
            .expect("timed out waiting for a client frame")?;
        Some(serde_json::from_str(&text).expect("client wrote invalid JSON"))
    }

    /// Next frame, which must exist.
    pub async fn expect_frame(&mut self) -> Value {
        self.recv().await.expect("client closed the socket")
    }

    /// Next DATA frame, skipping ACKs and keep-alive traffic. Returns `(seq, data)`.
    pub async fn expect_data(&mut self) -> (u64, Value) {
        loop {
            let frame = self.expect_frame().await;
            if frame["type"] == "MESSAGE" && frame["message"]["type"] == "DATA" {
                let seq = frame["message"]["seq"].as_u64().expect("seq");
                return (seq, frame["message"]["data"].clone());
            }
        }
    }
}

/// Hands out in-memory sockets; can be told to refuse connections.
pub struct MemoryConnector {
    sockets: mpsc::UnboundedSender<RemoteSocket>,
    refuse: AtomicBool,
    attempts: AtomicUsize,
}

impl MemoryConnector {
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(format!("{url} unreachable")));
        }
        let (out_tx, out_rx) = fmpsc::unbounded::<String>();
        let (in_tx, in_rx) = fmpsc::unbounded::<Result<WireFrame, TransportError>>();
        let _ = self.sockets.send(RemoteSocket {
            url: url.to_string(),
            from_client: out_rx,
            to_client: in_tx,
        });
        let sink: FrameSink = Box::pin(out_tx.sink_map_err(|_| TransportError::Closed));
        let stream: FrameStream = Box::pin(in_rx);
        Ok((sink, stream))
    }
}

/// Test side of the relay: accepts the sockets the client opens.
pub struct Relay {
    sockets: mpsc::UnboundedReceiver<RemoteSocket>,
}

impl Relay {
    pub async fn accept(&mut self) -> RemoteSocket {
        timeout(WAIT, self.sockets.recv())
            .await
            .expect("timed out waiting for the client to connect")
            .expect("connector dropped")
    }
}

pub fn relay() -> (Arc<MemoryConnector>, Relay) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connector = Arc::new(MemoryConnector {
        sockets: tx,
        refuse: AtomicBool::new(false),
        attempts: AtomicUsize::new(0),
    });
    (connector, Relay { sockets: rx })
}

// =============================================================================
// HANDSHAKE
// =============================================================================

/// Answers every handshake with the same scripted result.
pub struct ScriptedBackend {
    response: Result<ClientConnectResponse, HttpError>,
    tokens: Mutex<Vec<Option<String>>>,
}

impl ScriptedBackend {
    pub fn new(response: Result<ClientConnectResponse, HttpError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn device_online(online: Option<bool>) -> Arc<Self> {
        Self::new(Ok(ClientConnectResponse {
            signaling_url: SIGNALING_URL.to_string(),
            channel_id: CHANNEL_ID.to_string(),
            device_online: online,
        }))
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().clone()
    }
}

#[async_trait]
impl ConnectBackend for ScriptedBackend {
    async fn client_connect(&self, access_token: Option<&str>) -> Result<ClientConnectResponse, HttpError> {
        self.tokens.lock().push(access_token.map(str::to_string));
        self.response.clone()
    }
}

pub fn build_client(backend: Arc<ScriptedBackend>, connector: Arc<MemoryConnector>) -> SignalingClient {
    SignalingClient::builder("pr-test", "de-test")
        .backend(backend)
        .connector(connector)
        .build()
        .expect("client builds with injected collaborators")
}

// =============================================================================
// OBSERVERS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connection(ConnectionState),
    Channel(ChannelState),
    Message(Value),
    Error(ClientError),
    Reconnected,
}

pub struct ClientRecorder {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl SignalingClientObserver for ClientRecorder {
    fn on_connection_state_change(&self, state: ConnectionState) {
        let _ = self.tx.send(ClientEvent::Connection(state));
    }

    fn on_channel_state_change(&self, state: ChannelState) {
        let _ = self.tx.send(ClientEvent::Channel(state));
    }

    fn on_message(&self, message: &Value) {
        let _ = self.tx.send(ClientEvent::Message(message.clone()));
    }

    fn on_error(&self, error: &ClientError) {
        let _ = self.tx.send(ClientEvent::Error(error.clone()));
    }

    fn on_connection_reconnect(&self) {
        let _ = self.tx.send(ClientEvent::Reconnected);
    }
}

/// Everything a [`ClientRecorder`] saw, in order.
pub struct ClientEvents {
    rx: mpsc::UnboundedReceiver<ClientEvent>,
    pub seen: Vec<ClientEvent>,
    _subscription: Subscription,
}

impl ClientEvents {
    pub async fn next(&mut self) -> ClientEvent {
        let event = timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for a client event")
            .expect("recorder dropped");
        self.seen.push(event.clone());
        event
    }

    /// Consume events until `want` shows up.
    pub async fn wait_for(&mut self, want: ClientEvent) {
        while self.next().await != want {}
    }

    /// Consume events until an error shows up and return it.
    pub async fn wait_for_error(&mut self) -> ClientError {
        loop {
            if let ClientEvent::Error(err) = self.next().await {
                return err;
            }
        }
    }

    /// Pull in whatever is already queued.
    pub fn drain(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.seen.push(event);
        }
    }

    pub fn connection_states(&self) -> Vec<ConnectionState> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Connection(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn channel_states(&self) -> Vec<ChannelState> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Channel(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<Value> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<ClientError> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Error(err) => Some(err.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &ClientEvent) -> usize {
        self.seen.iter().filter(|e| *e == event).count()
    }
}

pub fn record_client(client: &SignalingClient) -> ClientEvents {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = client.subscribe(Arc::new(ClientRecorder { tx }));
    ClientEvents {
        rx,
        seen: Vec::new(),
        _subscription: subscription,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    SetupDone(Vec<SignalingIceServer>),
    Message(WebrtcSignalingMessage),
    Error(SignalingError),
}

pub struct PeerRecorder {
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl MessageTransportObserver for PeerRecorder {
    fn on_webrtc_signaling_message(&self, message: &WebrtcSignalingMessage) {
        let _ = self.tx.send(PeerEvent::Message(message.clone()));
    }

    fn on_error(&self, error: &SignalingError) {
        let _ = self.tx.send(PeerEvent::Error(error.clone()));
    }

    fn on_setup_done(&self, ice_servers: &[SignalingIceServer]) {
        let _ = self.tx.send(PeerEvent::SetupDone(ice_servers.to_vec()));
    }
}

pub struct PeerEvents {
    rx: mpsc::UnboundedReceiver<PeerEvent>,
    _subscription: Subscription,
}

impl PeerEvents {
    pub async fn next(&mut self) -> PeerEvent {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for a transport event")
            .expect("recorder dropped")
    }

    pub fn try_next(&mut self) -> Option<PeerEvent> {
        self.rx.try_recv().ok()
    }
}

pub fn record_transport(transport: &ClientMessageTransport) -> PeerEvents {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = transport.subscribe(Arc::new(PeerRecorder { tx }));
    PeerEvents {
        rx,
        _subscription: subscription,
    }
}

/// Start a client against an online device and wait until its socket is open.
pub async fn connected_client() -> (SignalingClient, ClientEvents, RemoteSocket, Arc<MemoryConnector>, Relay) {
    init_tracing();
    let (connector, mut relay) = relay();
    let client = build_client(ScriptedBackend::device_online(Some(true)), connector.clone());
    let mut events = record_client(&client);
    client.start().await.expect("start");
    let socket = relay.accept().await;
    events.wait_for(ClientEvent::Connection(ConnectionState::Connected)).await;
    (client, events, socket, connector, relay)
}
