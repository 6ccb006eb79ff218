//! High-level signaling client.
//!
//! [`SignalingClient`] runs the connect handshake, owns the relay socket, and
//! drives two state machines: the [`ConnectionState`] of the session with the
//! relay and the [`ChannelState`] of the remote peer. Application payloads go
//! through the reliability layer, so they survive socket reconnects.
//!
//! # Example
//!
//! ```ignore
//! use relay_signaling::prelude::*;
//!
//! let client = SignalingClient::builder("pr-12345678", "de-abcdefgh")
//!     .access_token(token)
//!     .build()?;
//! let _sub = client.subscribe(Arc::new(MyObserver));
//! client.start().await?;
//! client.send_message(serde_json::json!({"hello": "device"}))?;
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Span;

use super::bootstrap::ConnectBackend;
use super::state::{ChannelState, ConnectionState};
use crate::core::constants::{
    CHANNEL_CLOSED_MESSAGE, CHECK_ALIVE_TIMEOUT, DEFAULT_ENDPOINT_DOMAIN, MAX_RECONNECT_ATTEMPTS,
    reconnect_backoff,
};
use crate::core::{
    ClientError, Connector, Observers, SignalingError, SignalingErrorCode, Subscription,
};
use crate::reliability::{Reliability, ReliabilityHandler};
use crate::transport::{CloseReason, ReliabilityFrame, Transport, TransportEvent, TransportEventKind};

/// Callbacks from a [`SignalingClient`].
///
/// Called synchronously from the client's event task; implementations must
/// not block. Every method defaults to doing nothing.
pub trait SignalingClientObserver: Send + Sync {
    /// The connection state changed.
    fn on_connection_state_change(&self, _state: ConnectionState) {}

    /// The channel state changed.
    fn on_channel_state_change(&self, _state: ChannelState) {}

    /// A payload arrived from the peer, in order and exactly once.
    fn on_message(&self, _message: &Value) {}

    /// The client hit an error. Terminal errors come with a `Failed` state.
    fn on_error(&self, _error: &ClientError) {}

    /// A socket opened after an earlier one was lost.
    fn on_connection_reconnect(&self) {}
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Product ID.
    pub product_id: String,

    /// Device ID.
    pub device_id: String,

    /// Base URL of the signaling service.
    pub endpoint_url: String,

    /// Fail instead of connecting when the device is offline.
    pub require_online: bool,

    /// Bearer token for the handshake.
    pub access_token: Option<String>,

    /// PONG deadline used by [`SignalingClient::check_alive`].
    pub check_alive_timeout: Duration,

    /// Reconnect attempts before the client fails.
    pub max_reconnect_attempts: u32,

    /// Parent span of everything the client logs.
    pub span: Span,
}

impl ClientConfig {
    /// Defaults for a product/device pair.
    pub fn new(product_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        let product_id = product_id.into();
        let device_id = device_id.into();
        Self {
            endpoint_url: format!("https://{product_id}.{DEFAULT_ENDPOINT_DOMAIN}"),
            span: tracing::info_span!("signaling_client", product_id = %product_id, device_id = %device_id),
            product_id,
            device_id,
            require_online: false,
            access_token: None,
            check_alive_timeout: CHECK_ALIVE_TIMEOUT,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Builder for a [`SignalingClient`].
pub struct SignalingClientBuilder {
    config: ClientConfig,
    backend: Option<Arc<dyn ConnectBackend>>,
    connector: Option<Arc<dyn Connector>>,
}

impl SignalingClientBuilder {
    /// Start from the defaults for a product/device pair.
    pub fn new(product_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(product_id, device_id),
            backend: None,
            connector: None,
        }
    }

    /// Set the signaling service URL.
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = url.into();
        self
    }

    /// Require the device to be online.
    pub fn require_online(mut self, require: bool) -> Self {
        self.config.require_online = require;
        self
    }

    /// Set the handshake bearer token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.access_token = Some(token.into());
        self
    }

    /// Set the keep-alive PONG deadline.
    pub fn check_alive_timeout(mut self, timeout: Duration) -> Self {
        self.config.check_alive_timeout = timeout;
        self
    }

    /// Set the reconnect budget.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Log under `span` instead of the default one.
    pub fn span(mut self, span: Span) -> Self {
        self.config.span = span;
        self
    }

    /// Use a custom handshake backend.
    pub fn backend(mut self, backend: Arc<dyn ConnectBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use a custom socket connector.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Build the client.
    ///
    /// Fails when a collaborator was not injected and its default
    /// implementation is compiled out.
    pub fn build(self) -> Result<SignalingClient, ClientError> {
        let backend = match self.backend {
            Some(backend) => backend,
            None => default_backend(&self.config)?,
        };
        let connector = match self.connector {
            Some(connector) => connector,
            None => default_connector()?,
        };
        Ok(SignalingClient::with_parts(self.config, backend, connector))
    }
}

#[cfg(feature = "http")]
fn default_backend(config: &ClientConfig) -> Result<Arc<dyn ConnectBackend>, ClientError> {
    Ok(Arc::new(super::bootstrap::HttpBackend::new(
        config.endpoint_url.clone(),
        config.product_id.clone(),
        config.device_id.clone(),
    )))
}

#[cfg(not(feature = "http"))]
fn default_backend(_config: &ClientConfig) -> Result<Arc<dyn ConnectBackend>, ClientError> {
    Err(ClientError::Config(
        "no ConnectBackend injected and the `http` feature is disabled".into(),
    ))
}

#[cfg(feature = "websocket")]
fn default_connector() -> Result<Arc<dyn Connector>, ClientError> {
    Ok(Arc::new(crate::transport::WebSocketConnector::new()))
}

#[cfg(not(feature = "websocket"))]
fn default_connector() -> Result<Arc<dyn Connector>, ClientError> {
    Err(ClientError::Config(
        "no Connector injected and the `websocket` feature is disabled".into(),
    ))
}

/// Puts reliability frames on the client's channel.
struct ChannelSink {
    transport: Arc<Transport>,
    channel_id: Arc<OnceLock<String>>,
}

impl ReliabilityHandler for ChannelSink {
    fn send_routing_message(&self, frame: ReliabilityFrame) {
        if let Some(channel_id) = self.channel_id.get() {
            self.transport.send_message(channel_id, frame);
        }
    }
}

/// Mutable session state. Observers are never called with this locked.
struct ClientState {
    connection: ConnectionState,
    channel: ChannelState,
    signaling_url: Option<String>,
    reconnect_counter: u32,
    opened_sockets: u32,
    closed: bool,
    event_task: Option<JoinHandle<()>>,
    retry_task: Option<JoinHandle<()>>,
}

struct ClientInner {
    config: ClientConfig,
    backend: Arc<dyn ConnectBackend>,
    transport: Arc<Transport>,
    channel_id: Arc<OnceLock<String>>,
    state: Mutex<ClientState>,
    reliability: Mutex<Reliability<ChannelSink>>,
    observers: Observers<dyn SignalingClientObserver>,
    events: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    span: Span,
}

/// Client side of a signaling channel to one device.
///
/// Cheap to clone; clones share the session. Single use: once it leaves
/// [`ConnectionState::New`] it cannot be started again.
#[derive(Clone)]
pub struct SignalingClient {
    inner: Arc<ClientInner>,
}

impl SignalingClient {
    /// Start building a client.
    pub fn builder(product_id: impl Into<String>, device_id: impl Into<String>) -> SignalingClientBuilder {
        SignalingClientBuilder::new(product_id, device_id)
    }

    fn with_parts(config: ClientConfig, backend: Arc<dyn ConnectBackend>, connector: Arc<dyn Connector>) -> Self {
        let span = config.span.clone();
        let (transport, events) = Transport::new(connector, tracing::info_span!(parent: &span, "transport"));
        let transport = Arc::new(transport);
        let channel_id = Arc::new(OnceLock::new());
        let reliability = Reliability::new(
            ChannelSink {
                transport: Arc::clone(&transport),
                channel_id: Arc::clone(&channel_id),
            },
            tracing::info_span!(parent: &span, "reliability"),
        );

        Self {
            inner: Arc::new(ClientInner {
                config,
                backend,
                transport,
                channel_id,
                state: Mutex::new(ClientState {
                    connection: ConnectionState::New,
                    channel: ChannelState::New,
                    signaling_url: None,
                    reconnect_counter: 0,
                    opened_sockets: 0,
                    closed: false,
                    event_task: None,
                    retry_task: None,
                }),
                reliability: Mutex::new(reliability),
                observers: Observers::new(),
                events: Mutex::new(Some(events)),
                span,
            }),
        }
    }

    /// Run the handshake and open the socket.
    ///
    /// Returns once the socket connect has been started. Handshake failures
    /// are reported to observers (state `Failed`), not returned. Calling this
    /// a second time is a [`ClientError::Connect`].
    pub async fn start(&self) -> Result<(), ClientError> {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock();
            if state.connection != ConnectionState::New || state.closed {
                return Err(ClientError::Connect("SignalingClient::start can only be called once".into()));
            }
            state.connection = ConnectionState::Connecting;
        }
        inner.notify_connection_state(ConnectionState::Connecting);
        inner.spawn_event_loop();

        let response = match inner.backend.client_connect(inner.config.access_token.as_deref()).await {
            Ok(response) => response,
            Err(err) => {
                inner.fail(err.into());
                return Ok(());
            }
        };
        tracing::debug!(
            parent: &inner.span,
            channel_id = %response.channel_id,
            device_online = ?response.device_online,
            "handshake done"
        );

        if inner.is_finished() {
            return Ok(());
        }
        let _ = inner.channel_id.set(response.channel_id);
        if let Some(online) = response.device_online {
            inner.set_channel_state(if online {
                ChannelState::Connected
            } else {
                ChannelState::Disconnected
            });
        }

        // observers may have closed the client while being told about the channel
        let offline = {
            let mut state = inner.state.lock();
            if state.closed || state.connection.is_terminal() {
                return Ok(());
            }
            if inner.config.require_online && state.channel != ChannelState::Connected {
                true
            } else {
                inner.transport.connect(&response.signaling_url);
                state.signaling_url = Some(response.signaling_url);
                false
            }
        };
        if offline {
            inner.fail(ClientError::DeviceOffline);
        }
        Ok(())
    }

    /// Close the channel. Idempotent.
    ///
    /// Tells the peer the channel is closed, stops all timers and the socket,
    /// and moves both states to `Closed`. Observers hear nothing afterwards.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Send a payload to the peer reliably.
    ///
    /// Payloads sent before the socket is open, or while it is reconnecting,
    /// go out once it opens. Fails once the client is closed or failed.
    pub fn send_message(&self, message: Value) -> Result<(), ClientError> {
        let connection = {
            let state = self.inner.state.lock();
            if state.closed {
                ConnectionState::Closed
            } else {
                state.connection
            }
        };
        if connection.is_terminal() {
            return Err(ClientError::Runtime(format!(
                "cannot send on a signaling client that is {connection}"
            )));
        }
        self.inner.reliability.lock().send_reliable(message);
        Ok(())
    }

    /// Send an error to the peer. Best effort: dropped unless the socket is open.
    pub fn send_error(&self, error: &SignalingError) {
        if let Some(channel_id) = self.inner.channel_id.get() {
            self.inner.transport.send_error(channel_id, error);
        }
    }

    /// Probe the socket with the configured timeout.
    pub fn check_alive(&self) {
        self.check_alive_with_timeout(self.inner.config.check_alive_timeout);
    }

    /// Probe the socket: a missing PONG after `timeout` counts as a lost socket.
    pub fn check_alive_with_timeout(&self, timeout: Duration) {
        let state = self.inner.state.lock();
        if state.closed || state.connection.is_terminal() {
            return;
        }
        drop(state);
        self.inner.transport.check_alive(timeout);
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().connection
    }

    /// Current channel state.
    pub fn channel_state(&self) -> ChannelState {
        self.inner.state.lock().channel
    }

    /// Channel ID, known once the handshake succeeded.
    pub fn channel_id(&self) -> Option<String> {
        self.inner.channel_id.get().cloned()
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Register an observer. It stays registered while the handle lives.
    pub fn subscribe(&self, observer: Arc<dyn SignalingClientObserver>) -> Subscription {
        self.inner.observers.subscribe(observer)
    }
}

impl fmt::Debug for SignalingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SignalingClient")
            .field("product_id", &self.inner.config.product_id)
            .field("device_id", &self.inner.config.device_id)
            .field("connection", &state.connection)
            .field("channel", &state.channel)
            .finish_non_exhaustive()
    }
}

impl ClientInner {
    fn spawn_event_loop(self: &Arc<Self>) {
        let Some(mut events) = self.events.lock().take() else {
            return;
        };
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.handle_transport_event(event);
            }
        });
        self.state.lock().event_task = Some(task);
    }

    fn handle_transport_event(self: &Arc<Self>, event: TransportEvent) {
        if self.state.lock().closed {
            return;
        }
        if event.generation != self.transport.generation() {
            tracing::trace!(parent: &self.span, generation = event.generation, "ignoring event from a replaced socket");
            return;
        }

        match event.kind {
            TransportEventKind::Opened => self.on_socket_opened(),
            TransportEventKind::Message { channel_id, message, .. } => {
                if !self.is_our_channel(Some(&channel_id)) {
                    return;
                }
                let delivered = self.reliability.lock().handle_frame(message);
                if let Some(payload) = delivered {
                    self.observers.notify(|o| o.on_message(&payload));
                }
            }
            TransportEventKind::Error { channel_id, error } => {
                if self.is_our_channel(channel_id.as_deref()) {
                    self.fail(ClientError::Signaling(error));
                }
            }
            TransportEventKind::PeerConnected { channel_id } => {
                if self.is_our_channel(channel_id.as_deref()) {
                    self.set_channel_state(ChannelState::Connected);
                    self.reliability.lock().handle_peer_connected();
                }
            }
            TransportEventKind::PeerOffline { channel_id } => {
                if self.is_our_channel(channel_id.as_deref()) {
                    self.set_channel_state(ChannelState::Disconnected);
                }
            }
            TransportEventKind::Closed(reason) => self.on_socket_closed(reason),
        }
    }

    fn is_our_channel(&self, channel_id: Option<&str>) -> bool {
        match (channel_id, self.channel_id.get()) {
            (Some(theirs), Some(ours)) if theirs != ours => {
                tracing::debug!(parent: &self.span, channel_id = theirs, "ignoring frame for another channel");
                false
            }
            _ => true,
        }
    }

    fn on_socket_opened(&self) {
        let reconnected = {
            let mut state = self.state.lock();
            if state.connection.is_terminal() {
                return;
            }
            state.reconnect_counter = 0;
            state.opened_sockets += 1;
            state.opened_sockets > 1
        };
        tracing::debug!(parent: &self.span, reconnected, "socket opened");

        self.set_connection_state(ConnectionState::Connected);
        self.reliability.lock().handle_connect();
        if reconnected {
            self.observers.notify(|o| o.on_connection_reconnect());
        }
    }

    fn on_socket_closed(self: &Arc<Self>, reason: CloseReason) {
        enum Next {
            Ignore,
            Fail(ClientError),
            Retry(Duration),
        }

        let next = {
            let mut state = self.state.lock();
            if state.connection.is_terminal() || state.connection == ConnectionState::WaitRetry {
                Next::Ignore
            } else if state.opened_sockets == 0 {
                Next::Fail(ClientError::Runtime("The socket was closed before it opened".into()))
            } else if state.reconnect_counter > self.config.max_reconnect_attempts {
                Next::Fail(ClientError::Runtime(format!(
                    "Gave up reconnecting after {} attempts",
                    state.reconnect_counter
                )))
            } else {
                let attempt = state.reconnect_counter;
                state.reconnect_counter += 1;
                state.connection = ConnectionState::WaitRetry;
                Next::Retry(reconnect_backoff(attempt))
            }
        };

        match next {
            Next::Ignore => {}
            Next::Fail(err) => {
                tracing::debug!(parent: &self.span, ?reason, "socket lost");
                self.fail(err);
            }
            Next::Retry(wait) => {
                tracing::debug!(parent: &self.span, ?reason, ?wait, "socket lost, reconnecting");
                self.notify_connection_state(ConnectionState::WaitRetry);
                self.schedule_reconnect(wait);
            }
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, wait: Duration) {
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(inner) = weak.upgrade() {
                inner.reconnect();
            }
        });
        let mut state = self.state.lock();
        if state.closed || state.connection.is_terminal() {
            task.abort();
        } else if let Some(stale) = state.retry_task.replace(task) {
            stale.abort();
        }
    }

    fn reconnect(&self) {
        {
            let mut state = self.state.lock();
            if state.closed || state.connection.is_terminal() {
                return;
            }
            state.retry_task = None;
            state.connection = ConnectionState::Connecting;
        }
        self.notify_connection_state(ConnectionState::Connecting);

        let state = self.state.lock();
        if state.closed || state.connection != ConnectionState::Connecting {
            return;
        }
        if let Some(url) = state.signaling_url.as_deref() {
            self.transport.connect(url);
        }
    }

    fn is_finished(&self) -> bool {
        let state = self.state.lock();
        state.closed || state.connection.is_terminal()
    }

    /// Move to `Failed` and report `error`. Only the first failure is reported.
    fn fail(&self, error: ClientError) {
        {
            let mut state = self.state.lock();
            if state.closed || state.connection.is_terminal() {
                return;
            }
            state.connection = ConnectionState::Failed;
            if let Some(task) = state.retry_task.take() {
                task.abort();
            }
        }
        tracing::error!(parent: &self.span, %error, "signaling client failed");
        self.transport.close();
        self.notify_connection_state(ConnectionState::Failed);
        self.observers.notify(|o| o.on_error(&error));
    }

    fn close(&self) {
        let (event_task, connection_changed, channel_changed) = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            if let Some(task) = state.retry_task.take() {
                task.abort();
            }
            let connection = std::mem::replace(&mut state.connection, ConnectionState::Closed);
            let channel = std::mem::replace(&mut state.channel, ChannelState::Closed);
            (
                state.event_task.take(),
                connection != ConnectionState::Closed,
                channel != ChannelState::Closed,
            )
        };
        tracing::debug!(parent: &self.span, "closing signaling client");

        if let Some(channel_id) = self.channel_id.get() {
            let error = SignalingError::new(SignalingErrorCode::ChannelClosed, CHANNEL_CLOSED_MESSAGE);
            self.transport.send_error(channel_id, &error);
        }
        self.transport.close();
        self.reliability.lock().clear();

        if connection_changed {
            self.notify_connection_state(ConnectionState::Closed);
        }
        if channel_changed {
            tracing::debug!(parent: &self.span, state = %ChannelState::Closed, "channel state");
            self.observers.notify(|o| o.on_channel_state_change(ChannelState::Closed));
        }
        self.observers.shutdown();

        if let Some(task) = event_task {
            task.abort();
        }
    }

    /// No-op once the client is closed or failed.
    fn set_connection_state(&self, next: ConnectionState) {
        let changed = {
            let mut state = self.state.lock();
            if state.closed || state.connection.is_terminal() {
                return;
            }
            std::mem::replace(&mut state.connection, next) != next
        };
        if changed {
            self.notify_connection_state(next);
        }
    }

    fn notify_connection_state(&self, next: ConnectionState) {
        tracing::debug!(parent: &self.span, state = %next, "connection state");
        self.observers.notify(|o| o.on_connection_state_change(next));
    }

    /// No-op once the client is closed or failed.
    fn set_channel_state(&self, next: ChannelState) {
        let changed = {
            let mut state = self.state.lock();
            if state.closed || state.connection.is_terminal() {
                return;
            }
            std::mem::replace(&mut state.channel, next) != next
        };
        if changed {
            tracing::debug!(parent: &self.span, state = %next, "channel state");
            self.observers.notify(|o| o.on_channel_state_change(next));
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for task in [state.event_task.take(), state.retry_task.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("pr-1", "de-1");
        assert_eq!(config.endpoint_url, "https://pr-1.webrtc.nabto.net");
        assert!(!config.require_online);
        assert_eq!(config.access_token, None);
        assert_eq!(config.check_alive_timeout, Duration::from_secs(1));
        assert_eq!(config.max_reconnect_attempts, 7);
    }

    #[test]
    fn test_builder_overrides() {
        let builder = SignalingClientBuilder::new("pr-1", "de-1")
            .endpoint_url("http://localhost:8080")
            .require_online(true)
            .access_token("tok")
            .check_alive_timeout(Duration::from_millis(250))
            .max_reconnect_attempts(2);
        assert_eq!(builder.config.endpoint_url, "http://localhost:8080");
        assert!(builder.config.require_online);
        assert_eq!(builder.config.access_token.as_deref(), Some("tok"));
        assert_eq!(builder.config.check_alive_timeout, Duration::from_millis(250));
        assert_eq!(builder.config.max_reconnect_attempts, 2);
    }

    #[cfg(all(feature = "http", feature = "websocket"))]
    #[test]
    fn test_build_with_default_collaborators() {
        let client = SignalingClient::builder("pr-1", "de-1").build().unwrap();
        assert_eq!(client.connection_state(), ConnectionState::New);
        assert_eq!(client.channel_state(), ChannelState::New);
        assert_eq!(client.channel_id(), None);
    }
}
