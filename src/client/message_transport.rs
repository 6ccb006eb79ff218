//! Signed WebRTC signaling on top of a [`SignalingClient`].
//!
//! The transport starts in the setup phase: it sends a signed
//! `SETUP_REQUEST` and waits for the device's `SETUP_RESPONSE`, which carries
//! the ICE servers. After that, descriptions and candidates flow both ways.
//! Every payload is signed on the way out and verified on the way in.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::Span;

use super::client::{SignalingClient, SignalingClientObserver};
use crate::core::{ClientError, Observers, SignalingError, Subscription};
use crate::crypto::{MessageSigner, NoneMessageSigner};
use crate::message::{SignalingIceServer, SignalingMessage, WebrtcSignalingMessage};

/// How messages are signed.
#[derive(Clone, PartialEq, Eq)]
pub enum ClientMessageTransportOptions {
    /// No signing. Only for trusted setups.
    None,
    /// HS256 JWTs with a secret shared with the device.
    SharedSecret {
        /// The shared secret.
        shared_secret: String,
        /// Key ID put in the JWT header.
        key_id: Option<String>,
    },
}

impl fmt::Debug for ClientMessageTransportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::SharedSecret { key_id, .. } => f
                .debug_struct("SharedSecret")
                .field("shared_secret", &"<redacted>")
                .field("key_id", key_id)
                .finish(),
        }
    }
}

/// Callbacks from a [`ClientMessageTransport`]. Every method defaults to doing nothing.
pub trait MessageTransportObserver: Send + Sync {
    /// A verified description or candidate arrived.
    fn on_webrtc_signaling_message(&self, _message: &WebrtcSignalingMessage) {}

    /// Signing or verification failed. The client stays up.
    fn on_error(&self, _error: &SignalingError) {}

    /// The device answered the setup request.
    fn on_setup_done(&self, _ice_servers: &[SignalingIceServer]) {}
}

/// Where the transport is in the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTransportPhase {
    /// Waiting for the setup response.
    Setup,
    /// Exchanging descriptions and candidates.
    Signaling,
}

struct TransportInner {
    client: SignalingClient,
    signer: Mutex<Box<dyn MessageSigner>>,
    phase: Mutex<MessageTransportPhase>,
    observers: Observers<dyn MessageTransportObserver>,
    client_subscription: Mutex<Option<Subscription>>,
    span: Span,
}

/// Forwards client messages without keeping the transport alive.
struct ClientHook {
    inner: Weak<TransportInner>,
}

impl SignalingClientObserver for ClientHook {
    fn on_message(&self, message: &Value) {
        if let Some(inner) = self.inner.upgrade() {
            inner.handle_message(message.clone());
        }
    }
}

/// Client-side message transport.
#[derive(Clone)]
pub struct ClientMessageTransport {
    inner: Arc<TransportInner>,
}

#[cfg(feature = "jwt")]
fn shared_secret_signer(shared_secret: &str, key_id: Option<String>) -> Result<Box<dyn MessageSigner>, ClientError> {
    Ok(Box::new(crate::crypto::JwtMessageSigner::new(shared_secret, key_id)))
}

#[cfg(not(feature = "jwt"))]
fn shared_secret_signer(_shared_secret: &str, _key_id: Option<String>) -> Result<Box<dyn MessageSigner>, ClientError> {
    Err(ClientError::Config(
        "shared secret signing requires the `jwt` feature".into(),
    ))
}

impl ClientMessageTransport {
    /// Create a transport over `client`. Nothing is sent until [`start`](Self::start).
    pub fn new(client: SignalingClient, options: ClientMessageTransportOptions) -> Result<Self, ClientError> {
        let signer: Box<dyn MessageSigner> = match options {
            ClientMessageTransportOptions::None => Box::new(NoneMessageSigner),
            ClientMessageTransportOptions::SharedSecret { shared_secret, key_id } => {
                shared_secret_signer(&shared_secret, key_id)?
            }
        };
        let span = tracing::info_span!(parent: &client.config().span, "message_transport");
        Ok(Self {
            inner: Arc::new(TransportInner {
                client,
                signer: Mutex::new(signer),
                phase: Mutex::new(MessageTransportPhase::Setup),
                observers: Observers::new(),
                client_subscription: Mutex::new(None),
                span,
            }),
        })
    }

    /// Listen to the client and send the setup request.
    pub fn start(&self) -> Result<(), ClientError> {
        let hook = Arc::new(ClientHook {
            inner: Arc::downgrade(&self.inner),
        });
        let subscription = self.inner.client.subscribe(hook);
        *self.inner.client_subscription.lock() = Some(subscription);

        tracing::debug!(parent: &self.inner.span, "sending setup request");
        self.inner.send(&SignalingMessage::SetupRequest)
    }

    /// Sign and send a description or candidate.
    ///
    /// A signing failure is returned and also reported to observers.
    pub fn send_webrtc_signaling_message(&self, message: WebrtcSignalingMessage) -> Result<(), ClientError> {
        self.inner.send(&message.into())
    }

    /// Register an observer. It stays registered while the handle lives.
    pub fn subscribe(&self, observer: Arc<dyn MessageTransportObserver>) -> Subscription {
        self.inner.observers.subscribe(observer)
    }

    /// Current phase.
    pub fn phase(&self) -> MessageTransportPhase {
        *self.inner.phase.lock()
    }

    /// The underlying client.
    pub fn client(&self) -> &SignalingClient {
        &self.inner.client
    }

    /// Stop listening to the client. The client itself stays open.
    pub fn close(&self) {
        self.inner.client_subscription.lock().take();
    }
}

impl fmt::Debug for ClientMessageTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientMessageTransport")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl TransportInner {
    fn send(&self, message: &SignalingMessage) -> Result<(), ClientError> {
        // sign and send under one lock so message order matches sequence order
        let mut signer = self.signer.lock();
        let result = signer.sign(message.encode());
        let signed = match result {
            Ok(signed) => signed,
            Err(err) => {
                drop(signer);
                tracing::warn!(parent: &self.span, %err, "failed to sign message");
                self.observers.notify(|o| o.on_error(&err));
                return Err(err.into());
            }
        };
        self.client.send_message(signed)
    }

    fn handle_message(&self, message: Value) {
        let verified = self.signer.lock().verify(message);
        let payload = match verified {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(parent: &self.span, %err, "failed to verify message");
                self.observers.notify(|o| o.on_error(&err));
                return;
            }
        };

        let Some(decoded) = SignalingMessage::decode(&payload) else {
            tracing::debug!(parent: &self.span, "ignoring message not in the catalog");
            return;
        };

        let mut phase = self.phase.lock();
        match (*phase, decoded) {
            (MessageTransportPhase::Setup, SignalingMessage::SetupResponse { ice_servers }) => {
                *phase = MessageTransportPhase::Signaling;
                drop(phase);
                tracing::debug!(parent: &self.span, servers = ice_servers.len(), "setup done");
                self.observers.notify(|o| o.on_setup_done(&ice_servers));
            }
            (MessageTransportPhase::Signaling, decoded) => {
                drop(phase);
                match WebrtcSignalingMessage::try_from(decoded) {
                    Ok(message) => self.observers.notify(|o| o.on_webrtc_signaling_message(&message)),
                    Err(other) => {
                        tracing::debug!(parent: &self.span, message = ?other, "ignoring message while signaling");
                    }
                }
            }
            (MessageTransportPhase::Setup, other) => {
                drop(phase);
                tracing::debug!(parent: &self.span, message = ?other, "ignoring message during setup");
            }
        }
    }
}
