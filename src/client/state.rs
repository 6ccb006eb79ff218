//! Connection and channel states.

use std::fmt;

/// Lifecycle of the session with the relay.
///
/// ```text
/// New → Connecting → Connected ⇄ WaitRetry → Connecting …
///                 ↘ Failed        ↘ Failed
/// any → Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not started.
    New,
    /// Handshake or socket connect in progress.
    Connecting,
    /// The socket is open.
    Connected,
    /// The socket was lost; a reconnect is scheduled.
    WaitRetry,
    /// Gave up. Terminal.
    Failed,
    /// Closed by the caller. Terminal.
    Closed,
}

impl ConnectionState {
    /// Whether no further transitions happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    /// Upper-case name, e.g. `WAIT_RETRY`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::WaitRetry => "WAIT_RETRY",
            Self::Failed => "FAILED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Presence of the remote peer, as reported by the relay.
///
/// Independent of [`ConnectionState`]: an open socket says nothing about
/// whether the peer is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Unknown yet.
    New,
    /// The peer is connected to the relay.
    Connected,
    /// The peer is not connected to the relay.
    Disconnected,
    /// The channel failed.
    Failed,
    /// The channel was closed by the caller.
    Closed,
}

impl ChannelState {
    /// Upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Failed => "FAILED",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
