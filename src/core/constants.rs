//! Protocol constants for the relay signaling service.
//!
//! Wire strings and timing values that both peers and the relay agree on.

use std::time::Duration;

// =============================================================================
// HANDSHAKE
// =============================================================================

/// Path appended to the endpoint URL for the client connect request.
pub const CLIENT_CONNECT_PATH: &str = "/v1/client/connect";

/// Error code the relay returns for an unknown product.
pub const PRODUCT_ID_NOT_FOUND: &str = "PRODUCT_ID_NOT_FOUND";

/// Error code the relay returns for an unknown device.
pub const DEVICE_ID_NOT_FOUND: &str = "DEVICE_ID_NOT_FOUND";

/// Default endpoint host suffix; the product ID is the leading label.
pub const DEFAULT_ENDPOINT_DOMAIN: &str = "webrtc.nabto.net";

// =============================================================================
// TIMING
// =============================================================================

/// Default time to wait for a PONG after `check_alive` sends a PING.
pub const CHECK_ALIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Reconnect attempts allowed after a lost socket before the client fails.
///
/// The wait before attempt `n` (starting at 0) is `2^n` seconds.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 7;

/// Base unit of the reconnect backoff.
pub const RECONNECT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

// =============================================================================
// CHANNEL CLOSE
// =============================================================================

/// Message attached to the CHANNEL_CLOSED error sent on `close()`.
pub const CHANNEL_CLOSED_MESSAGE: &str = "Signaling client channel was closed";

/// Fallback text when a relay ERROR frame carries no message.
pub const MISSING_ERROR_MESSAGE: &str = "Missing detailed error information";

// =============================================================================
// MESSAGE SIGNING
// =============================================================================

/// Envelope type for JWT signed messages.
pub const SIGNING_TYPE_JWT: &str = "JWT";

/// Envelope type for unsigned messages.
pub const SIGNING_TYPE_NONE: &str = "NONE";

/// Compute the reconnect backoff for a given attempt number.
///
/// Saturates instead of overflowing for absurd attempt counts.
pub fn reconnect_backoff(attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    RECONNECT_BACKOFF_UNIT.saturating_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_backoff_doubles() {
        assert_eq!(reconnect_backoff(0), Duration::from_secs(1));
        assert_eq!(reconnect_backoff(1), Duration::from_secs(2));
        assert_eq!(reconnect_backoff(7), Duration::from_secs(128));
    }

    #[test]
    fn test_reconnect_backoff_saturates() {
        assert_eq!(reconnect_backoff(40), Duration::from_secs(u32::MAX as u64));
    }
}
