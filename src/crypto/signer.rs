//! The signing seam and the unsigned signer.

use serde_json::{Value, json};

use crate::core::SignalingError;
use crate::core::constants::SIGNING_TYPE_NONE;

/// Wraps outbound payloads in a signed envelope and unwraps inbound ones.
///
/// Implementations keep per-session state, so both calls take `&mut self`;
/// callers serialize access.
pub trait MessageSigner: Send {
    /// Sign a payload.
    fn sign(&mut self, message: Value) -> Result<Value, SignalingError>;

    /// Verify an envelope and return its payload.
    fn verify(&mut self, token: Value) -> Result<Value, SignalingError>;
}

/// Passes payloads through as `{"type": "NONE", "message": ..}`.
///
/// Only for trusted transports and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneMessageSigner;

impl MessageSigner for NoneMessageSigner {
    fn sign(&mut self, message: Value) -> Result<Value, SignalingError> {
        Ok(json!({ "type": SIGNING_TYPE_NONE, "message": message }))
    }

    fn verify(&mut self, token: Value) -> Result<Value, SignalingError> {
        let Value::Object(mut envelope) = token else {
            return Err(SignalingError::verification("Signed message is not an object"));
        };
        match envelope.get("type").and_then(Value::as_str) {
            Some(SIGNING_TYPE_NONE) => envelope.remove("message").ok_or_else(|| {
                SignalingError::verification("Expected key 'message' on signing message was not found")
            }),
            Some(other) => Err(SignalingError::verification(format!(
                "Expected a signing message of type NONE but got {other}"
            ))),
            None => Err(SignalingError::verification(
                "Expected key 'type' on signing message was not found",
            )),
        }
    }
}
