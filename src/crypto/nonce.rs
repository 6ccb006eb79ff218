//! Session binding for signed messages.
//!
//! Each signer owns a random local nonce. The first message verified from the
//! remote side teaches us its nonce; from then on every inbound message must
//! carry the remote nonce as signer and our nonce as verifier. Message
//! sequence numbers are strict in both directions: no gaps, no reordering.

use uuid::Uuid;

use crate::core::SignalingError;

/// Claims to embed in the next outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignContext {
    /// Message sequence number.
    pub message_seq: u64,
    /// Our nonce.
    pub signer_nonce: String,
    /// The remote nonce, once learned.
    pub verifier_nonce: Option<String>,
}

/// Sequence and nonce state of one authenticated session.
#[derive(Debug, Clone)]
pub struct NonceBinding {
    nonce: String,
    remote_nonce: Option<String>,
    next_sign_seq: u64,
    next_verify_seq: u64,
}

impl Default for NonceBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceBinding {
    /// Start a session with a fresh random nonce.
    pub fn new() -> Self {
        Self::with_nonce(Uuid::new_v4().to_string())
    }

    /// Start a session with a given nonce.
    pub fn with_nonce(nonce: impl Into<String>) -> Self {
        Self {
            nonce: nonce.into(),
            remote_nonce: None,
            next_sign_seq: 0,
            next_verify_seq: 0,
        }
    }

    /// Our nonce.
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// The remote nonce, once a message has been verified.
    pub fn remote_nonce(&self) -> Option<&str> {
        self.remote_nonce.as_deref()
    }

    /// Reserve the claims for the next outbound message.
    ///
    /// Only message 0 may be signed before the remote nonce is known. A
    /// refused call consumes no sequence number.
    pub fn next_sign(&mut self) -> Result<SignContext, SignalingError> {
        if self.next_sign_seq != 0 && self.remote_nonce.is_none() {
            return Err(SignalingError::verification(
                "Cannot sign a message with sequence number > 0 before a valid message was received from the remote peer",
            ));
        }
        let message_seq = self.next_sign_seq;
        self.next_sign_seq += 1;
        Ok(SignContext {
            message_seq,
            signer_nonce: self.nonce.clone(),
            verifier_nonce: self.remote_nonce.clone(),
        })
    }

    /// Check the claims of an inbound message and advance on success.
    pub fn verify(
        &mut self,
        message_seq: u64,
        signer_nonce: &str,
        verifier_nonce: Option<&str>,
    ) -> Result<(), SignalingError> {
        if message_seq != self.next_verify_seq {
            return Err(SignalingError::verification(
                "The message sequence number does not match the expected sequence number",
            ));
        }

        if message_seq == 0 {
            self.remote_nonce = Some(signer_nonce.to_string());
        } else {
            if self.remote_nonce.as_deref() != Some(signer_nonce) {
                return Err(SignalingError::verification(
                    "The signer nonce does not match the expected value for the session",
                ));
            }
            if verifier_nonce != Some(self.nonce.as_str()) {
                return Err(SignalingError::verification(
                    "The verifier nonce does not match the expected value for the session",
                ));
            }
        }

        self.next_verify_seq += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SignalingErrorCode;

    #[test]
    fn test_nonces_are_unique() {
        assert_ne!(NonceBinding::new().nonce(), NonceBinding::new().nonce());
    }

    #[test]
    fn test_first_message_learns_remote_nonce() {
        let mut binding = NonceBinding::with_nonce("local");
        binding.verify(0, "remote", None).unwrap();
        assert_eq!(binding.remote_nonce(), Some("remote"));
        binding.verify(1, "remote", Some("local")).unwrap();
    }

    #[test]
    fn test_second_message_with_other_signer_nonce_fails() {
        let mut binding = NonceBinding::with_nonce("local");
        binding.verify(0, "remote", None).unwrap();
        let err = binding.verify(1, "intruder", Some("local")).unwrap_err();
        assert_eq!(err.code, SignalingErrorCode::VerificationError);

        // state unchanged: the genuine message 1 still verifies
        binding.verify(1, "remote", Some("local")).unwrap();
    }

    #[test]
    fn test_wrong_verifier_nonce_fails() {
        let mut binding = NonceBinding::with_nonce("local");
        binding.verify(0, "remote", None).unwrap();
        assert!(binding.verify(1, "remote", Some("other")).is_err());
        assert!(binding.verify(1, "remote", None).is_err());
    }

    #[test]
    fn test_sequence_gaps_and_replays_fail() {
        let mut binding = NonceBinding::with_nonce("local");
        assert!(binding.verify(1, "remote", None).is_err());
        binding.verify(0, "remote", None).unwrap();
        assert!(binding.verify(0, "remote", None).is_err());
        assert!(binding.verify(2, "remote", Some("local")).is_err());
    }

    #[test]
    fn test_sign_before_remote_nonce_is_refused() {
        let mut binding = NonceBinding::with_nonce("local");
        let first = binding.next_sign().unwrap();
        assert_eq!(first.message_seq, 0);
        assert_eq!(first.verifier_nonce, None);

        assert!(binding.next_sign().is_err());
        assert!(binding.next_sign().is_err());

        binding.verify(0, "remote", None).unwrap();
        let second = binding.next_sign().unwrap();
        assert_eq!(second.message_seq, 1);
        assert_eq!(second.verifier_nonce.as_deref(), Some("remote"));
    }
}
