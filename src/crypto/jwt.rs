//! Shared-secret JWT signing (HS256).
//!
//! Wire envelope: `{"type": "JWT", "jwt": "<compact JWS>"}` with claims
//! `{message, messageSeq, signerNonce, verifierNonce?}`.

use std::collections::HashSet;
use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::nonce::NonceBinding;
use super::signer::MessageSigner;
use crate::core::SignalingError;
use crate::core::constants::SIGNING_TYPE_JWT;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JwtClaims {
    message: Value,
    message_seq: u64,
    signer_nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verifier_nonce: Option<String>,
}

/// Signs and verifies messages with a secret shared with the device.
pub struct JwtMessageSigner {
    key_id: Option<String>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    binding: NonceBinding,
}

impl JwtMessageSigner {
    /// Create a signer. `key_id` goes into the `kid` header when set.
    pub fn new(shared_secret: &str, key_id: Option<String>) -> Self {
        Self::with_binding(shared_secret, key_id, NonceBinding::new())
    }

    fn with_binding(shared_secret: &str, key_id: Option<String>, binding: NonceBinding) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_aud = false;

        Self {
            key_id,
            encoding: EncodingKey::from_secret(shared_secret.as_bytes()),
            decoding: DecodingKey::from_secret(shared_secret.as_bytes()),
            validation,
            binding,
        }
    }

    /// This side's session nonce.
    pub fn nonce(&self) -> &str {
        self.binding.nonce()
    }
}

impl fmt::Debug for JwtMessageSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtMessageSigner")
            .field("key_id", &self.key_id)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl MessageSigner for JwtMessageSigner {
    fn sign(&mut self, message: Value) -> Result<Value, SignalingError> {
        let ctx = self.binding.next_sign()?;

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        header.kid = self.key_id.clone();

        let claims = JwtClaims {
            message,
            message_seq: ctx.message_seq,
            signer_nonce: ctx.signer_nonce,
            verifier_nonce: ctx.verifier_nonce,
        };
        let jwt = jsonwebtoken::encode(&header, &claims, &self.encoding)
            .map_err(|err| SignalingError::verification(format!("Failed to sign message: {err}")))?;
        Ok(json!({ "type": SIGNING_TYPE_JWT, "jwt": jwt }))
    }

    fn verify(&mut self, token: Value) -> Result<Value, SignalingError> {
        let Some(jwt) = token.get("jwt").and_then(Value::as_str) else {
            return Err(SignalingError::decode(
                "JwtMessageSigner::verify failed, token is not a valid JWT object",
            ));
        };

        let data = jsonwebtoken::decode::<JwtClaims>(jwt, &self.decoding, &self.validation)
            .map_err(|err| SignalingError::verification(format!("Invalid JWT: {err}")))?;
        let claims = data.claims;

        self.binding.verify(
            claims.message_seq,
            &claims.signer_nonce,
            claims.verifier_nonce.as_deref(),
        )?;
        Ok(claims.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SignalingErrorCode;

    fn pair() -> (JwtMessageSigner, JwtMessageSigner) {
        (
            JwtMessageSigner::with_binding("secret", Some("default".into()), NonceBinding::with_nonce("client")),
            JwtMessageSigner::with_binding("secret", Some("default".into()), NonceBinding::with_nonce("device")),
        )
    }

    fn claims_of(envelope: &Value) -> Value {
        let jwt = envelope["jwt"].as_str().unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        let data = jsonwebtoken::decode::<Value>(jwt, &DecodingKey::from_secret(b"secret"), &validation).unwrap();
        assert_eq!(data.header.kid.as_deref(), Some("default"));
        data.claims
    }

    #[test]
    fn test_envelope_and_claims() {
        let (mut client, _) = pair();
        let envelope = client.sign(json!({"type": "SETUP_REQUEST"})).unwrap();
        assert_eq!(envelope["type"], "JWT");

        let claims = claims_of(&envelope);
        assert_eq!(claims["message"], json!({"type": "SETUP_REQUEST"}));
        assert_eq!(claims["messageSeq"], 0);
        assert_eq!(claims["signerNonce"], "client");
        assert!(claims.get("verifierNonce").is_none());
    }

    #[test]
    fn test_conversation_between_peers() {
        let (mut client, mut device) = pair();

        let request = client.sign(json!({"n": 0})).unwrap();
        assert_eq!(device.verify(request).unwrap(), json!({"n": 0}));

        let response = device.sign(json!({"n": 1})).unwrap();
        assert_eq!(claims_of(&response)["verifierNonce"], "client");
        assert_eq!(client.verify(response).unwrap(), json!({"n": 1}));

        let next = client.sign(json!({"n": 2})).unwrap();
        assert_eq!(claims_of(&next)["verifierNonce"], "device");
        assert_eq!(device.verify(next).unwrap(), json!({"n": 2}));
    }

    #[test]
    fn test_wrong_secret_is_verification_error() {
        let (mut client, _) = pair();
        let mut other = JwtMessageSigner::new("not the secret", None);
        let envelope = client.sign(json!(1)).unwrap();
        let err = other.verify(envelope).unwrap_err();
        assert_eq!(err.code, SignalingErrorCode::VerificationError);
    }

    #[test]
    fn test_missing_jwt_is_decode_error() {
        let (mut client, _) = pair();
        let err = client.verify(json!({"type": "JWT"})).unwrap_err();
        assert_eq!(err.code, SignalingErrorCode::DecodeError);
        let err = client.verify(json!({"type": "JWT", "jwt": 5})).unwrap_err();
        assert_eq!(err.code, SignalingErrorCode::DecodeError);
    }

    #[test]
    fn test_replayed_message_rejected() {
        let (mut client, mut device) = pair();
        let request = client.sign(json!("hello")).unwrap();
        device.verify(request.clone()).unwrap();
        let err = device.verify(request).unwrap_err();
        assert_eq!(err.code, SignalingErrorCode::VerificationError);
    }

    #[test]
    fn test_second_sign_before_reply_is_refused() {
        let (mut client, mut device) = pair();
        client.sign(json!(0)).unwrap();
        let err = client.sign(json!(1)).unwrap_err();
        assert_eq!(err.code, SignalingErrorCode::VerificationError);

        let reply = device.sign(json!("r")).unwrap();
        client.verify(reply).unwrap();
        let signed = client.sign(json!(1)).unwrap();
        assert_eq!(claims_of(&signed)["messageSeq"], 1);
    }
}
