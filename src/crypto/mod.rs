//! Message authentication.
//!
//! Every signaling payload is wrapped in an envelope carrying a message
//! sequence number and the nonce pair of the session:
//!
//! - [`MessageSigner`]: the sign/verify seam
//! - [`NoneMessageSigner`]: unsigned pass-through
//! - [`JwtMessageSigner`]: HS256 with a shared secret (requires the `jwt` feature)
//! - [`NonceBinding`]: the sequence and nonce checks both signers build on
//!
//! The message sequence here is independent of the reliability sequence.

#[cfg(feature = "jwt")]
mod jwt;
mod nonce;
mod signer;

#[cfg(feature = "jwt")]
#[cfg_attr(docsrs, doc(cfg(feature = "jwt")))]
pub use jwt::JwtMessageSigner;
pub use nonce::{NonceBinding, SignContext};
pub use signer::{MessageSigner, NoneMessageSigner};
