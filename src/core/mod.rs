//! Core types shared by every layer.
//!
//! - [`constants`]: wire strings and timing defaults
//! - `error`: the error taxonomy
//! - `traits`: the socket seam ([`Connector`])
//! - `observer`: observer registry with [`Subscription`] handles

pub mod constants;
mod error;
mod observer;
mod traits;

pub use error::*;
pub use observer::{Observers, Subscription};
pub use traits::*;
