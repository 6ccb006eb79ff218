//! Reliability layer: at-least-once, in-order delivery across reconnects.
//!
//! Both sequence counters live as long as the owning client; a socket
//! reconnect never resets them.

mod layer;
mod queue;

pub use layer::{Reliability, ReliabilityHandler};
pub use queue::{AckOutcome, UnackedQueue};
