//! Sequenced, acknowledged delivery on top of the transport.
//!
//! Sending: every payload gets the next send sequence number, is kept in the
//! [`UnackedQueue`] and is handed to the [`ReliabilityHandler`]. The queue is
//! resent in full whenever the socket reconnects or the peer reappears.
//!
//! Receiving: DATA frames are acked if they are at or below the expected
//! sequence number and delivered only if they match it exactly. Anything
//! ahead of the expected number is dropped; the sender resends it later.

use serde_json::Value;
use tracing::Span;

use super::queue::{AckOutcome, UnackedQueue};
use crate::transport::{ReliabilityFrame, ReliabilityKind};

/// Outbound hook: puts a reliability frame on the wire.
pub trait ReliabilityHandler: Send + Sync {
    /// Send one frame. Called once per DATA send, ACK, and resend.
    fn send_routing_message(&self, frame: ReliabilityFrame);
}

/// The reliability state of one channel.
///
/// Not synchronized itself; the owner serializes access (the client keeps it
/// behind a mutex).
pub struct Reliability<H> {
    unacked: UnackedQueue,
    send_seq: u64,
    recv_seq: u64,
    handler: H,
    span: Span,
}

impl<H: ReliabilityHandler> Reliability<H> {
    /// Create a layer with both sequence counters at 0.
    pub fn new(handler: H, span: Span) -> Self {
        Self {
            unacked: UnackedQueue::new(),
            send_seq: 0,
            recv_seq: 0,
            handler,
            span,
        }
    }

    /// Send `data` reliably. Returns the sequence number it was assigned.
    pub fn send_reliable(&mut self, data: Value) -> u64 {
        let seq = self.send_seq;
        self.send_seq += 1;
        let frame = ReliabilityFrame::data(seq, data);
        self.unacked.push(frame.clone());
        tracing::debug!(parent: &self.span, seq, "sending reliable data");
        self.handler.send_routing_message(frame);
        seq
    }

    /// Handle an inbound frame. Returns the payload to deliver, if any.
    pub fn handle_frame(&mut self, frame: ReliabilityFrame) -> Option<Value> {
        match frame.kind {
            ReliabilityKind::Ack => {
                self.handle_ack(frame.seq);
                None
            }
            ReliabilityKind::Data => self.handle_data(frame),
        }
    }

    fn handle_ack(&mut self, seq: u64) {
        match self.unacked.ack_head(seq) {
            AckOutcome::Removed => {
                tracing::trace!(parent: &self.span, seq, "data acked");
            }
            AckOutcome::HeadMismatch { head } => {
                tracing::info!(
                    parent: &self.span,
                    seq,
                    head,
                    "ACK does not match the first unacked sequence number"
                );
            }
            AckOutcome::Empty => {
                tracing::info!(parent: &self.span, seq, "ACK received but nothing is unacked");
            }
        }
    }

    fn handle_data(&mut self, frame: ReliabilityFrame) -> Option<Value> {
        if frame.seq <= self.recv_seq {
            self.handler.send_routing_message(ReliabilityFrame::ack(frame.seq));
        }

        if frame.seq != self.recv_seq {
            tracing::info!(
                parent: &self.span,
                seq = frame.seq,
                expected = self.recv_seq,
                "data out of sequence, expected on connect and reconnect"
            );
            return None;
        }

        self.recv_seq += 1;
        if frame.data.is_none() {
            tracing::debug!(parent: &self.span, seq = frame.seq, "DATA frame without payload");
        }
        frame.data
    }

    /// The socket (re)connected: resend every unacked frame.
    pub fn handle_connect(&mut self) {
        self.resend_unacked();
    }

    /// The peer (re)appeared: resend every unacked frame.
    pub fn handle_peer_connected(&mut self) {
        self.resend_unacked();
    }

    fn resend_unacked(&self) {
        if !self.unacked.is_empty() {
            tracing::debug!(parent: &self.span, count = self.unacked.len(), "resending unacked data");
        }
        for frame in self.unacked.iter() {
            self.handler.send_routing_message(frame.clone());
        }
    }

    /// Drop all unacked frames (channel teardown). Counters are kept.
    pub fn clear(&mut self) {
        self.unacked.clear();
    }

    /// Next sequence number to be sent
    pub fn send_seq(&self) -> u64 {
        self.send_seq
    }

    /// Next sequence number expected from the peer
    pub fn recv_seq(&self) -> u64 {
        self.recv_seq
    }

    /// The unacked frames
    pub fn unacked(&self) -> &UnackedQueue {
        &self.unacked
    }
}
