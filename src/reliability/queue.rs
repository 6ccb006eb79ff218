//! Queue of DATA frames awaiting acknowledgment.

use std::collections::VecDeque;

use crate::transport::ReliabilityFrame;

/// Sent DATA frames in send order, oldest first.
///
/// Entries leave only through [`UnackedQueue::ack_head`] or [`UnackedQueue::clear`].
#[derive(Debug, Default, Clone)]
pub struct UnackedQueue {
    frames: VecDeque<ReliabilityFrame>,
}

/// Outcome of applying an ACK to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The head matched and was removed.
    Removed,
    /// The head has a different sequence number; nothing changed.
    HeadMismatch {
        /// Sequence number of the current head.
        head: u64,
    },
    /// The queue is empty.
    Empty,
}

impl UnackedQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sent frame
    pub fn push(&mut self, frame: ReliabilityFrame) {
        self.frames.push_back(frame);
    }

    /// Remove the head iff its sequence number is `seq`
    pub fn ack_head(&mut self, seq: u64) -> AckOutcome {
        match self.frames.front() {
            Some(head) if head.seq == seq => {
                self.frames.pop_front();
                AckOutcome::Removed
            }
            Some(head) => AckOutcome::HeadMismatch { head: head.seq },
            None => AckOutcome::Empty,
        }
    }

    /// Sequence number of the oldest unacked frame
    pub fn head_seq(&self) -> Option<u64> {
        self.frames.front().map(|f| f.seq)
    }

    /// Iterate in send order
    pub fn iter(&self) -> impl Iterator<Item = &ReliabilityFrame> {
        self.frames.iter()
    }

    /// Number of unacked frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether every frame has been acked
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop everything (channel teardown)
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
