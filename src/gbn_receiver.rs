//! Go-Back-N receive-side state machine.
//!
//! [`GbnReceiver`] implements the receiver side of Go-Back-N:
//!
//! - Only the packet carrying `expected_seq` is accepted.
//! - Everything else (duplicates, packets past a gap) is discarded; nothing
//!   is buffered out of order.
//! - Every packet, accepted or not, is answered with a cumulative ack: the
//!   accepted sequence number, or `expected_seq − 1` to re-assert the last
//!   good position after a discard.
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility (see [`crate::transfer::ReceiverEngine`]).

use crate::config::Padding;
use crate::packet::{reassemble, Packet, SeqNum};

/// What the receiver made of one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// In order; appended to the buffer.  Ack with `ack`.
    Accepted { ack: SeqNum },
    /// Out of order or duplicate; dropped.
    ///
    /// `ack` re-asserts the last in-order position, or is `None` when
    /// nothing has been accepted yet.
    Discarded {
        seq: SeqNum,
        expected: usize,
        ack: Option<SeqNum>,
    },
}

impl Verdict {
    /// Ack to send back for this packet, if any.
    pub fn ack(&self) -> Option<SeqNum> {
        match self {
            Self::Accepted { ack } => Some(*ack),
            Self::Discarded { ack, .. } => *ack,
        }
    }
}

/// Go-Back-N receive-side state for one transfer.
#[derive(Debug, Default)]
pub struct GbnReceiver {
    /// Next in-order position.
    expected_seq: usize,
    /// Accepted packets; always positions `0..expected_seq`.
    accepted: Vec<Packet>,
}

impl GbnReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number the receiver will accept.
    pub fn expected_seq(&self) -> usize {
        self.expected_seq
    }

    /// Accepted packets in sequence order.
    pub fn accepted(&self) -> &[Packet] {
        &self.accepted
    }

    /// Process one inbound packet.
    pub fn on_packet(&mut self, packet: Packet) -> Verdict {
        let seq = packet.seq;
        if seq as usize == self.expected_seq {
            self.accepted.push(packet);
            self.expected_seq += 1;
            Verdict::Accepted { ack: seq }
        } else {
            Verdict::Discarded {
                seq,
                expected: self.expected_seq,
                ack: self.expected_seq.checked_sub(1).map(|a| a as SeqNum),
            }
        }
    }

    /// Concatenate every accepted payload and strip padding.
    pub fn reassemble(&self, padding: Padding) -> Vec<u8> {
        reassemble(&self.accepted, padding)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
