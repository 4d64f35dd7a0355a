//! Go-Back-N send-side state machine.
//!
//! [`SendWindow`] owns the packet stream for the whole transfer together with
//! the per-packet ack flags and retransmit timers.  It decides *what* goes on
//! the wire; the caller ([`crate::transfer::SenderEngine`]) decides *when*
//! and puts the resulting [`Transmission`]s on the data channel.
//!
//! # Protocol contract
//!
//! - At most `window_size` positions, `[base, base + window_size)`, are ever
//!   transmitted, and only those positions carry an armed timer.
//! - Every transmission attempt, first send or resend, bumps one attempt
//!   counter.  The [`LossPolicy`] decides from that counter whether the
//!   attempt is lost; a lost attempt still arms its timer.
//! - A new ack slides the window by exactly one position and transmits the
//!   packet that slid into view.  A repeated ack changes nothing.
//! - On timeout the caller retransmits **all** positions in the window
//!   (go back to N).
//!
//! This module only manages state; all channel I/O is the caller's
//! responsibility.

use std::time::Duration;

use tokio::time::Instant;

use crate::packet::{Packet, SeqNum};
use crate::simulator::LossPolicy;

// ---------------------------------------------------------------------------
// Transmission
// ---------------------------------------------------------------------------

/// One transmission attempt decided by the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    /// Sequence number of the packet.
    pub seq: SeqNum,
    /// Attempt number (1-indexed, counted across the whole transfer).
    pub attempt: u64,
    /// Encoded packet to enqueue, or `None` when the attempt was lost.
    pub wire: Option<Vec<u8>>,
}

impl Transmission {
    /// `true` when the loss simulator swallowed this attempt.
    pub fn is_lost(&self) -> bool {
        self.wire.is_none()
    }
}

/// Result of feeding one ack into the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// First ack for this position; the window moved to `base`.
    Advanced {
        base: usize,
        /// Packet that slid into the window, if the stream had one left.
        sent: Option<Transmission>,
    },
    /// The position had already been acknowledged.
    Duplicate,
    /// The ack names a position past the end of the stream.
    OutOfRange,
}

// ---------------------------------------------------------------------------
// SendWindow
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state for one transfer.
///
/// # Window layout
///
/// ```text
///   acked        base          base + window_size
///  ──────────────┼──────────────────┼──────────────────▶ positions
///                │ <── in flight ──▶│ <── not yet sent ──▶
/// ```
#[derive(Debug)]
pub struct SendWindow {
    packets: Vec<Packet>,
    window_size: usize,
    timeout: Duration,
    loss: LossPolicy,

    /// Lowest unacknowledged position.
    base: usize,
    /// Transmission attempts so far, lost ones included.
    attempts: u64,
    /// One flag per packet; set by the first ack naming it.
    acked: Vec<bool>,
    /// Time of the last (re)transmission, or `None` when disarmed.
    timers: Vec<Option<Instant>>,
    /// Sequence numbers of every lost attempt, in order.
    dropped: Vec<SeqNum>,
}

impl SendWindow {
    /// Create a window over `packets`.
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero.
    pub fn new(
        packets: Vec<Packet>,
        window_size: usize,
        timeout: Duration,
        loss: LossPolicy,
    ) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        let len = packets.len();
        Self {
            packets,
            window_size,
            timeout,
            loss,
            base: 0,
            attempts: 0,
            acked: vec![false; len],
            timers: vec![None; len],
            dropped: Vec::new(),
        }
    }

    /// Number of packets in the stream.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// `true` when the stream holds no packets at all.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Lowest unacknowledged position.
    pub fn base(&self) -> usize {
        self.base
    }

    /// One past the last position inside the window, clamped to the stream.
    pub fn window_end(&self) -> usize {
        (self.base + self.window_size).min(self.packets.len())
    }

    /// `true` once every packet has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.base >= self.packets.len()
    }

    /// Transmission attempts so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Sequence numbers of all lost attempts.
    pub fn dropped(&self) -> &[SeqNum] {
        &self.dropped
    }

    /// Whether the ack for `position` has been seen.
    pub fn is_acked(&self, position: usize) -> bool {
        self.acked.get(position).copied().unwrap_or(false)
    }

    /// Number of positions with an armed timer.
    pub fn armed_timers(&self) -> usize {
        self.timers.iter().filter(|t| t.is_some()).count()
    }

    /// Transmit every position currently inside the window.
    ///
    /// Used both for the initial burst and for every Go-Back-N resend.
    pub fn send_window(&mut self, now: Instant) -> Vec<Transmission> {
        (self.base..self.window_end())
            .map(|pos| self.transmit(pos, now))
            .collect()
    }

    /// Process an ack carrying sequence number `ack`.
    ///
    /// The timer of the position just before `ack` is cleared whatever the
    /// outcome.  A first ack also clears the timer of `ack` itself, slides
    /// the window by one and transmits the newly uncovered packet.
    pub fn on_ack(&mut self, ack: SeqNum, now: Instant) -> AckOutcome {
        let pos = ack as usize;
        if let Some(prev) = pos.checked_sub(1) {
            if let Some(timer) = self.timers.get_mut(prev) {
                *timer = None;
            }
        }

        if pos >= self.packets.len() {
            return AckOutcome::OutOfRange;
        }
        if self.acked[pos] {
            return AckOutcome::Duplicate;
        }

        debug_assert_eq!(pos, self.base, "acks arrive in order on a FIFO channel");
        self.acked[pos] = true;
        self.timers[pos] = None;
        self.base += 1;

        let next = self.base + self.window_size - 1;
        let sent = (next < self.packets.len()).then(|| self.transmit(next, now));
        AckOutcome::Advanced {
            base: self.base,
            sent,
        }
    }

    /// Find the first expired timer inside the window.
    ///
    /// The expired timer is disarmed and its sequence number returned; the
    /// caller is expected to follow up with [`SendWindow::send_window`].
    pub fn poll_timeout(&mut self, now: Instant) -> Option<SeqNum> {
        let timeout = self.timeout;
        for pos in self.base..self.window_end() {
            if let Some(sent_at) = self.timers[pos] {
                if now.saturating_duration_since(sent_at) >= timeout {
                    self.timers[pos] = None;
                    return Some(self.packets[pos].seq);
                }
            }
        }
        None
    }

    /// Earliest moment a timer inside the window can expire.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers[self.base..self.window_end()]
            .iter()
            .flatten()
            .map(|sent_at| *sent_at + self.timeout)
            .min()
    }

    fn transmit(&mut self, pos: usize, now: Instant) -> Transmission {
        self.attempts += 1;
        let packet = &self.packets[pos];
        let seq = packet.seq;
        let wire = if self.loss.is_lost(self.attempts) {
            self.dropped.push(seq);
            None
        } else {
            Some(packet.encode())
        };
        self.timers[pos] = Some(now);
        Transmission {
            seq,
            attempt: self.attempts,
            wire,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
