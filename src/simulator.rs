//! Deterministic loss simulator.
//!
//! The in-process data channel never loses anything on its own.  To exercise
//! the retransmission path the sender consults a [`LossPolicy`] before every
//! transmission attempt:
//!
//! | Attempt number `K` (1-indexed) | Outcome                          |
//! |--------------------------------|----------------------------------|
//! | `K % period == 0`              | logged as dropped, never queued  |
//! | anything else                  | placed on the data channel       |
//!
//! Initial sends and retransmissions share one attempt counter, so the
//! dropped packet shifts from round to round.  The policy holds no state of
//! its own; the sender owns the counter.

use std::num::NonZeroU64;

/// Drops every `period`-th transmission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LossPolicy {
    period: Option<NonZeroU64>,
}

impl LossPolicy {
    /// Drop every `period`-th attempt; `0` disables loss entirely.
    pub fn every(period: u64) -> Self {
        Self {
            period: NonZeroU64::new(period),
        }
    }

    /// `true` when transmission attempt number `attempt` (1-indexed) is lost.
    pub fn is_lost(&self, attempt: u64) -> bool {
        match self.period {
            Some(period) => attempt % period.get() == 0,
            None => false,
        }
    }
}
