//! In-process, ordered, unbounded channels.
//!
//! The two engines never share a wire; they share two [`channel`]s instead:
//! one carrying [`Frame`]s from sender to receiver, one carrying cumulative
//! ack numbers back.  Both are thin wrappers around
//! `tokio::sync::mpsc::unbounded_channel` with the two properties the
//! protocol relies on:
//! - enqueue never blocks and never fails from the caller's point of view;
//! - dequeue waits at most a caller-supplied interval, so loops can recheck
//!   their own exit conditions between items.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

/// One item on the data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An encoded packet (see [`crate::packet`]).
    Data(Vec<u8>),
    /// End of stream.  Always the last frame the sender enqueues.
    End,
}

/// Outcome of a bounded-wait dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum Recv<T> {
    /// An item arrived.
    Item(T),
    /// Nothing arrived within the wait interval.
    Empty,
    /// Every sender is gone and the queue is drained.
    Closed,
}

/// Create a connected sending/receiving pair.
pub fn channel<T>() -> (ChannelTx<T>, ChannelRx<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelTx { inner: tx }, ChannelRx { inner: rx })
}

/// Sending half.  Cheap to clone.
#[derive(Debug)]
pub struct ChannelTx<T> {
    inner: mpsc::UnboundedSender<T>,
}

impl<T> Clone for ChannelTx<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> ChannelTx<T> {
    /// Enqueue `item`.
    ///
    /// If the receiving half has been dropped the item is discarded; the
    /// caller has nobody left to talk to and carries on regardless.
    pub fn send(&self, item: T) {
        if self.inner.send(item).is_err() {
            log::debug!("channel receiver dropped; discarding item");
        }
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct ChannelRx<T> {
    inner: mpsc::UnboundedReceiver<T>,
}

impl<T> ChannelRx<T> {
    /// Wait up to `wait` for the next item.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Recv<T> {
        match timeout(wait, self.inner.recv()).await {
            Ok(Some(item)) => Recv::Item(item),
            Ok(None) => Recv::Closed,
            Err(_elapsed) => Recv::Empty,
        }
    }

    /// Take the next item if one is already queued.
    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<T> {
        self.inner.try_recv().ok()
    }
}
