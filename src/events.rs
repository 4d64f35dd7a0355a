//! Protocol events and the sinks that receive them.
//!
//! Both engines report what they do as [`Event`]s handed to an
//! [`EventSink`].  The sink is an external collaborator: the engines never
//! depend on it succeeding, and a failing sink is reported through the `log`
//! facade and otherwise ignored.
//!
//! Three sinks ship with the crate:
//! - [`LogSink`] — forwards every event to `log::info!` (the default).
//! - [`WriterSink`] — writes one line per event to any [`Write`].
//! - [`RecordingSink`] — keeps events in memory so tests can inspect a run.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::packet::SeqNum;

/// Something observable that happened during a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The sender finished packetising its input.
    Prepared {
        packets: usize,
        window_size: usize,
        packet_len: usize,
        drop_period: u64,
        timeout: Duration,
    },
    /// Transmission attempt `attempt` for `seq` was placed on the data channel.
    Sent { seq: SeqNum, attempt: u64 },
    /// Transmission attempt `attempt` for `seq` was swallowed by the simulator.
    Dropped { seq: SeqNum, attempt: u64 },
    /// The timer of `seq` expired.
    TimedOut { seq: SeqNum },
    /// The whole window starting at `base` is being sent again.
    Retransmit { base: usize, packets: usize },
    /// A new ack advanced the window.
    Acked { ack: SeqNum },
    /// An ack that had already advanced the window arrived again.
    DuplicateAck { ack: SeqNum },
    /// An ack named a position outside the stream.
    StrayAck { ack: SeqNum },
    /// The sender saw every packet acknowledged.
    Complete { attempts: u64, dropped: usize },
    /// The receiver accepted `seq` in order.
    Accepted { seq: SeqNum },
    /// The receiver discarded `seq` because it expected `expected`.
    OutOfOrder { seq: SeqNum, expected: usize },
    /// The receiver flushed `bytes` bytes to the output.
    Delivered { bytes: usize },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepared {
                packets,
                window_size,
                packet_len,
                drop_period,
                timeout,
            } => write!(
                f,
                "{packets} packets created, Window size: {window_size}, \
                 Packet length: {packet_len}, Nth packet to be dropped: {drop_period}, \
                 Timeout interval: {:.3}",
                timeout.as_secs_f64()
            ),
            Self::Sent { seq, .. } => write!(f, "Sender: sending packet {seq}"),
            Self::Dropped { seq, .. } => write!(f, "Sender: packet {seq} dropped"),
            Self::TimedOut { seq } => write!(f, "Sender: packet {seq} timed out"),
            Self::Retransmit { base, packets } => {
                write!(f, "Sender: resending {packets} packet(s) from {base}")
            }
            Self::Acked { ack } => write!(f, "Sender: ack {ack} received"),
            Self::DuplicateAck { ack } => write!(f, "Sender: ack {ack} received, Ignoring"),
            Self::StrayAck { ack } => write!(f, "Sender: ack {ack} outside the stream, Ignoring"),
            Self::Complete { .. } => write!(
                f,
                "Sender: All packets have been sent and acknowledgments processed."
            ),
            Self::Accepted { seq } => write!(f, "Receiver: packet {seq} received"),
            Self::OutOfOrder { seq, .. } => {
                write!(f, "Receiver: packet {seq} received out of order")
            }
            Self::Delivered { bytes } => write!(f, "Receiver: {bytes} bytes written"),
        }
    }
}

/// Destination for protocol events.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &Event) -> io::Result<()>;
}

/// Hand `event` to `sink`, logging rather than propagating any failure.
pub(crate) fn emit(sink: &dyn EventSink, event: Event) {
    if let Err(e) = sink.record(&event) {
        log::warn!("event sink failed on {event:?}: {e}");
    }
}

/// Forwards events to the `log` facade at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: &Event) -> io::Result<()> {
        log::info!("{event}");
        Ok(())
    }
}

/// Writes each event as a line to the wrapped writer.
#[derive(Debug)]
pub struct WriterSink<W> {
    inner: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Recover the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventSink for WriterSink<W> {
    fn record(&self, event: &Event) -> io::Result<()> {
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(w, "{event}")?;
        w.flush()
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &Event) -> io::Result<()> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSink;

    impl EventSink for BrokenSink {
        fn record(&self, _event: &Event) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink gone"))
        }
    }

    #[test]
    fn display_matches_log_lines() {
        assert_eq!(
            Event::Sent { seq: 3, attempt: 4 }.to_string(),
            "Sender: sending packet 3"
        );
        assert_eq!(
            Event::DuplicateAck { ack: 0 }.to_string(),
            "Sender: ack 0 received, Ignoring"
        );
        assert_eq!(
            Event::OutOfOrder {
                seq: 2,
                expected: 1
            }
            .to_string(),
            "Receiver: packet 2 received out of order"
        );
    }

    #[test]
    fn writer_sink_writes_one_line_per_event() {
        let sink = WriterSink::new(Vec::new());
        sink.record(&Event::Accepted { seq: 0 }).unwrap();
        sink.record(&Event::Accepted { seq: 1 }).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "Receiver: packet 0 received\nReceiver: packet 1 received\n"
        );
    }

    #[test]
    fn recording_sink_preserves_order() {
        let sink = RecordingSink::new();
        emit(&sink, Event::Acked { ack: 0 });
        emit(&sink, Event::DuplicateAck { ack: 0 });
        assert_eq!(
            sink.events(),
            vec![Event::Acked { ack: 0 }, Event::DuplicateAck { ack: 0 }]
        );
    }

    #[test]
    fn failing_sink_does_not_panic() {
        emit(&BrokenSink, Event::Delivered { bytes: 5 });
    }
}
