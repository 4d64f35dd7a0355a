//! Go-Back-N engines and the transfer driver.
//!
//! # Architecture
//!
//! ```text
//!   input (Read)
//!      │ packetize once
//!      ▼
//!  SenderEngine ──────────── Frame::Data / Frame::End ───────────▶ ReceiverEngine
//!   ├─ main loop: timer scan + Go-Back-N resend                     ├─ GbnReceiver
//!   ├─ ack task:  window advance, paced                             └─ flush ─▶ output (Write)
//!   └─ Arc<Mutex<SendWindow>>  ◀────────── cumulative acks ──────────┘
//! ```
//!
//! The sender runs as two tokio tasks sharing one [`SendWindow`].  Every
//! window operation happens inside a single critical section, and whatever
//! it decides to transmit is enqueued before the lock is released, so the
//! data channel sees attempts in attempt-counter order.  No lock is ever
//! held across an `.await`.
//!
//! The receiver is a single task polling the data channel.
//!
//! [`run_transfer`] wires both engines together for one payload:
//!
//! ```ignore
//! let report = run_transfer(&Config::default(), &b"HELLO"[..], Vec::new(), Arc::new(LogSink)).await?;
//! assert_eq!(report.delivered, b"HELLO");
//! ```

use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::Instant;

use crate::channel::{channel, ChannelRx, ChannelTx, Frame, Recv};
use crate::config::{Config, ConfigError, Padding};
use crate::events::{emit, Event, EventSink};
use crate::gbn_receiver::{GbnReceiver, Verdict};
use crate::gbn_sender::{AckOutcome, SendWindow, Transmission};
use crate::packet::{PacketError, PacketFormat, SeqNum};
use crate::simulator::LossPolicy;

// ---------------------------------------------------------------------------
// Errors and reports
// ---------------------------------------------------------------------------

/// Errors that stop a transfer before or around the protocol run.
///
/// Nothing inside the protocol itself fails; loss and reordering are handled
/// by retransmission.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot packetize input: {0}")]
    Packet(#[from] PacketError),
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
    #[error("engine task failed: {0}")]
    Join(#[from] JoinError),
}

/// What the sender did over a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    /// Packets in the stream.
    pub packets: usize,
    /// Transmission attempts, lost ones included.
    pub attempts: u64,
    /// Sequence number of every lost attempt, in order.
    pub dropped: Vec<SeqNum>,
    /// Timer expiries that triggered a Go-Back-N resend.
    pub timeouts: u64,
}

/// Combined outcome of [`run_transfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub sender: SenderReport,
    /// Bytes the receiver reconstructed and wrote to the output.
    pub delivered: Vec<u8>,
}

// ---------------------------------------------------------------------------
// SenderEngine
// ---------------------------------------------------------------------------

/// Drives a [`SendWindow`] to completion over the data and ack channels.
pub struct SenderEngine {
    window: SendWindow,
    data_tx: ChannelTx<Frame>,
    ack_rx: ChannelRx<SeqNum>,
    sink: Arc<dyn EventSink>,
    ack_pacing: Duration,
    poll_interval: Duration,
}

impl SenderEngine {
    /// Packetize `payload` and prepare a sender for it.
    pub fn new(
        config: &Config,
        payload: &[u8],
        data_tx: ChannelTx<Frame>,
        ack_rx: ChannelRx<SeqNum>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, TransferError> {
        config.validate()?;
        let packets = PacketFormat::new(config.payload_bytes()).packetize(payload)?;

        emit(
            sink.as_ref(),
            Event::Prepared {
                packets: packets.len(),
                window_size: config.window_size,
                packet_len: config.packet_len,
                drop_period: config.drop_period,
                timeout: config.timeout,
            },
        );

        Ok(Self {
            window: SendWindow::new(
                packets,
                config.window_size,
                config.timeout,
                LossPolicy::every(config.drop_period),
            ),
            data_tx,
            ack_rx,
            sink,
            ack_pacing: config.ack_pacing,
            poll_interval: config.poll_interval,
        })
    }

    /// Read all of `input` once and prepare a sender for it.
    pub fn from_reader<R: Read>(
        config: &Config,
        mut input: R,
        data_tx: ChannelTx<Frame>,
        ack_rx: ChannelRx<SeqNum>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, TransferError> {
        let mut payload = Vec::new();
        input.read_to_end(&mut payload)?;
        Self::new(config, &payload, data_tx, ack_rx, sink)
    }

    /// Run until every packet is acknowledged, then send the end-of-stream
    /// sentinel.
    ///
    /// There is no retry cap: with a loss period of 1 this never returns.
    pub async fn run(self) -> SenderReport {
        let Self {
            window,
            data_tx,
            ack_rx,
            sink,
            ack_pacing,
            poll_interval,
        } = self;
        let window = Arc::new(Mutex::new(window));

        {
            let mut w = lock(&window);
            let burst = w.send_window(Instant::now());
            dispatch(&data_tx, sink.as_ref(), burst);
        }

        let acks = tokio::spawn(consume_acks(
            Arc::clone(&window),
            ack_rx,
            data_tx.clone(),
            Arc::clone(&sink),
            ack_pacing,
            poll_interval,
        ));

        let mut timeouts = 0u64;
        loop {
            let now = Instant::now();
            let deadline = {
                let mut w = lock(&window);
                if w.is_complete() {
                    break;
                }
                match w.poll_timeout(now) {
                    Some(seq) => {
                        timeouts += 1;
                        emit(sink.as_ref(), Event::TimedOut { seq });
                        let base = w.base();
                        let resend = w.send_window(now);
                        emit(
                            sink.as_ref(),
                            Event::Retransmit {
                                base,
                                packets: resend.len(),
                            },
                        );
                        dispatch(&data_tx, sink.as_ref(), resend);
                        continue;
                    }
                    None => w.next_deadline(),
                }
            };

            let wake = match deadline {
                Some(d) => d.min(now + poll_interval),
                None => now + poll_interval,
            };
            tokio::time::sleep_until(wake).await;
        }

        data_tx.send(Frame::End);
        if let Err(e) = acks.await {
            log::error!("ack consumer task failed: {e}");
        }

        let w = lock(&window);
        emit(
            sink.as_ref(),
            Event::Complete {
                attempts: w.attempts(),
                dropped: w.dropped().len(),
            },
        );
        SenderReport {
            packets: w.len(),
            attempts: w.attempts(),
            dropped: w.dropped().to_vec(),
            timeouts,
        }
    }
}

/// Drain the ack channel into the window until the transfer completes.
///
/// Sleeps for `pacing` after each ack so that window advances never race
/// ahead of a resend the main loop is about to make.
async fn consume_acks(
    window: Arc<Mutex<SendWindow>>,
    mut ack_rx: ChannelRx<SeqNum>,
    data_tx: ChannelTx<Frame>,
    sink: Arc<dyn EventSink>,
    pacing: Duration,
    poll_interval: Duration,
) {
    loop {
        let done = lock(&window).is_complete();
        if done {
            break;
        }

        let ack = match ack_rx.recv_timeout(poll_interval).await {
            Recv::Item(ack) => ack,
            Recv::Empty => continue,
            Recv::Closed => {
                log::debug!("ack channel closed");
                break;
            }
        };

        {
            let mut w = lock(&window);
            match w.on_ack(ack, Instant::now()) {
                AckOutcome::Advanced { sent, .. } => {
                    emit(sink.as_ref(), Event::Acked { ack });
                    dispatch(&data_tx, sink.as_ref(), sent);
                }
                AckOutcome::Duplicate => emit(sink.as_ref(), Event::DuplicateAck { ack }),
                AckOutcome::OutOfRange => {
                    log::warn!("ack {ack} names no packet in the stream");
                    emit(sink.as_ref(), Event::StrayAck { ack });
                }
            }
        }

        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }
}

/// Log each transmission and enqueue the ones that were not lost.
fn dispatch(
    data_tx: &ChannelTx<Frame>,
    sink: &dyn EventSink,
    txs: impl IntoIterator<Item = Transmission>,
) {
    for tx in txs {
        let Transmission { seq, attempt, wire } = tx;
        emit(sink, Event::Sent { seq, attempt });
        match wire {
            Some(bytes) => data_tx.send(Frame::Data(bytes)),
            None => emit(sink, Event::Dropped { seq, attempt }),
        }
    }
}

fn lock(window: &Mutex<SendWindow>) -> MutexGuard<'_, SendWindow> {
    window.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// ReceiverEngine
// ---------------------------------------------------------------------------

/// Feeds the data channel into a [`GbnReceiver`] and flushes the result.
pub struct ReceiverEngine<W> {
    receiver: GbnReceiver,
    format: PacketFormat,
    padding: Padding,
    data_rx: ChannelRx<Frame>,
    ack_tx: ChannelTx<SeqNum>,
    output: W,
    sink: Arc<dyn EventSink>,
    poll_interval: Duration,
}

impl<W: Write> ReceiverEngine<W> {
    pub fn new(
        config: &Config,
        data_rx: ChannelRx<Frame>,
        ack_tx: ChannelTx<SeqNum>,
        output: W,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            receiver: GbnReceiver::new(),
            format: PacketFormat::new(config.payload_bytes()),
            padding: config.padding,
            data_rx,
            ack_tx,
            output,
            sink,
            poll_interval: config.poll_interval,
        }
    }

    /// Receive until the end-of-stream sentinel, then write the reassembled
    /// payload to the output exactly once.
    ///
    /// Returns the bytes handed to the output.  A failed write is logged; the
    /// bytes are still returned.
    pub async fn run(mut self) -> Vec<u8> {
        loop {
            match self.data_rx.recv_timeout(self.poll_interval).await {
                Recv::Item(Frame::Data(bytes)) => self.on_frame(&bytes),
                Recv::Item(Frame::End) => break,
                Recv::Empty => continue,
                Recv::Closed => {
                    log::warn!("data channel closed before end of stream");
                    break;
                }
            }
        }
        self.flush()
    }

    fn on_frame(&mut self, bytes: &[u8]) {
        let packet = match self.format.decode(bytes) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("discarding malformed frame: {e}");
                return;
            }
        };

        let verdict = self.receiver.on_packet(packet);
        if let Some(ack) = verdict.ack() {
            self.ack_tx.send(ack);
        }
        match verdict {
            Verdict::Accepted { ack } => emit(self.sink.as_ref(), Event::Accepted { seq: ack }),
            Verdict::Discarded { seq, expected, .. } => {
                emit(self.sink.as_ref(), Event::OutOfOrder { seq, expected })
            }
        }
    }

    fn flush(mut self) -> Vec<u8> {
        let data = self.receiver.reassemble(self.padding);
        let written = self
            .output
            .write_all(&data)
            .and_then(|()| self.output.flush());
        match written {
            Ok(()) => emit(self.sink.as_ref(), Event::Delivered { bytes: data.len() }),
            Err(e) => log::error!("failed to write {} received bytes: {e}", data.len()),
        }
        data
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Transfer everything `input` yields to `output` through a lossy
/// Go-Back-N link.
///
/// The receiver runs as its own task; the sender runs on the caller's task
/// and spawns its ack consumer.
pub async fn run_transfer<R, W>(
    config: &Config,
    input: R,
    output: W,
    sink: Arc<dyn EventSink>,
) -> Result<TransferReport, TransferError>
where
    R: Read,
    W: Write + Send + 'static,
{
    let (data_tx, data_rx) = channel();
    let (ack_tx, ack_rx) = channel();

    let sender = SenderEngine::from_reader(config, input, data_tx, ack_rx, Arc::clone(&sink))?;
    let receiver = ReceiverEngine::new(config, data_rx, ack_tx, output, sink);

    let receiving = tokio::spawn(receiver.run());
    let sender = sender.run().await;
    let delivered = receiving.await?;

    Ok(TransferReport { sender, delivered })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
