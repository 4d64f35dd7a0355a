//! `gbn-arq` — Go-Back-N reliable delivery over a lossy in-process channel.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   data channel (Frame)   ┌──────────┐
//!  │  Sender  │─────────────────────────▶│ Receiver │
//!  └────┬─────┘                          └─────┬────┘
//!       │                                      │
//!       │        ack channel (SeqNum)          │
//!       │◀─────────────────────────────────────┘
//!       │
//!  ┌────▼─────────────────────┐
//!  │ LossPolicy: every Nth    │
//!  │ attempt never leaves     │
//!  └──────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]       — packet layout, packetize / reassemble
//! - [`channel`]      — ordered unbounded channels with bounded-wait receive
//! - [`simulator`]    — deterministic loss policy
//! - [`gbn_sender`]   — GBN sliding-window state machine
//! - [`gbn_receiver`] — GBN in-order acceptance state machine
//! - [`transfer`]     — sender/receiver engines and the transfer driver
//! - [`events`]       — protocol events and their sinks
//! - [`config`]       — transfer parameters and validation

pub mod channel;
pub mod config;
pub mod events;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod packet;
pub mod simulator;
pub mod transfer;

pub use config::{Config, ConfigError, Padding};
pub use events::{Event, EventSink, LogSink, RecordingSink, WriterSink};
pub use transfer::{run_transfer, ReceiverEngine, SenderEngine, SenderReport, TransferError, TransferReport};
