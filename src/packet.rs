//! Packet layout and the stream codec.
//!
//! The sender cuts its input into fixed-length [`Packet`]s once, at startup,
//! and the receiver glues accepted packets back together at the end of the
//! run.  This module is responsible for:
//! - Defining the on-wire layout of a single packet.
//! - Splitting a byte payload into sequence-numbered, zero-padded packets.
//! - Reassembling an in-order run of packets into the original bytes.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! The sequence number trails the payload and is **big-endian**.
//!
//! ```text
//!  0                               P                 P+2
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Payload segment (P bytes)  | Sequence Number  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `P` is fixed per transfer: `packet_len − SEQ_BITS` bits.  The last segment
//! of a stream is padded with zero bytes up to `P`.

use thiserror::Error;

use crate::config::Padding;

/// Width of the sequence-number field in bits.
pub const SEQ_BITS: usize = 16;

/// Width of the sequence-number field in bytes.
pub const SEQ_BYTES: usize = SEQ_BITS / 8;

/// Largest number of packets one stream may hold.
///
/// Sequence numbers do not wrap; position and sequence number are the same
/// value for the whole transfer.
pub const MAX_PACKETS: usize = 1 << SEQ_BITS;

/// Sequence number carried in every packet.
pub type SeqNum = u16;

/// One fixed-length unit of transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Position of this packet in the stream.
    pub seq: SeqNum,
    /// Payload segment, already padded to the format's payload width.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Serialise this packet into its wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.payload.len() + SEQ_BYTES);
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf
    }
}

/// Geometry shared by both ends of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketFormat {
    payload_len: usize,
}

impl PacketFormat {
    /// A format carrying `payload_len` payload bytes per packet.
    pub fn new(payload_len: usize) -> Self {
        Self { payload_len }
    }

    /// Encoded packet length in bytes.
    pub fn packet_len(&self) -> usize {
        self.payload_len + SEQ_BYTES
    }

    /// Parse a [`Packet`] from its wire layout.
    ///
    /// Returns [`Err`] if `buf` cannot hold a sequence number or is not
    /// exactly one packet long for this format.
    pub fn decode(&self, buf: &[u8]) -> Result<Packet, PacketError> {
        if buf.len() < SEQ_BYTES {
            return Err(PacketError::BufferTooShort);
        }
        if buf.len() != self.packet_len() {
            return Err(PacketError::LengthMismatch {
                expected: self.packet_len(),
                actual: buf.len(),
            });
        }
        let (payload, seq) = buf.split_at(self.payload_len);
        Ok(Packet {
            seq: u16::from_be_bytes([seq[0], seq[1]]),
            payload: payload.to_vec(),
        })
    }

    /// Cut `data` into sequence-numbered packets.
    ///
    /// The final packet is zero-padded.  An empty input produces no packets.
    pub fn packetize(&self, data: &[u8]) -> Result<Vec<Packet>, PacketError> {
        if self.payload_len == 0 {
            return Err(PacketError::EmptyPayload);
        }
        let count = data.len().div_ceil(self.payload_len);
        if count > MAX_PACKETS {
            return Err(PacketError::StreamTooLong { packets: count });
        }

        Ok(data
            .chunks(self.payload_len)
            .enumerate()
            .map(|(i, chunk)| {
                let mut payload = chunk.to_vec();
                payload.resize(self.payload_len, 0);
                Packet {
                    seq: i as SeqNum,
                    payload,
                }
            })
            .collect())
    }
}

/// Concatenate the payloads of `packets` in order and remove zero padding.
pub fn reassemble(packets: &[Packet], padding: Padding) -> Vec<u8> {
    let mut data: Vec<u8> = packets
        .iter()
        .flat_map(|p| p.payload.iter().copied())
        .collect();

    match padding {
        Padding::StripTrailing => {
            let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            data.truncate(end);
        }
        Padding::StripAll => data.retain(|&b| b != 0),
    }
    data
}

/// Errors raised while building or parsing packets.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer shorter than the sequence-number field.
    #[error("buffer too short to contain a sequence number")]
    BufferTooShort,
    /// Buffer is not exactly one packet long.
    #[error("packet is {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    /// The format carries no payload bytes.
    #[error("packet format has no room for payload")]
    EmptyPayload,
    /// The input needs more packets than the sequence field can number.
    #[error("input needs {packets} packets; at most 65536 fit a 16-bit sequence field")]
    StreamTooLong { packets: usize },
}
