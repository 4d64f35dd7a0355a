//! Transfer configuration.
//!
//! A [`Config`] carries every knob both engines need: the window size, the
//! packet geometry, the loss simulator period and the timing parameters of
//! the sender's retransmit loop.  The binary fills it from CLI flags; tests
//! build it directly with struct-update syntax over [`Config::default`].
//!
//! [`Config::validate`] must pass before a transfer starts.  Nothing inside
//! the engines re-checks these values.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::packet::SEQ_BITS;

/// How the receiver removes zero padding from the reassembled stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// Drop only the zero bytes at the very end of the stream.
    ///
    /// Interior zero bytes survive the transfer.
    #[default]
    StripTrailing,
    /// Drop every zero byte, wherever it appears.
    StripAll,
}

impl FromStr for Padding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trailing" | "strip-trailing" => Ok(Self::StripTrailing),
            "all" | "strip-all" => Ok(Self::StripAll),
            other => Err(ConfigError::UnknownPadding(other.to_string())),
        }
    }
}

/// Parameters of one Go-Back-N transfer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of unacknowledged packets in flight (N of Go-Back-N).
    pub window_size: usize,
    /// Total packet width in bits, including the [`SEQ_BITS`] sequence field.
    pub packet_len: usize,
    /// Every `drop_period`-th transmission attempt is simulated lost.
    ///
    /// `0` disables the loss simulator.
    pub drop_period: u64,
    /// Time after which an unacknowledged packet is considered lost.
    pub timeout: Duration,
    /// Pause taken by the ack consumer after each processed ack.
    pub ack_pacing: Duration,
    /// Upper bound on how long any channel poll or timer scan waits.
    pub poll_interval: Duration,
    /// De-padding applied by the receiver at flush time.
    pub padding: Padding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: 3,
            packet_len: 24,
            drop_period: 4,
            timeout: Duration::from_millis(500),
            ack_pacing: Duration::from_millis(200),
            poll_interval: Duration::from_millis(10),
            padding: Padding::StripTrailing,
        }
    }
}

impl Config {
    /// Check that the configuration describes a runnable transfer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.packet_len <= SEQ_BITS {
            return Err(ConfigError::PacketTooShort(self.packet_len));
        }
        if (self.packet_len - SEQ_BITS) % 8 != 0 {
            return Err(ConfigError::UnalignedPayload(self.packet_len - SEQ_BITS));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.drop_period == 1 {
            // Every attempt is lost; the sender will retry forever.
            log::warn!("drop_period = 1 drops every transmission; the transfer cannot finish");
        } else if self.drop_period != 0 && self.drop_period as usize <= self.window_size {
            // A resend round of k packets with drop_period | k loses the base
            // packet on every round once it has been lost once.
            log::warn!(
                "drop_period {} <= window_size {}; Go-Back-N resends may never recover",
                self.drop_period,
                self.window_size
            );
        }
        Ok(())
    }

    /// Payload bytes carried by each packet.
    pub fn payload_bytes(&self) -> usize {
        self.packet_len.saturating_sub(SEQ_BITS) / 8
    }
}

/// Reasons a [`Config`] is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    ZeroWindow,
    #[error("packet length {0} bits leaves no room for payload after the 16-bit sequence field")]
    PacketTooShort(usize),
    #[error("payload width of {0} bits is not a whole number of bytes")]
    UnalignedPayload(usize),
    #[error("timeout interval must be greater than zero")]
    ZeroTimeout,
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("unknown padding mode {0:?} (expected \"trailing\" or \"all\")")]
    UnknownPadding(String),
}
