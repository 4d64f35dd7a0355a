//! Integration tests for the Go-Back-N transfer.
//!
//! Each test runs a complete sender/receiver pair over the in-process
//! channels via `run_transfer`, with short timeouts so the retransmission
//! path is exercised quickly.  Assertions are made on the delivered bytes,
//! the sender report, and the event trace captured by a `RecordingSink`.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use gbn_arq::{
    run_transfer, Config, ConfigError, Event, Padding, RecordingSink, TransferError, WriterSink,
};

/// Fast settings: timeouts fire quickly, acks are barely paced.
fn fast(window_size: usize, packet_len: usize, drop_period: u64) -> Config {
    Config {
        window_size,
        packet_len,
        drop_period,
        timeout: Duration::from_millis(150),
        ack_pacing: Duration::from_millis(5),
        poll_interval: Duration::from_millis(5),
        padding: Padding::StripTrailing,
    }
}

async fn transfer(config: &Config, input: &[u8], sink: Arc<RecordingSink>) -> gbn_arq::TransferReport {
    tokio::time::timeout(
        Duration::from_secs(30),
        run_transfer(config, input, Vec::new(), sink),
    )
    .await
    .expect("transfer did not finish")
    .expect("transfer failed")
}

// ---------------------------------------------------------------------------
// Test 1: the HELLO walkthrough (window 3, 1 char per packet, every 4th lost)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hello_survives_fourth_attempt_loss() {
    let cfg = fast(3, 24, 4);
    let sink = Arc::new(RecordingSink::new());

    let report = transfer(&cfg, b"HELLO", sink.clone()).await;

    assert_eq!(report.delivered, b"HELLO");
    assert_eq!(report.sender.packets, 5);
    assert_eq!(report.sender.dropped.first(), Some(&3), "seq 3 is the 4th attempt");
    assert!(report.sender.timeouts >= 1, "the lost packet must time out");
    assert!(sink.events().contains(&Event::TimedOut { seq: 3 }));
}

#[tokio::test]
async fn default_settings_complete() {
    let cfg = Config {
        timeout: Duration::from_millis(150),
        ack_pacing: Duration::from_millis(5),
        poll_interval: Duration::from_millis(5),
        ..Config::default()
    };
    let sink = Arc::new(RecordingSink::new());

    let report = transfer(&cfg, b"HELLO WORLD", sink.clone()).await;

    assert_eq!(report.delivered, b"HELLO WORLD");
    assert!(report.sender.attempts >= 11);
    assert!(!report.sender.dropped.is_empty(), "default loss period must drop something");
}

// ---------------------------------------------------------------------------
// Test 2: the K-th attempt is dropped iff K % N == 0
// ---------------------------------------------------------------------------

#[tokio::test]
async fn loss_follows_attempt_counter() {
    const N: u64 = 5;
    let cfg = fast(3, 16 + 16, N);
    let sink = Arc::new(RecordingSink::new());

    let report = transfer(&cfg, b"the quick brown fox jumps over", sink.clone()).await;
    assert_eq!(report.delivered, b"the quick brown fox jumps over");

    let events = sink.events();
    let attempts: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            Event::Sent { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, (1..=report.sender.attempts).collect::<Vec<_>>());

    let dropped: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            Event::Dropped { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    let expected: Vec<u64> = (1..=report.sender.attempts).filter(|k| k % N == 0).collect();
    assert_eq!(dropped, expected);
    assert_eq!(dropped.len(), report.sender.dropped.len());
}

// ---------------------------------------------------------------------------
// Test 3: receiver accepts a gap-free prefix, each ack advances once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accepted_packets_are_strictly_in_order() {
    let cfg = fast(4, 24, 6);
    let sink = Arc::new(RecordingSink::new());

    let report = transfer(&cfg, b"go back n, go back n", sink.clone()).await;
    assert_eq!(report.delivered, b"go back n, go back n");

    let events = sink.events();
    let accepted: Vec<u16> = events
        .iter()
        .filter_map(|e| match e {
            Event::Accepted { seq } => Some(*seq),
            _ => None,
        })
        .collect();
    assert_eq!(accepted, (0..report.sender.packets as u16).collect::<Vec<_>>());

    let advanced: Vec<u16> = events
        .iter()
        .filter_map(|e| match e {
            Event::Acked { ack } => Some(*ack),
            _ => None,
        })
        .collect();
    assert_eq!(advanced, accepted, "every position advances the window exactly once");
}

// ---------------------------------------------------------------------------
// Test 4: lossless link needs no retransmission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lossless_transfer_sends_each_packet_once() {
    let cfg = Config {
        timeout: Duration::from_secs(5),
        ..fast(4, 16 + 24, 0)
    };
    let sink = Arc::new(RecordingSink::new());

    let report = transfer(&cfg, b"no loss at all", sink.clone()).await;

    assert_eq!(report.delivered, b"no loss at all");
    assert_eq!(report.sender.packets, 5);
    assert_eq!(report.sender.attempts, 5);
    assert!(report.sender.dropped.is_empty());
    assert_eq!(report.sender.timeouts, 0);
    assert!(!sink
        .events()
        .iter()
        .any(|e| matches!(e, Event::OutOfOrder { .. } | Event::DuplicateAck { .. })));
}

// ---------------------------------------------------------------------------
// Test 5: window larger than the stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn window_wider_than_stream() {
    let cfg = fast(16, 24, 7);
    let report = transfer(&cfg, b"tiny", Arc::new(RecordingSink::new())).await;
    assert_eq!(report.delivered, b"tiny");
}

// ---------------------------------------------------------------------------
// Test 6: empty input
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_input_delivers_nothing() {
    let cfg = fast(3, 24, 4);
    let sink = Arc::new(RecordingSink::new());
    let report = transfer(&cfg, b"", sink.clone()).await;

    assert!(report.delivered.is_empty());
    assert_eq!(report.sender.attempts, 0);
    assert!(sink.events().contains(&Event::Delivered { bytes: 0 }));
}

// ---------------------------------------------------------------------------
// Test 7: zero bytes and padding modes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interior_zero_bytes_survive_trailing_strip() {
    let cfg = fast(3, 16 + 24, 4);
    let payload = b"a\0b\0\0c\0";
    let report = transfer(&cfg, payload, Arc::new(RecordingSink::new())).await;
    assert_eq!(report.delivered, b"a\0b\0\0c");
}

#[tokio::test]
async fn strip_all_drops_every_zero_byte() {
    let cfg = Config {
        padding: Padding::StripAll,
        ..fast(3, 16 + 24, 4)
    };
    let report = transfer(&cfg, b"a\0b\0\0c\0", Arc::new(RecordingSink::new())).await;
    assert_eq!(report.delivered, b"abc");
}

// ---------------------------------------------------------------------------
// Test 8: collaborator failures do not stop the protocol
// ---------------------------------------------------------------------------

struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn failed_output_write_is_not_fatal() {
    let cfg = fast(3, 24, 4);
    let sink = Arc::new(RecordingSink::new());
    let report = run_transfer(&cfg, &b"HELLO"[..], FailingWriter, sink.clone())
        .await
        .expect("write failure must not abort the transfer");

    assert_eq!(report.delivered, b"HELLO");
    assert!(!sink
        .events()
        .iter()
        .any(|e| matches!(e, Event::Delivered { .. })));
}

#[tokio::test]
async fn failing_event_log_is_not_fatal() {
    let cfg = fast(3, 24, 4);
    let sink = Arc::new(WriterSink::new(FailingWriter));
    let report = run_transfer(&cfg, &b"HELLO"[..], Vec::new(), sink)
        .await
        .expect("sink failure must not abort the transfer");
    assert_eq!(report.delivered, b"HELLO");
}

// ---------------------------------------------------------------------------
// Test 9: event log lines
// ---------------------------------------------------------------------------

#[tokio::test]
async fn event_log_records_drop_and_completion() {
    let cfg = fast(3, 24, 4);
    let sink = Arc::new(WriterSink::new(Vec::new()));
    run_transfer(&cfg, &b"HELLO"[..], Vec::new(), sink.clone())
        .await
        .expect("transfer");

    let sink = Arc::try_unwrap(sink).ok().expect("engines released the sink");
    let text = String::from_utf8(sink.into_inner()).expect("utf-8 log");
    assert!(text.starts_with("5 packets created, Window size: 3"));
    assert!(text.contains("Sender: packet 3 dropped"));
    assert!(text.contains("Receiver: packet 4 received"));
    assert!(text.contains("Sender: All packets have been sent and acknowledgments processed."));
}

// ---------------------------------------------------------------------------
// Test 10: configuration errors surface before any transmission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_packet_length_rejected() {
    let cfg = fast(3, 20, 4);
    let err = run_transfer(&cfg, &b"HELLO"[..], Vec::new(), Arc::new(RecordingSink::new()))
        .await
        .expect_err("payload of 4 bits cannot be framed");
    assert!(matches!(
        err,
        TransferError::Config(ConfigError::UnalignedPayload(4))
    ));
}
