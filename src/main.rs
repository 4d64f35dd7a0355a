//! Entry point for `gbn-arq`.
//!
//! Parses CLI arguments, opens the input and output files and runs one
//! Go-Back-N transfer between them.  All protocol work is delegated to the
//! library; `main.rs` owns only process setup (logging, argument parsing,
//! file handles).

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use gbn_arq::{run_transfer, Config, EventSink, LogSink, Padding, WriterSink};

/// Go-Back-N ARQ transfer over a simulated lossy channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// File whose contents are transmitted.
    #[arg(short, long)]
    input: PathBuf,

    /// File the receiver writes the reconstructed payload to.
    #[arg(short, long)]
    output: PathBuf,

    /// Maximum number of unacknowledged packets in flight.
    #[arg(short, long, default_value_t = 3)]
    window_size: usize,

    /// Packet length in bits, including the 16-bit sequence number.
    #[arg(short, long, default_value_t = 24)]
    packet_len: usize,

    /// Drop every Nth transmission attempt (0 disables loss).
    #[arg(short = 'n', long, default_value_t = 4)]
    drop_period: u64,

    /// Seconds before an unacknowledged packet is resent.
    #[arg(short, long, default_value_t = 0.5)]
    timeout: f64,

    /// Pause after each processed ack, in milliseconds.
    #[arg(long, default_value_t = 200)]
    ack_pacing_ms: u64,

    /// Padding removal: "trailing" keeps interior zero bytes, "all" drops them.
    #[arg(long, default_value = "trailing")]
    padding: Padding,

    /// Write protocol events to this file instead of the log.
    #[arg(long)]
    event_log: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .with_context(|| format!("invalid timeout {}", self.timeout))?;
        Ok(Config {
            window_size: self.window_size,
            packet_len: self.packet_len,
            drop_period: self.drop_period,
            timeout,
            ack_pacing: Duration::from_millis(self.ack_pacing_ms),
            padding: self.padding,
            ..Config::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config()?;

    let input = File::open(&cli.input)
        .with_context(|| format!("cannot open input {}", cli.input.display()))?;
    let output = File::create(&cli.output)
        .with_context(|| format!("cannot create output {}", cli.output.display()))?;

    let sink: Arc<dyn EventSink> = match &cli.event_log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create event log {}", path.display()))?;
            Arc::new(WriterSink::new(BufWriter::new(file)))
        }
        None => Arc::new(LogSink),
    };

    let report = run_transfer(&config, input, BufWriter::new(output), sink).await?;

    log::info!(
        "transferred {} bytes in {} packets: {} attempts, {} dropped, {} timeouts",
        report.delivered.len(),
        report.sender.packets,
        report.sender.attempts,
        report.sender.dropped.len(),
        report.sender.timeouts
    );
    Ok(())
}
