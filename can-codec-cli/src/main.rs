//! CAN Codec CLI Application
//!
//! Command-line front end for the can-codec library:
//! - Inspect DBC schemas (several files load in parallel)
//! - Decode a raw frame into physical values
//! - Encode physical values (or value-table labels) into a frame
//! - Run the transmission scheduler against stdout or a radio-link capture file

use anyhow::{anyhow, bail, Context, Result};
use can_codec::{
    load_catalog, BatchingLinkSink, ByteOrder, Frame, LinkSink, MessageCatalog, RangePolicy,
    SchedulerEvent, SignalCodec, SignalValues, TransmissionScheduler, ValueType,
};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

mod config;
mod sink;

use config::{AppConfig, ValueSetting};
use sink::StdoutSink;

/// How long `schedule` waits for the sink to write out what it still holds
const SINK_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// CAN Codec - Encode, decode and schedule CAN frames from DBC schemas
#[derive(Parser, Debug)]
#[command(name = "can-codec-cli")]
#[command(about = "Encode, decode and schedule CAN frames from DBC schemas", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load DBC files and list their messages
    Inspect {
        /// Path to DBC file(s); each is loaded as its own catalog
        #[arg(value_name = "FILE", required = true)]
        dbc: Vec<PathBuf>,

        /// Also list every signal
        #[arg(short, long)]
        signals: bool,
    },

    /// Decode one raw frame
    Decode {
        /// Path to DBC file
        #[arg(long, value_name = "FILE")]
        dbc: PathBuf,

        /// CAN ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_can_id)]
        id: u32,

        /// Frame payload as hex, e.g. "0A00" or "0A 00"
        #[arg(long)]
        data: String,

        /// Print the decoded message as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode signal values into a frame
    Encode {
        /// Path to DBC file
        #[arg(long, value_name = "FILE")]
        dbc: PathBuf,

        /// CAN ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_can_id)]
        id: u32,

        /// Signal value as NAME=VALUE; VALUE may be a value-table label (can be repeated)
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,

        /// Saturate out-of-range values instead of failing
        #[arg(long)]
        clamp: bool,
    },

    /// Transmit periodic messages at their declared cycle times
    Schedule {
        /// Path to DBC file
        #[arg(long, value_name = "FILE")]
        dbc: PathBuf,

        /// Stop after this many milliseconds (default: run until Ctrl-C)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,

        /// Path to configuration file (scheduler settings and signal values)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Write radio-link batches to this file instead of printing frames
        #[arg(long, value_name = "FILE")]
        link: Option<PathBuf>,

        /// Group frames into multi-record link batches (requires --link)
        #[arg(long, requires = "link")]
        batch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::debug!("CAN Codec CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using codec library v{}", can_codec::VERSION);

    match args.command {
        Command::Inspect { dbc, signals } => inspect(&dbc, signals),
        Command::Decode { dbc, id, data, json } => decode(&dbc, id, &data, json),
        Command::Encode { dbc, id, set, clamp } => encode(&dbc, id, &set, clamp),
        Command::Schedule {
            dbc,
            duration_ms,
            config,
            link,
            batch,
        } => schedule(&dbc, duration_ms, config.as_deref(), link.as_deref(), batch).await,
    }
}

/// Parse a CAN ID given in decimal or with a 0x prefix
fn parse_can_id(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid CAN ID '{}': {}", text, e))
}

/// Parse a NAME=VALUE assignment
fn parse_assignment(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", text)),
    }
}

fn load(path: &Path) -> Result<MessageCatalog> {
    load_catalog(path).with_context(|| format!("Failed to load DBC: {:?}", path))
}

/// Inspect mode - load every schema independently and list its contents
fn inspect(paths: &[PathBuf], show_signals: bool) -> Result<()> {
    let results: Vec<_> = paths
        .par_iter()
        .map(|path| (path, load_catalog(path)))
        .collect();

    let mut failed = 0;
    for (path, result) in results {
        match result {
            Ok(catalog) => print_catalog(path, &catalog, show_signals),
            Err(e) => {
                eprintln!("✗ {:?}: {}", path, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} schema files failed to load", failed, paths.len());
    }
    Ok(())
}

fn print_catalog(path: &Path, catalog: &MessageCatalog, show_signals: bool) {
    let stats = catalog.stats();

    println!("═══════════════════════════════════════════════");
    println!("  {}", path.display());
    println!("═══════════════════════════════════════════════");
    println!("  Messages:     {}", stats.num_messages);
    println!("  Signals:      {}", stats.num_signals);
    println!("  Periodic:     {}", stats.num_periodic);
    println!("  Value tables: {}\n", stats.num_value_tables);

    for message in catalog.messages() {
        let cadence = if message.is_periodic() {
            format!("every {} ms", message.cycle_time_ms)
        } else {
            "on demand".to_string()
        };
        println!(
            "  0x{:03X} {:<28} [{}] {}",
            message.id, message.name, message.byte_length, cadence
        );

        if !show_signals {
            continue;
        }

        for signal in &message.signals {
            let order = match signal.byte_order {
                ByteOrder::LittleEndian => 1,
                ByteOrder::BigEndian => 0,
            };
            let sign = match signal.value_type {
                ValueType::Unsigned => '+',
                ValueType::Signed => '-',
            };
            print!(
                "      {:<28} {}|{}@{}{} ({},{}) [{}|{}] \"{}\"",
                signal.name,
                signal.start_bit,
                signal.bit_length,
                order,
                sign,
                signal.scale,
                signal.offset,
                signal.physical_min,
                signal.physical_max,
                signal.unit
            );
            match message.value_table(&signal.name) {
                Some(table) => println!("  ({} labels)", table.len()),
                None => println!(),
            }
        }
    }
    println!();
}

/// Decode mode - one frame in, physical values out
fn decode(dbc: &Path, id: u32, data: &str, json: bool) -> Result<()> {
    let catalog = load(dbc)?;

    let cleaned: String = data
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let bytes = hex::decode(&cleaned).with_context(|| format!("Invalid hex data: {}", data))?;

    let frame = Frame::from_bytes(id, &bytes);
    let decoded = catalog.decode(&frame)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
        return Ok(());
    }

    println!("{} ({})", decoded.name, frame);
    for signal in &decoded.signals {
        match &signal.label {
            Some(label) => println!("  {:<28} {} (raw {})", signal.name, label, signal.raw_value),
            None => println!(
                "  {:<28} {} {}",
                signal.name,
                signal.physical,
                signal.unit.as_deref().unwrap_or("")
            ),
        }
    }
    Ok(())
}

/// Encode mode - NAME=VALUE assignments in, frame out
fn encode(dbc: &Path, id: u32, assignments: &[(String, String)], clamp: bool) -> Result<()> {
    let catalog = load(dbc)?;
    let message = catalog
        .lookup(id)
        .ok_or_else(|| anyhow!("Message 0x{:X} not found in {:?}", id, dbc))?;

    let mut values = SignalValues::new();
    for (name, text) in assignments {
        let physical = ValueSetting::parse(text).resolve(message, name)?;
        values.insert(name.clone(), physical);
    }

    let policy = if clamp {
        RangePolicy::Clamp
    } else {
        RangePolicy::Fail
    };
    let frame = SignalCodec::encode_message(message, &values, policy)?;

    println!("{}", frame);
    println!("{}", hex::encode_upper(&frame.data));
    Ok(())
}

/// What happened during a scheduling run
#[derive(Debug, Default)]
struct RunSummary {
    dispatched: u64,
    missed_ticks: u64,
    encode_failures: u64,
    sink_failures: u64,
}

async fn collect_events(mut events: broadcast::Receiver<SchedulerEvent>) -> RunSummary {
    let mut summary = RunSummary::default();

    loop {
        match events.recv().await {
            Ok(SchedulerEvent::Dispatched { .. }) => summary.dispatched += 1,
            Ok(SchedulerEvent::Overrun { missed, .. }) => summary.missed_ticks += missed,
            Ok(SchedulerEvent::EncodeFailed { .. }) => summary.encode_failures += 1,
            Ok(SchedulerEvent::SinkFailed { .. }) => summary.sink_failures += 1,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Event monitor lagged, {} events not counted", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    summary
}

/// Schedule mode - run the transmission scheduler until the deadline or Ctrl-C
async fn schedule(
    dbc: &Path,
    duration_ms: Option<u64>,
    config_path: Option<&Path>,
    link: Option<&Path>,
    batch: bool,
) -> Result<()> {
    let catalog = Arc::new(load(dbc)?);

    let config = match config_path {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    let values = Arc::new(config.initial_values(&catalog)?);

    let mut scheduler =
        TransmissionScheduler::new(Arc::clone(&catalog), values, config.scheduler.clone());
    if scheduler.scheduled_ids().is_empty() {
        bail!("No periodic messages to schedule in {:?}", dbc);
    }

    let monitor = tokio::spawn(collect_events(scheduler.subscribe()));

    match link {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create link capture: {:?}", path))?;
            log::info!("Writing radio-link batches to {:?}", path);
            if batch {
                scheduler.start(BatchingLinkSink::new(file))?;
            } else {
                scheduler.start(LinkSink::new(file))?;
            }
        }
        None => scheduler.start(StdoutSink::new())?,
    }

    match duration_ms {
        Some(ms) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                _ = tokio::signal::ctrl_c() => log::info!("Interrupted"),
            }
        }
        None => tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?,
    }

    if let Some(mut sink) = scheduler.stop().await {
        match tokio::time::timeout(SINK_FLUSH_TIMEOUT, sink.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to flush sink: {}", e),
            Err(_) => log::warn!("Sink flush timed out after {:?}", SINK_FLUSH_TIMEOUT),
        }
    }
    drop(scheduler);

    let summary = monitor.await?;
    println!("\n📊 Scheduler run:");
    println!("  Frames dispatched: {}", summary.dispatched);
    println!("  Missed ticks:      {}", summary.missed_ticks);
    println!("  Encode failures:   {}", summary.encode_failures);
    println!("  Sink failures:     {}", summary.sink_failures);

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_can_id() {
        assert_eq!(parse_can_id("784"), Ok(784));
        assert_eq!(parse_can_id("0x310"), Ok(0x310));
        assert_eq!(parse_can_id("0X1FFFFFFF"), Ok(0x1FFF_FFFF));
        assert!(parse_can_id("0xZZ").is_err());
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("BPS_State = IDLE"),
            Ok(("BPS_State".to_string(), "IDLE".to_string()))
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=3").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "can-codec-cli",
            "-v",
            "encode",
            "--dbc",
            "bms.dbc",
            "--id",
            "0x310",
            "--set",
            "Max_Charge_Power=150",
            "--clamp",
        ])
        .unwrap();

        assert_eq!(args.verbose, 1);
        match args.command {
            Command::Encode { id, set, clamp, .. } => {
                assert_eq!(id, 0x310);
                assert_eq!(set, vec![("Max_Charge_Power".to_string(), "150".to_string())]);
                assert!(clamp);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_batch_requires_link() {
        let base = ["can-codec-cli", "schedule", "--dbc", "bms.dbc", "--batch"];
        assert!(Args::try_parse_from(base).is_err());

        let args = Args::try_parse_from(base.iter().chain(&["--link", "out.bin"])).unwrap();
        match args.command {
            Command::Schedule { link, batch, .. } => {
                assert_eq!(link, Some(PathBuf::from("out.bin")));
                assert!(batch);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
