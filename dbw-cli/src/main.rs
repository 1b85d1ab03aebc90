//! DBW Supervisor CLI
//!
//! Command-line host for the dbw-core library:
//! - `info` loads a signal dictionary and checks the node's message coverage
//! - `replay` drives a node with a candump log or a scripted session and
//!   prints every output it produces

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbw_core::{ids, CanFrame, Command, DbcCodec, DbwConfig, DbwNode, SignalCodec};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

mod candump;
mod config;
mod output;
mod schedule;
mod script;

use config::{AppConfig, OutputFormat};
use output::OutputWriter;
use schedule::SweepSchedule;
use script::SessionEvent;

/// DBW Supervisor - drive-by-wire arbitration over recorded bus traffic
#[derive(Parser, Debug)]
#[command(name = "dbw-cli")]
#[command(about = "Replay CAN traffic through the drive-by-wire supervisor", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// DBC file to use instead of the configured or built-in dictionary
    #[arg(long, value_name = "FILE", global = true)]
    dbc: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Show signal dictionary statistics and node message coverage
    Info,
    /// Feed recorded traffic through a node
    Replay {
        /// candump log (.log) or session script (.jsonl)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output format (overrides the config file)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Request enable before the first event
        #[arg(long)]
        enable: bool,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("DBW Supervisor CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using dbw-core library v{}", dbw_core::VERSION);

    let mut app_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(dbc) = &args.dbc {
        app_config.node.dbc_file = Some(dbc.clone());
    }

    match &args.command {
        Mode::Info => info_mode(&app_config.node),
        Mode::Replay {
            input,
            format,
            output,
            enable,
        } => {
            if let Some(format) = format {
                app_config.output.format = *format;
            }
            if let Some(output) = output {
                app_config.output.file = Some(output.clone());
            }
            replay_mode(&app_config, input, *enable)
        }
    }
}

/// Info mode - load the dictionary and check what the node needs from it
fn info_mode(node_config: &DbwConfig) -> Result<()> {
    let codec = load_codec(node_config)?;

    let stats = codec.stats();
    println!("Signal Database:");
    println!("  Messages:    {}", stats.num_messages);
    println!("  Signals:     {}", stats.num_signals);
    println!("  Multiplexed: {}", stats.num_multiplexed);

    println!("\nReports:");
    let mut missing = 0;
    for can_id in ids::REPORT_IDS {
        match codec.definition(can_id) {
            Some(def) => println!("  ✓ 0x{:03X} {} ({} bytes)", can_id, def.name, def.size),
            None => {
                println!("  ✗ 0x{:03X} missing", can_id);
                missing += 1;
            }
        }
    }

    println!("\nCommands:");
    for name in ids::COMMAND_NAMES {
        match codec.definition_by_name(name) {
            Some(def) => println!("  ✓ 0x{:03X} {}", def.id, name),
            None => {
                println!("  ✗ {} missing", name);
                missing += 1;
            }
        }
    }

    if missing > 0 {
        anyhow::bail!("Signal dictionary lacks {} message(s) the node needs", missing);
    }
    println!("\n✓ Dictionary covers every node message");
    Ok(())
}

/// Replay mode - feed events in order, sweeping on the configured period
fn replay_mode(app_config: &AppConfig, input: &Path, enable: bool) -> Result<()> {
    let codec = load_codec(&app_config.node)?;
    let mut node = DbwNode::with_codec(app_config.node.clone(), codec)
        .context("Failed to create DBW node")?;

    let events = load_events(input)?;
    log::info!("Replaying {} events from {:?}", events.len(), input);

    let sink: Box<dyn Write> = match &app_config.output.file {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output: {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut writer = OutputWriter::new(app_config.output.format, sink);

    let period_ns = u64::try_from(app_config.node.sweep_period().as_nanos()).unwrap_or(u64::MAX);
    let mut schedule = SweepSchedule::new(period_ns);
    let first_ns = events.first().map(|(ns, _)| *ns).unwrap_or(0);

    if enable {
        node.enable();
    }
    writer.write_all(0.0, &node.take_outputs())?;

    for (stamp_ns, event) in &events {
        let offset_ns = stamp_ns.saturating_sub(first_ns);

        // Sweeps due before this event; a long gap collapses to one
        while let Some(sweep_ns) = schedule.next_due(offset_ns) {
            node.tick()?;
            writer.write_all(seconds(sweep_ns), &node.take_outputs())?;
        }

        match event {
            ReplayEvent::Frame(frame) => node.handle_frame(frame),
            ReplayEvent::Enable => node.enable(),
            ReplayEvent::Disable => node.disable(),
            ReplayEvent::Command(command) => node
                .command(command)
                .with_context(|| format!("Failed to encode {:?}", command))?,
        }
        writer.write_all(seconds(offset_ns), &node.take_outputs())?;
    }

    writer.flush()?;
    log::info!(
        "Replay finished: {} outputs, enabled = {}",
        writer.written(),
        node.enabled()
    );
    Ok(())
}

/// Build the codec the node config selects
fn load_codec(node_config: &DbwConfig) -> Result<DbcCodec> {
    match &node_config.dbc_file {
        Some(path) => DbcCodec::from_dbc_file(path)
            .with_context(|| format!("Failed to load DBC file: {:?}", path)),
        None => DbcCodec::builtin().context("Failed to load built-in dictionary"),
    }
}

/// Replay input, in time order
enum ReplayEvent {
    Frame(CanFrame),
    Enable,
    Disable,
    Command(Command),
}

/// Events with their timestamps (ns); `.jsonl`/`.json` is a session, anything else candump
fn load_events(input: &Path) -> Result<Vec<(u64, ReplayEvent)>> {
    let is_session = input
        .extension()
        .map(|ext| ext == "jsonl" || ext == "json")
        .unwrap_or(false);

    if !is_session {
        return Ok(candump::read_log(input)?
            .into_iter()
            .map(|frame| (frame.timestamp_ns, ReplayEvent::Frame(frame)))
            .collect());
    }

    let mut events: Vec<(u64, ReplayEvent)> = script::read_session(input)?
        .into_iter()
        .map(|timed| {
            let offset_ns = timed.offset_ns();
            let event = match timed.event {
                SessionEvent::Frame { can_id, data } => {
                    ReplayEvent::Frame(script::session_frame(can_id, &data, offset_ns))
                }
                SessionEvent::Enable => ReplayEvent::Enable,
                SessionEvent::Disable => ReplayEvent::Disable,
                SessionEvent::Command(command) => ReplayEvent::Command(command),
            };
            (offset_ns, event)
        })
        .collect();
    // Stable, so same-time events keep file order
    events.sort_by_key(|(offset_ns, _)| *offset_ns);
    Ok(events)
}

fn seconds(ns: u64) -> f64 {
    ns as f64 * 1e-9
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

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
