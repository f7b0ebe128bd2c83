//! busattach Monitor
//!
//! Replays captured bus traffic through the attachment layer and reports
//! which watched service classes bind to which devices.

mod config;
mod demo;
mod replay;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use common::setup_logging;
use config::MonitorConfig;
use replay::{Monitor, ReplaySummary};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "bus-monitor")]
#[command(
    author,
    version,
    about = "Bus Monitor - Replay bus captures through client attachment"
)]
#[command(long_about = "
Replays a capture of bus packets through the client attachment layer.
Each configured watch entry registers one client for a service class;
the monitor logs every connect, disconnect, and veto as devices announce,
restart, and change their service lists.

EXAMPLES:
    # Write the built-in reboot scenario and replay it
    bus-monitor demo --output demo.cap
    bus-monitor replay demo.cap

    # Replay with a custom watch list and debug logging
    bus-monitor --config ./monitor.toml --log-level debug replay demo.cap

    # Save default configuration and exit
    bus-monitor --save-config

CONFIGURATION:
    The monitor looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/busattach/monitor.toml
    3. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a framed packet capture
    Replay {
        /// Capture file written by `demo` or a bus sniffer
        #[arg(value_name = "CAPTURE")]
        capture: PathBuf,
    },
    /// Write the built-in reboot scenario as a capture file
    Demo {
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = MonitorConfig::default();
        let path = MonitorConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    // Load configuration first (to get log level from config if not specified)
    let config = if let Some(ref path) = args.config {
        MonitorConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        MonitorConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.monitor.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("busattach Monitor v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    match args.command {
        Some(Command::Replay { capture }) => run_replay(&config, capture).await,
        Some(Command::Demo { output }) => {
            let count = demo::write_demo(&output)?;
            println!("Wrote {} packets to {}", count, output.display());
            Ok(())
        }
        None => bail!("No command given, try `bus-monitor replay <CAPTURE>` or `--help`"),
    }
}

/// Replay a capture file until it ends or ctrl-c is pressed
async fn run_replay(config: &MonitorConfig, capture: PathBuf) -> Result<()> {
    let file = File::open(&capture)
        .await
        .with_context(|| format!("Failed to open capture: {}", capture.display()))?;
    let mut reader = BufReader::new(file);

    let mut monitor = Monitor::new(config)?;
    info!(
        "Replaying {} with {} watch(es)",
        capture.display(),
        config.watch.len()
    );

    tokio::select! {
        result = monitor.replay(&mut reader) => {
            let summary = result?;
            print_summary(&summary);
        }
        _ = signal::ctrl_c() => {
            warn!("Interrupted, stopping replay");
            println!("Replay interrupted");
            return Ok(());
        }
    }

    info!(
        "Replay finished with {} device(s) and {} client(s)",
        monitor.bus().device_count(),
        monitor.bus().client_count()
    );
    Ok(())
}

fn print_summary(summary: &ReplaySummary) {
    println!(
        "Replayed {} packet(s): {} announcement(s), {} dropped",
        summary.packets, summary.announcements, summary.dropped
    );
    println!("Known devices: {}\n", summary.devices);

    for watch in &summary.watches {
        match watch.binding {
            Some(binding) => println!(
                "  {:<16} attached to {} service {}",
                watch.name, binding.device, binding.service_index
            ),
            None => println!("  {:<16} unattached", watch.name),
        }
        println!(
            "      connects: {}  disconnects: {}  vetoes: {}  packets: {}",
            watch.stats.connects,
            watch.stats.disconnects,
            watch.stats.rejected,
            watch.stats.packets_seen
        );
    }
}
