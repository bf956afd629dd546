//! Clicker MIDI
//!
//! Plays a held MIDI note for each clicker button pressed on a serial
//! receiver.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clicker_midi::{ports, serial, AppConfig, Bridge, BridgeError, MidirSink};

/// Clicker MIDI - turn clicker button presses into held MIDI notes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, env = "CLICKER_CONFIG")]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Serial device path, skips vendor lookup
    #[arg(long)]
    serial_port: Option<String>,

    /// Substring of the MIDI output port name
    #[arg(long)]
    midi_port: Option<String>,

    /// List available serial and MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Missing hardware gets the plain message, nothing else
            match e.downcast_ref::<BridgeError>() {
                Some(bridge_err) if bridge_err.is_device_missing() => {
                    eprintln!("{}", bridge_err)
                }
                _ => error!("{:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting Clicker MIDI...");

    let mut config = match &args.config {
        Some(path) => {
            info!("Configuration file: {}", path);
            AppConfig::load(path).await?
        }
        None => AppConfig::default(),
    };
    if let Some(port) = args.serial_port {
        config.serial.port = Some(port);
    }
    if let Some(port) = args.midi_port {
        config.midi.output_port = Some(port);
    }

    if let Some(path) = &args.write_config {
        config.save(path).await?;
        info!("Configuration written to {}", path);
        return Ok(());
    }

    if args.list_ports {
        ports::list_ports_formatted(&config);
        return Ok(());
    }

    let port = serial::open(&config.serial)?;
    let sink = MidirSink::open(config.midi.output_port.as_deref())?;
    info!("✅ Clicker and synthesizer connected");

    let mut bridge = Bridge::new(port, sink, &config);
    bridge
        .run(shutdown_signal())
        .await
        .context("Bridge stopped on transport failure")?;

    let (_, sink) = bridge.into_parts();
    sink.close();

    info!("Clicker MIDI shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .try_init()?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
