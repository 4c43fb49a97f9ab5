//! Riffle command-line host
//!
//! Resolves the native engine, lists output devices and plays media with an
//! optional output device, printing player events as JSON lines.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "riffle", version, about = "Media playback with switchable audio outputs")]
struct Cli {
    /// Try the bundled runtime before a system installation
    #[arg(long, global = true)]
    prefer_bundled: bool,

    /// Extra engine root checked before the platform defaults
    #[arg(long, global = true, value_name = "DIR")]
    engine_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate candidate engine roots without loading anything
    Probe,

    /// List audio output devices
    Devices {
        /// Ignore the cached list
        #[arg(long)]
        refresh: bool,
    },

    /// Play a file or URL
    Play {
        /// Path or URL (http, https, rtsp, rtmp, mms, ftp, file)
        input: String,

        /// Output device id (empty for the system default)
        #[arg(long)]
        device: Option<String>,

        /// Output module the device belongs to
        #[arg(long)]
        module: Option<String>,

        /// Volume 0-100
        #[arg(long)]
        volume: Option<u8>,

        /// Stop after this many seconds
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "riffle_cli=info,riffle_core=info,riffle_engine=info".into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting Riffle");

    let host = commands::Host::new(cli.prefer_bundled, cli.engine_root);
    match cli.command {
        Command::Probe => host.probe(),
        Command::Devices { refresh } => host.devices(refresh),
        Command::Play {
            input,
            device,
            module,
            volume,
            duration,
        } => host.play(&input, device, module, volume, duration),
    }
}
