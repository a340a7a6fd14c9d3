//! readserial
//!
//! Prints floating-point readings sent line by line over a serial port,
//! e.g. by a microcontroller streaming sensor values.
//!
//! # Usage
//!
//! ```bash
//! # Read from the default device (/dev/ttyACM0 at 115200 baud)
//! readserial
//!
//! # Read from a specific port and baud rate
//! readserial read -p /dev/ttyUSB0 -b 9600
//!
//! # Load settings from a TOML file, override the timeout
//! readserial read -c readserial.toml --timeout-ms 5000
//!
//! # List available serial ports
//! readserial ports
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use readserial::config::{ReaderConfig, DEFAULT_DEVICE_PATH};
use readserial::line::Terminator;
use readserial::{port, reader, ReadError};

/// Print floating-point readings received over a serial port
#[derive(Parser)]
#[command(name = "readserial")]
#[command(version)]
#[command(about = "Print floating-point readings received over a serial port")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and print values until an error or Ctrl+C (default)
    Read(ReadArgs),

    /// List available serial ports
    Ports,
}

#[derive(Args, Default)]
struct ReadArgs {
    /// Serial port path (e.g., /dev/ttyACM0)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop if no complete line arrives within this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// How to remove the line terminator
    #[arg(long, value_enum)]
    terminator: Option<Terminator>,

    /// Keep bytes buffered before startup instead of discarding them
    #[arg(long)]
    no_flush: bool,

    /// Prefix each reading with a timestamp
    #[arg(long)]
    timestamps: bool,
}

impl ReadArgs {
    /// Defaults, then the config file, then flags
    fn resolve(&self) -> Result<ReaderConfig> {
        let mut config = match self.config {
            Some(ref path) => ReaderConfig::load(path)?,
            None => ReaderConfig::default(),
        };

        if let Some(ref port) = self.port {
            config = config.with_device_path(port);
        }
        if let Some(baud) = self.baud {
            config = config.with_baud_rate(baud);
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Some(Duration::from_millis(ms)));
        }
        if let Some(terminator) = self.terminator {
            config = config.with_terminator(terminator);
        }
        if self.no_flush {
            config = config.with_flush_on_open(false);
        }
        if self.timestamps {
            config = config.with_timestamps(true);
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Some(Commands::Read(args)) => handle_read(args),
        Some(Commands::Ports) => {
            port::print_ports(DEFAULT_DEVICE_PATH).context("Failed to list serial ports")
        }
        None => handle_read(ReadArgs::default()),
    }
}

fn handle_read(args: ReadArgs) -> Result<()> {
    let config = args.resolve().context("Invalid reader configuration")?;
    let device = config.device_path.clone();

    let end = reader::run_reader(config)
        .with_context(|| format!("Cannot start reading from {}", device))?;

    match end.cause {
        ReadError::Interrupted => log::info!("Stopped by user"),
        ref cause => eprintln!("{} {}", "[ERROR]".red().bold(), cause),
    }
    log::info!("{} readings received", end.readings);

    Ok(())
}
