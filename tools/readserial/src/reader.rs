//! The serial line reader loop
//!
//! Prints a status notice before every read attempt and the parsed value
//! after it. The first error of any kind ends the loop with one fixed
//! termination notice; the error itself is handed back to the caller.

use crate::cancel::CancelToken;
use crate::config::ReaderConfig;
use crate::error::{escape, ReadError, Result};
use crate::line::{decode_reading, LineReader, Reading};
use crate::port::SerialConnection;
use chrono::Local;
use std::io::{Read, Write};

/// Why and when the read loop stopped
#[derive(Debug)]
pub struct Termination {
    /// Readings emitted before the loop stopped
    pub readings: usize,
    /// The error that ended the loop
    pub cause: ReadError,
}

/// Converts incoming serial lines into numeric readings until something fails
pub struct SerialLineReader<R> {
    lines: LineReader<R>,
    config: ReaderConfig,
    cancel: CancelToken,
    readings: usize,
}

impl SerialLineReader<SerialConnection> {
    /// Open the configured device. Fails before any read if the device
    /// cannot be opened or the configuration is invalid.
    pub fn open(config: ReaderConfig, cancel: CancelToken) -> Result<Self> {
        config.validate()?;
        let conn = SerialConnection::open(&config)?;
        Ok(Self::from_reader(conn, config, cancel))
    }
}

impl<R: Read> SerialLineReader<R> {
    /// Read lines from an already open stream
    pub fn from_reader(reader: R, config: ReaderConfig, cancel: CancelToken) -> Self {
        Self {
            lines: LineReader::new(reader),
            config,
            cancel,
            readings: 0,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Number of readings written to the output so far
    pub fn readings(&self) -> usize {
        self.readings
    }

    /// Block for the next line and decode it
    pub fn read_reading(&mut self) -> Result<Reading> {
        let line = self.lines.read_line(&self.cancel, self.config.timeout())?;
        log::trace!("Received {}", escape(&line));

        decode_reading(&line, self.config.terminator)
    }

    /// Run until the first error, writing notices and readings to `out`
    pub fn run<W: Write>(&mut self, out: &mut W) -> Termination {
        let cause = loop {
            if let Err(e) = self.step(out) {
                break e;
            }
        };

        // Nothing left to report to if the sink itself is broken
        let _ = writeln!(out, "{}", self.config.termination_notice);
        let _ = out.flush();

        Termination {
            readings: self.readings,
            cause,
        }
    }

    fn step<W: Write>(&mut self, out: &mut W) -> Result<()> {
        writeln!(out, "{}", self.config.status_notice)
            .and_then(|_| out.flush())
            .map_err(ReadError::Output)?;

        let reading = self.read_reading()?;

        let written = if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S%.3f");
            writeln!(out, "{} {}", timestamp, reading)
        } else {
            writeln!(out, "{}", reading)
        };
        written.and_then(|_| out.flush()).map_err(ReadError::Output)?;

        self.readings += 1;
        Ok(())
    }
}

/// Open the device, install the Ctrl+C handler, and read to stdout
pub fn run_reader(config: ReaderConfig) -> Result<Termination> {
    let cancel = CancelToken::new();
    if let Err(e) = crate::cancel::install_interrupt_handler(&cancel) {
        log::warn!("Ctrl+C handler not installed: {}", e);
    }

    let mut reader = SerialLineReader::open(config, cancel)?;
    log::info!(
        "Reading from {} at {} baud",
        reader.config().device_path,
        reader.config().baud_rate
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    Ok(reader.run(&mut out))
}
