//! Error types for the serial line reader
//!
//! Startup failures (opening the port, loading configuration) are fatal.
//! Everything else ends the read loop; the loop prints the same notice for
//! every kind, but the value returned to the caller keeps the details.

use std::num::ParseFloatError;
use std::path::PathBuf;
use std::str::Utf8Error;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    /// The serial device could not be opened
    #[error("Failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// Discarding bytes buffered before startup failed
    #[error("Failed to clear input buffer of {path}: {source}")]
    Flush {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// Reading from the device failed
    #[error("Failed to read from serial port: {0}")]
    Io(#[source] std::io::Error),

    /// Writing a notice or reading to the output failed
    #[error("Failed to write output: {0}")]
    Output(#[source] std::io::Error),

    /// Listing the system's serial ports failed
    #[error("Failed to enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),

    /// The device stopped producing data
    #[error("Serial stream closed")]
    Closed,

    /// Line did not end with CR LF under the strict terminator policy
    #[error("Line is not terminated by CR LF: {}", escape(.bytes))]
    Terminator { bytes: Vec<u8> },

    /// No line feed within the maximum line length
    #[error("No line feed within {limit} bytes, starting {}", escape(.head))]
    LineTooLong { limit: usize, head: Vec<u8> },

    /// Line content is not valid UTF-8
    #[error("Line is not valid UTF-8 ({source}): {}", escape(.bytes))]
    Decode {
        bytes: Vec<u8>,
        #[source]
        source: Utf8Error,
    },

    /// Line text is not a floating-point literal
    #[error("Line is not a number ({source}): {text:?}")]
    Parse {
        text: String,
        #[source]
        source: ParseFloatError,
    },

    /// Cancelled, usually by Ctrl+C
    #[error("Interrupted")]
    Interrupted,

    /// No complete line arrived in time
    #[error("No complete line within {0:?}")]
    Timeout(Duration),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for this tool
    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ReadError {
    /// Whether this error happens before the first read attempt
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            ReadError::Open { .. }
                | ReadError::Flush { .. }
                | ReadError::Config(_)
                | ReadError::ConfigFile { .. }
                | ReadError::ConfigParse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReadError>;

/// Render raw line bytes for diagnostics, e.g. `"ab\xff\r\n"`
pub fn escape(bytes: &[u8]) -> String {
    format!("\"{}\"", bytes.escape_ascii())
}
