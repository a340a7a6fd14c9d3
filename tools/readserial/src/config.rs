//! Reader configuration
//!
//! Settings come from built-in defaults, an optional TOML file, and command
//! line overrides, in that order.

use crate::error::{ReadError, Result};
use crate::line::Terminator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default serial device node
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyACM0";

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default port read timeout, used as the cancellation poll interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Printed before every read attempt
pub const DEFAULT_STATUS_NOTICE: &str = "Reading...";

/// Printed once when the read loop ends, whatever the cause
pub const DEFAULT_TERMINATION_NOTICE: &str = "Keyboard Interrupt";

/// Configuration for a [`SerialLineReader`](crate::reader::SerialLineReader)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Serial port path (e.g., /dev/ttyACM0, COM3)
    pub device_path: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Give up when no complete line arrives within this many milliseconds.
    /// Absent means wait forever.
    pub timeout_ms: Option<u64>,
    /// Port read timeout; cancellation is checked this often
    pub poll_interval_ms: u64,
    /// How the line terminator is removed
    pub terminator: Terminator,
    /// Discard bytes buffered by the driver before the first read
    pub flush_on_open: bool,
    /// Prefix each reading with a local timestamp
    pub show_timestamps: bool,
    pub status_notice: String,
    pub termination_notice: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            device_path: DEFAULT_DEVICE_PATH.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            terminator: Terminator::default(),
            flush_on_open: true,
            show_timestamps: false,
            status_notice: DEFAULT_STATUS_NOTICE.to_string(),
            termination_notice: DEFAULT_TERMINATION_NOTICE.to_string(),
        }
    }
}

impl ReaderConfig {
    /// Create a configuration for the given device with default settings
    pub fn new(device_path: &str) -> Self {
        Self {
            device_path: device_path.to_string(),
            ..Default::default()
        }
    }

    /// Load a configuration from a TOML file; missing keys take defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ReadError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ReadError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Set the device path
    pub fn with_device_path(mut self, device_path: &str) -> Self {
        self.device_path = device_path.to_string();
        self
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the per-line timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Set the terminator policy
    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn with_flush_on_open(mut self, flush: bool) -> Self {
        self.flush_on_open = flush;
        self
    }

    pub fn with_timestamps(mut self, show: bool) -> Self {
        self.show_timestamps = show;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values the port or the loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.device_path.trim().is_empty() {
            return Err(ReadError::Config("device_path must not be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(ReadError::Config("baud_rate must be positive".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ReadError::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(ReadError::Config(
                "timeout_ms must be positive; omit it to wait forever".to_string(),
            ));
        }
        Ok(())
    }
}
