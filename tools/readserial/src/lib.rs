//! Serial reading monitor
//!
//! Reads newline-terminated floating-point values from a serial device and
//! prints each one as it arrives. The first malformed line, I/O error, or
//! Ctrl+C ends the run with a single termination notice.
//!
//! ```no_run
//! use readserial::{CancelToken, ReaderConfig, SerialLineReader};
//!
//! let config = ReaderConfig::new("/dev/ttyACM0").with_baud_rate(115200);
//! let mut reader = SerialLineReader::open(config, CancelToken::new())?;
//! let end = reader.run(&mut std::io::stdout());
//! eprintln!("stopped after {} readings: {}", end.readings, end.cause);
//! # Ok::<(), readserial::ReadError>(())
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod line;
pub mod port;
pub mod reader;

pub use cancel::CancelToken;
pub use config::ReaderConfig;
pub use error::ReadError;
pub use line::{decode_reading, LineReader, Reading, Terminator};
pub use reader::{SerialLineReader, Termination};
