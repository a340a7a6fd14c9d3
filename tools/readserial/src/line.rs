//! Line framing and reading decode
//!
//! A line is everything up to and including a line feed. Each line carries
//! one floating-point literal, usually followed by CR LF.

use crate::cancel::CancelToken;
use crate::error::{ReadError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

/// Size of a single read from the underlying stream
const CHUNK_SIZE: usize = 256;

/// Longest line accepted before giving up on finding a line feed
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// Bytes of an overlong line kept for the error message
const OVERLONG_HEAD_LEN: usize = 32;

/// How the terminator is removed from a received line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Terminator {
    /// Strip a trailing LF, then a CR if one precedes it
    #[default]
    Lenient,
    /// Drop exactly the last two bytes, whatever they are
    Fixed,
    /// Require CR LF; anything else is an error
    Strict,
}

impl Terminator {
    /// Return the line content without its terminator
    pub fn strip<'a>(&self, line: &'a [u8]) -> Result<&'a [u8]> {
        match self {
            Terminator::Lenient => {
                let line = line.strip_suffix(b"\n").unwrap_or(line);
                Ok(line.strip_suffix(b"\r").unwrap_or(line))
            }
            Terminator::Fixed => Ok(&line[..line.len().saturating_sub(2)]),
            Terminator::Strict => line.strip_suffix(b"\r\n").ok_or_else(|| ReadError::Terminator {
                bytes: line.to_vec(),
            }),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Lenient => write!(f, "lenient"),
            Terminator::Fixed => write!(f, "fixed"),
            Terminator::Strict => write!(f, "strict"),
        }
    }
}

/// A single numeric value received from the device
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Reading(pub f64);

impl Reading {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Turn one raw line into a reading: strip, decode as UTF-8, parse as float.
///
/// Whitespace around the literal is ignored; an empty line is a parse error.
pub fn decode_reading(line: &[u8], terminator: Terminator) -> Result<Reading> {
    let body = terminator.strip(line)?;

    let text = std::str::from_utf8(body).map_err(|source| ReadError::Decode {
        bytes: line.to_vec(),
        source,
    })?;

    text.trim()
        .parse::<f64>()
        .map(Reading)
        .map_err(|source| ReadError::Parse {
            text: text.to_string(),
            source,
        })
}

/// Splits a byte stream into LF-terminated lines
///
/// Bytes after a line feed stay buffered for the next call. Read timeouts from
/// the underlying stream are treated as poll ticks: pending bytes are kept and
/// the cancellation token and deadline are checked before reading again.
pub struct LineReader<R> {
    inner: R,
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to contain no line feed
    scanned: usize,
    max_line_len: usize,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(CHUNK_SIZE),
            scanned: 0,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Set the longest line, terminator included, before `LineTooLong`
    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Access the wrapped stream
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap the stream, discarding any pending bytes
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Bytes received that are not yet part of a complete line
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Block until one complete line is available and return it, terminator
    /// included.
    pub fn read_line(&mut self, cancel: &CancelToken, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let started = Instant::now();
        let mut chunk = [0u8; CHUNK_SIZE];

        loop {
            if let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
                let end = self.scanned + offset + 1;
                if end <= self.max_line_len {
                    let rest = self.buffer.split_off(end);
                    self.scanned = 0;
                    return Ok(std::mem::replace(&mut self.buffer, rest));
                }
            }
            self.scanned = self.buffer.len();

            if self.buffer.len() > self.max_line_len {
                let head = self.buffer[..OVERLONG_HEAD_LEN.min(self.buffer.len())].to_vec();
                self.buffer.clear();
                self.scanned = 0;
                return Err(ReadError::LineTooLong {
                    limit: self.max_line_len,
                    head,
                });
            }

            if cancel.is_cancelled() {
                return Err(ReadError::Interrupted);
            }

            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(ReadError::Timeout(limit));
                }
            }

            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    if !self.buffer.is_empty() {
                        log::debug!(
                            "Dropping {} unterminated bytes at end of stream",
                            self.buffer.len()
                        );
                    }
                    return Err(ReadError::Closed);
                }
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    continue;
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ReadError::Io(e)),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Scripted stream: each step is either a chunk of bytes or an error kind
    pub(crate) struct ScriptedStream {
        steps: VecDeque<io::Result<Vec<u8>>>,
        /// Cancelled when the script runs out, to stop the reader
        on_exhausted: Option<CancelToken>,
    }

    impl ScriptedStream {
        pub(crate) fn new() -> Self {
            Self {
                steps: VecDeque::new(),
                on_exhausted: None,
            }
        }

        pub(crate) fn bytes(mut self, data: &[u8]) -> Self {
            self.steps.push_back(Ok(data.to_vec()));
            self
        }

        pub(crate) fn error(mut self, kind: ErrorKind) -> Self {
            self.steps.push_back(Err(io::Error::new(kind, "scripted")));
            self
        }

        /// Once the script is consumed, keep timing out and cancel `token`
        pub(crate) fn cancel_when_done(mut self, token: &CancelToken) -> Self {
            self.on_exhausted = Some(token.clone());
            self
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Ok(data)) => {
                    assert!(data.len() <= buf.len());
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(Err(e)) => Err(e),
                None => match self.on_exhausted {
                    Some(ref token) => {
                        token.cancel();
                        Err(io::Error::new(ErrorKind::TimedOut, "scripted"))
                    }
                    None => Ok(0),
                },
            }
        }
    }

    #[test]
    fn test_strip_lenient() {
        let t = Terminator::Lenient;
        assert_eq!(t.strip(b"3.14\r\n").unwrap(), b"3.14");
        assert_eq!(t.strip(b"3.14\n").unwrap(), b"3.14");
        assert_eq!(t.strip(b"3.14").unwrap(), b"3.14");
        assert_eq!(t.strip(b"\r\n").unwrap(), b"");
    }

    #[test]
    fn test_strip_fixed_drops_two_bytes() {
        let t = Terminator::Fixed;
        assert_eq!(t.strip(b"3.14\r\n").unwrap(), b"3.14");
        // A bare LF costs the last digit
        assert_eq!(t.strip(b"3.14\n").unwrap(), b"3.1");
        assert_eq!(t.strip(b"\n").unwrap(), b"");
    }

    #[test]
    fn test_strip_strict() {
        let t = Terminator::Strict;
        assert_eq!(t.strip(b"3.14\r\n").unwrap(), b"3.14");
        let err = t.strip(b"3.14\n").unwrap_err();
        assert!(matches!(err, ReadError::Terminator { ref bytes } if bytes == b"3.14\n"));
    }

    #[test]
    fn test_decode_valid_literals() {
        let cases: &[(&[u8], f64)] = &[
            (&b"3.25\r\n"[..], 3.25),
            (&b"-0.5\r\n"[..], -0.5),
            (&b"42\r\n"[..], 42.0),
            (&b"1e3\r\n"[..], 1000.0),
            (&b"  2.5 \r\n"[..], 2.5),
        ];
        for (line, expected) in cases {
            let reading = decode_reading(line, Terminator::Lenient).unwrap();
            assert_eq!(reading.value(), *expected, "line {:?}", line);
        }
    }

    #[test]
    fn test_decode_special_values() {
        let inf = decode_reading(b"inf\r\n", Terminator::Lenient).unwrap();
        assert!(inf.value().is_infinite());
        let nan = decode_reading(b"NaN\r\n", Terminator::Lenient).unwrap();
        assert!(nan.value().is_nan());
    }

    #[test]
    fn test_decode_rejects_text() {
        let err = decode_reading(b"abc\r\n", Terminator::Lenient).unwrap_err();
        assert!(matches!(err, ReadError::Parse { ref text, .. } if text == "abc"));

        let err = decode_reading(b"\r\n", Terminator::Lenient).unwrap_err();
        assert!(matches!(err, ReadError::Parse { .. }));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = decode_reading(b"\xff\xfe1.0\r\n", Terminator::Lenient).unwrap_err();
        match err {
            ReadError::Decode { bytes, .. } => assert_eq!(bytes, b"\xff\xfe1.0\r\n"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_reading_display() {
        let reading = decode_reading(b"3.14\r\n", Terminator::Lenient).unwrap();
        assert_eq!(reading.to_string(), "3.14");
        assert_eq!(Reading(-2.0).to_string(), "-2");
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let token = CancelToken::new();
        let stream = ScriptedStream::new().bytes(b"1.0\r\n2.0\r\n3.");
        let mut reader = LineReader::new(stream);

        assert_eq!(reader.read_line(&token, None).unwrap(), b"1.0\r\n");
        assert_eq!(reader.read_line(&token, None).unwrap(), b"2.0\r\n");
        assert_eq!(reader.pending(), b"3.");
    }

    #[test]
    fn test_line_split_across_timeouts() {
        let token = CancelToken::new();
        let stream = ScriptedStream::new()
            .bytes(b"12")
            .error(ErrorKind::TimedOut)
            .bytes(b".5\r")
            .error(ErrorKind::Interrupted)
            .bytes(b"\n");
        let mut reader = LineReader::new(stream);

        assert_eq!(reader.read_line(&token, None).unwrap(), b"12.5\r\n");
        assert!(reader.pending().is_empty());
    }

    #[test]
    fn test_line_feed_found_after_many_chunks() {
        let token = CancelToken::new();
        let mut stream = ScriptedStream::new();
        for _ in 0..10 {
            stream = stream.bytes(b"0000000000");
        }
        let stream = stream.bytes(b"1\r\n2");
        let mut reader = LineReader::new(stream);

        let line = reader.read_line(&token, None).unwrap();
        assert_eq!(line.len(), 103);
        assert!(line.ends_with(b"1\r\n"));
        assert_eq!(reader.pending(), b"2");
    }

    #[test]
    fn test_overlong_line_is_rejected() {
        let token = CancelToken::new();
        let stream = ScriptedStream::new()
            .bytes(b"garbage-without-newline")
            .bytes(b"-still-going")
            .bytes(b"\r\n");
        let mut reader = LineReader::new(stream).with_max_line_len(16);

        match reader.read_line(&token, None) {
            Err(ReadError::LineTooLong { limit, head }) => {
                assert_eq!(limit, 16);
                assert!(head.starts_with(b"garbage"));
            }
            other => panic!("expected overlong line error, got {other:?}"),
        }
        assert!(reader.pending().is_empty());
    }

    #[test]
    fn test_line_at_limit_is_accepted() {
        let token = CancelToken::new();
        let stream = ScriptedStream::new().bytes(b"12.5\r\n");
        let mut reader = LineReader::new(stream).with_max_line_len(6);

        assert_eq!(reader.read_line(&token, None).unwrap(), b"12.5\r\n");
    }

    #[test]
    fn test_end_of_stream() {
        let token = CancelToken::new();
        let stream = ScriptedStream::new().bytes(b"7.0");
        let mut reader = LineReader::new(stream);

        assert!(matches!(reader.read_line(&token, None), Err(ReadError::Closed)));
    }

    #[test]
    fn test_cancel_during_blocking_read() {
        let token = CancelToken::new();
        let stream = ScriptedStream::new().bytes(b"1.").cancel_when_done(&token);
        let mut reader = LineReader::new(stream);

        assert!(matches!(reader.read_line(&token, None), Err(ReadError::Interrupted)));
    }

    #[test]
    fn test_other_io_errors_propagate() {
        let token = CancelToken::new();
        let stream = ScriptedStream::new().error(ErrorKind::BrokenPipe);
        let mut reader = LineReader::new(stream);

        match reader.read_line(&token, None) {
            Err(ReadError::Io(e)) => assert_eq!(e.kind(), ErrorKind::BrokenPipe),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    /// Stream that always times out
    struct Silent;

    impl Read for Silent {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(Duration::from_millis(5));
            Err(io::Error::new(ErrorKind::TimedOut, "silent"))
        }
    }

    #[test]
    fn test_timeout_expires() {
        let token = CancelToken::new();
        let mut reader = LineReader::new(Silent);
        let limit = Duration::from_millis(30);

        match reader.read_line(&token, Some(limit)) {
            Err(ReadError::Timeout(d)) => assert_eq!(d, limit),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
