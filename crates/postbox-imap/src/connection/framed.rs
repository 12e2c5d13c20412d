//! Framed I/O for IMAP protocol.
//!
//! IMAP uses CRLF-terminated lines with support for literals.
//! This module provides buffered reading and writing with proper
//! handling of the IMAP framing.

#![allow(clippy::missing_errors_doc)]

use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::error::is_timeout;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Maximum literal size to prevent memory exhaustion.
pub const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Framed connection for IMAP protocol.
///
/// Handles line-based reading with literal support and buffered writing.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    io_timeout: Duration,
}

impl<S> std::fmt::Debug for FramedStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedStream")
            .field("buffered", &self.reader.buffer().len())
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

impl<S: Read + Write> FramedStream<S> {
    /// Creates a new framed stream. `io_timeout` is reported when a read or
    /// write times out.
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            io_timeout,
        }
    }

    /// Reads a complete IMAP response, handling literals.
    ///
    /// A line ending in `{n}`, `{n+}` or `~{n}` is followed by exactly `n`
    /// raw bytes, after which line reading resumes. Literal payloads are
    /// never scanned for CRLF.
    pub fn read_response(&mut self) -> Result<Bytes> {
        let mut response = BytesMut::new();

        loop {
            let start = response.len();
            self.read_line(&mut response)?;
            trace!(line = %String::from_utf8_lossy(&response[start..]).trim_end(), "S:");

            let Some(literal_len) = parse_literal_length(&response[start..]) else {
                break;
            };
            if literal_len > MAX_LITERAL_SIZE {
                return Err(Error::Unknown(format!(
                    "Literal too large: {literal_len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }

            let offset = response.len();
            response.resize(offset + literal_len, 0);
            self.reader
                .read_exact(&mut response[offset..])
                .map_err(|e| self.io_error(e))?;
        }

        Ok(response.freeze())
    }

    /// Reads a single CRLF-terminated line, appending it to `out`.
    fn read_line(&mut self, out: &mut BytesMut) -> Result<()> {
        let mut line = Vec::new();
        let limit = (MAX_LINE_LENGTH + 1) as u64;
        let result = (&mut self.reader).take(limit).read_until(b'\n', &mut line);
        let n = result.map_err(|e| self.io_error(e))?;

        if !line.ends_with(b"\n") {
            if n > MAX_LINE_LENGTH {
                return Err(Error::Unknown(format!(
                    "Line too long (max {MAX_LINE_LENGTH} bytes)"
                )));
            }
            return Err(Error::ConnectFailure {
                message: "Connection closed by server".to_string(),
                source: Some(io::ErrorKind::UnexpectedEof.into()),
            });
        }

        out.extend_from_slice(&line);
        Ok(())
    }

    /// Buffers bytes for the next [`flush`](Self::flush).
    pub fn write(&mut self, data: &[u8]) {
        self.write_buffer.extend_from_slice(data);
    }

    /// Writes out everything buffered.
    pub fn flush(&mut self) -> Result<()> {
        let data = self.write_buffer.split();
        let stream = self.reader.get_mut();
        let result = stream.write_all(&data).and_then(|()| stream.flush());
        result.map_err(|e| self.io_error(e))
    }

    fn io_error(&self, e: io::Error) -> Error {
        if is_timeout(&e) {
            Error::Timeout(self.io_timeout)
        } else {
            Error::Io(e)
        }
    }

    /// Returns true if bytes are buffered but not yet consumed.
    pub fn has_buffered_input(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    /// Gets a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Gets a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Any buffered data is lost.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Parses a literal length from the end of a line.
///
/// Matches `{123}\r\n`, `{123+}\r\n` and `~{123}\r\n`.
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);

    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Reads from a fixed script, records writes.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        chunk: usize,
    }

    impl Duplex {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
                chunk: usize::MAX,
            }
        }
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.input.read(&mut buf[..n])
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn framed(input: &[u8]) -> FramedStream<Duplex> {
        FramedStream::new(Duplex::new(input), Duration::from_secs(1))
    }

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"* 1 FETCH (BODY[] {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"A1 APPEND INBOX {5+}\r\n"), Some(5));
        assert_eq!(parse_literal_length(b"* 1 FETCH (BINARY[] ~{7}\r\n"), Some(7));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"* OK done\r\n"), None);
        assert_eq!(parse_literal_length(b"* OK {abc}\r\n"), None);
        assert_eq!(parse_literal_length(b"* OK {}\r\n"), None);
        assert_eq!(parse_literal_length(b"{5}"), None);
    }

    #[test]
    fn test_read_simple_response() {
        let mut stream = framed(b"* OK ready\r\n0000 OK done\r\n");
        assert_eq!(&stream.read_response().unwrap()[..], b"* OK ready\r\n");
        assert_eq!(&stream.read_response().unwrap()[..], b"0000 OK done\r\n");
    }

    #[test]
    fn test_read_response_with_literal() {
        let mut stream = framed(b"* 1 FETCH (BODY[] {7}\r\nab\r\ncd\r\n UID 4)\r\n");
        assert_eq!(
            &stream.read_response().unwrap()[..],
            b"* 1 FETCH (BODY[] {7}\r\nab\r\ncd\r\n UID 4)\r\n"
        );
    }

    #[test]
    fn test_read_response_with_two_literals() {
        let mut stream = framed(b"* 1 FETCH (BODY[1] {1}\r\na BODY[2] {2}\r\nbc)\r\nnext\r\n");
        assert_eq!(
            &stream.read_response().unwrap()[..],
            b"* 1 FETCH (BODY[1] {1}\r\na BODY[2] {2}\r\nbc)\r\n"
        );
        assert_eq!(&stream.read_response().unwrap()[..], b"next\r\n");
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut duplex = Duplex::new(b"* OK split\r\n");
        duplex.chunk = 1;
        let mut stream = FramedStream::new(duplex, Duration::from_secs(1));
        assert_eq!(&stream.read_response().unwrap()[..], b"* OK split\r\n");
    }

    #[test]
    fn test_eof_is_connect_failure() {
        let mut stream = framed(b"* OK partial");
        let err = stream.read_response().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConnectFailure);
    }

    #[test]
    fn test_line_too_long() {
        let mut input = vec![b'a'; MAX_LINE_LENGTH + 10];
        input.extend_from_slice(b"\r\n");
        let mut stream = framed(&input);
        assert!(matches!(stream.read_response(), Err(Error::Unknown(_))));
    }

    #[test]
    fn test_literal_too_large() {
        let mut stream = framed(b"* 1 FETCH (BODY[] {999999999999}\r\n");
        assert!(matches!(stream.read_response(), Err(Error::Unknown(_))));
    }

    #[test]
    fn test_write_and_flush() {
        let mut stream = framed(b"");
        stream.write(b"0000 ");
        stream.write(b"NOOP\r\n");
        assert!(stream.get_ref().output.is_empty());
        stream.flush().unwrap();
        assert_eq!(stream.get_ref().output, b"0000 NOOP\r\n");
    }
}
