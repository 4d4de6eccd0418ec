//! Cooperative reader over a byte stream, generalizing the free functions in
//! the teacher's `utils.rs` into one stateful type that also knows how to
//! search for a line by regex, forward raw byte flows, and hand its reader
//! away permanently via [`Parser::raw`].

use std::io::{Read, Write};

use regex::Regex;

use crate::error::{AdbError, AdbResult};
use crate::protocol;

/// Cursor over an incoming byte stream.
///
/// `Parser` borrows nothing; it owns `R` outright, mirroring the single-use
/// nature of an ADB `Connection`'s reader. Once [`Parser::raw`] is called,
/// the parser is consumed and its reader handed to the caller — there is no
/// way to keep using the parser afterward, which is enforced at compile time
/// rather than with an `ended` runtime flag.
pub struct Parser<R> {
    reader: R,
    ended: bool,
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            ended: false,
        }
    }

    /// Has the underlying stream been observed to end?
    pub fn ended(&self) -> bool {
        self.ended
    }

    /// Read exactly `how_many` bytes, failing with [`AdbError::PrematureEof`]
    /// if the stream closes first.
    pub fn read_bytes(&mut self, how_many: usize) -> AdbResult<Vec<u8>> {
        if how_many == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; how_many];
        let mut read = 0;
        while read < how_many {
            let n = self.reader.read(&mut buf[read..])?;
            if n == 0 {
                self.ended = true;
                return Err(AdbError::PrematureEof {
                    missing: how_many - read,
                });
            }
            read += n;
        }
        Ok(buf)
    }

    /// Read `how_many` bytes and decode them as ASCII.
    pub fn read_ascii(&mut self, how_many: usize) -> AdbResult<String> {
        let chunk = self.read_bytes(how_many)?;
        String::from_utf8(chunk).map_err(|e| AdbError::ParseError(e.to_string()))
    }

    /// Read a 4-hex-digit length prefix, then that many bytes.
    pub fn read_value(&mut self) -> AdbResult<Vec<u8>> {
        let length_str = self.read_ascii(4)?;
        let length =
            protocol::decode_length(&length_str).map_err(|e| AdbError::ParseError(e.to_string()))?;
        self.read_bytes(length)
    }

    /// Read until (and discard) the delimiter byte, returning everything
    /// before it.
    pub fn read_until(&mut self, code: u8) -> AdbResult<Vec<u8>> {
        let mut buffer = Vec::new();
        loop {
            let chunk = self.read_bytes(1)?;
            if chunk[0] == code {
                return Ok(buffer);
            }
            buffer.push(chunk[0]);
        }
    }

    /// Read a `\n`-terminated line, stripping a trailing `\r` if present.
    pub fn read_line(&mut self) -> AdbResult<String> {
        let mut line = self.read_until(b'\n')?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8(line).map_err(|e| AdbError::ParseError(e.to_string()))
    }

    /// Read lines until one matches `regex`, returning the matched line.
    /// Returns `Ok(None)` if the stream ends first without a match.
    pub fn search_line(&mut self, regex: &Regex) -> AdbResult<Option<String>> {
        loop {
            let line = match self.read_line() {
                Ok(line) => line,
                Err(AdbError::PrematureEof { .. }) => return Ok(None),
                Err(e) => return Err(e),
            };
            if regex.is_match(&line) {
                return Ok(Some(line));
            }
            if self.ended {
                return Ok(None);
            }
        }
    }

    /// Forward exactly `how_many` bytes to `sink` in <=4KiB chunks.
    pub fn read_byte_flow<W: Write>(&mut self, how_many: usize, sink: &mut W) -> AdbResult<()> {
        let mut remaining = how_many;
        let mut chunk = [0u8; 4096];
        while remaining > 0 {
            let want = remaining.min(chunk.len());
            let n = self.reader.read(&mut chunk[..want])?;
            if n == 0 {
                self.ended = true;
                return Err(AdbError::PrematureEof { missing: remaining });
            }
            sink.write_all(&chunk[..n])?;
            remaining -= n;
        }
        Ok(())
    }

    /// Drain the stream to EOF, returning everything read.
    pub fn read_all(&mut self) -> AdbResult<Vec<u8>> {
        let mut out = Vec::new();
        self.reader.read_to_end(&mut out)?;
        self.ended = true;
        Ok(out)
    }

    /// Read a length-prefixed error message and fail with it.
    pub fn read_error<T>(&mut self) -> AdbResult<T> {
        let value = self.read_value()?;
        Err(AdbError::Fail(String::from_utf8_lossy(&value).into_owned()))
    }

    /// Fail because `got` did not match any of `expected`.
    pub fn unexpected<T>(&self, got: &str, expected: &str) -> AdbResult<T> {
        Err(AdbError::UnexpectedData {
            got: got.to_string(),
            expected: expected.to_string(),
        })
    }

    /// Consume the parser, handing its reader to the caller. Subsequent use
    /// of the parser is impossible — it no longer exists.
    pub fn raw(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn parser_of(bytes: &[u8]) -> Parser<Cursor<Vec<u8>>> {
        Parser::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn read_bytes_exact() {
        let mut p = parser_of(b"hello world");
        assert_eq!(p.read_bytes(5).unwrap(), b"hello");
    }

    #[test]
    fn read_bytes_premature_eof() {
        let mut p = parser_of(b"ab");
        let err = p.read_bytes(5).unwrap_err();
        match err {
            AdbError::PrematureEof { missing } => assert_eq!(missing, 3),
            other => panic!("wrong error: {other:?}"),
        }
        assert!(p.ended());
    }

    #[test]
    fn read_value_roundtrip() {
        let mut p = parser_of(b"0005hello");
        assert_eq!(p.read_value().unwrap(), b"hello");
    }

    #[test]
    fn read_line_strips_cr() {
        let mut p = parser_of(b"foo\r\nbar\n");
        assert_eq!(p.read_line().unwrap(), "foo");
        assert_eq!(p.read_line().unwrap(), "bar");
    }

    #[test]
    fn search_line_finds_match() {
        let mut p = parser_of(b"nope\nSuccess\nmore\n");
        let re = Regex::new(r"^(Success|Failure)$").unwrap();
        assert_eq!(p.search_line(&re).unwrap(), Some("Success".to_string()));
    }

    #[test]
    fn search_line_returns_none_on_eof() {
        let mut p = parser_of(b"nope\nnah\n");
        let re = Regex::new(r"^Success$").unwrap();
        assert_eq!(p.search_line(&re).unwrap(), None);
    }

    #[test]
    fn read_byte_flow_forwards_chunks() {
        let mut p = parser_of(&vec![0xABu8; 10_000]);
        let mut sink = Vec::new();
        p.read_byte_flow(10_000, &mut sink).unwrap();
        assert_eq!(sink.len(), 10_000);
        assert!(sink.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn read_error_wraps_message() {
        let mut p = parser_of(b"0003bad");
        let err: AdbError = p.read_error::<()>().unwrap_err();
        match err {
            AdbError::Fail(msg) => assert_eq!(msg, "bad"),
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[test]
    fn raw_consumes_parser() {
        let p = parser_of(b"leftover");
        let mut reader = p.raw();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"leftover");
    }
}
