//! One TCP session to the ADB daemon, with the auto-start-and-retry-once
//! policy from spec.md §4.2.

use std::io::Write;
use std::net::TcpStream;
use std::process::Command;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{AdbError, AdbResult};
use crate::parser::Parser;
use crate::protocol;

/// A connection to the ADB daemon: one `TcpStream`, a [`Parser`] over a
/// second handle to the same socket, and the one-shot auto-start flag.
///
/// `writer` and the stream inside `parser` are independent `TcpStream`
/// clones of the same underlying socket (`TcpStream::try_clone`), so reads
/// and writes can proceed through separate halves without a `RefCell` or
/// mutex — the same pattern the teacher uses for its single
/// `std::net::TcpStream`, just split in two for borrow-checker convenience.
pub struct Connection {
    config: Config,
    writer: TcpStream,
    parser: Parser<TcpStream>,
    tried_start: bool,
}

impl Connection {
    /// Open a TCP session to `config.host:config.port`. If the first
    /// attempt is refused, spawn `config.bin start-server`, wait for it to
    /// exit, and retry exactly once; further refusals surface as errors.
    pub fn connect(config: Config) -> AdbResult<Self> {
        Self::connect_inner(config, false)
    }

    fn connect_inner(config: Config, tried_start: bool) -> AdbResult<Self> {
        trace!("connecting to {}:{}...", config.host, config.port);
        match TcpStream::connect((config.host, config.port)) {
            Ok(stream) => {
                stream.set_read_timeout(Some(Duration::from_secs(30)))?;
                let reader = stream.try_clone()?;
                trace!("connected");
                Ok(Self {
                    writer: stream,
                    parser: Parser::new(reader),
                    tried_start,
                    config,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::ConnectionRefused && !tried_start => {
                warn!("connection was refused, trying to start the server once");
                Self::start_server(&config)?;
                Self::connect_inner(config, true)
            }
            Err(err) => Err(AdbError::Io(err)),
        }
    }

    fn start_server(config: &Config) -> AdbResult<()> {
        debug!("starting ADB server via '{} start-server'", config.bin);
        let status = Command::new(&config.bin).arg("start-server").status()?;
        if !status.success() {
            return Err(AdbError::CommandFailed(format!(
                "'{} start-server' exited with {status}",
                config.bin
            )));
        }
        Ok(())
    }

    /// Write a length-prefixed ASCII request string (the host-protocol
    /// command framing). Sub-protocols that frame their own bytes (sync,
    /// bridge service forwarding) use [`Connection::write_raw`] instead.
    pub fn write_request(&mut self, request: &str) -> AdbResult<()> {
        let framed = protocol::encode_data(request.as_bytes());
        self.writer.write_all(&framed)?;
        Ok(())
    }

    /// Write bytes with no additional framing.
    pub fn write_raw(&mut self, bytes: &[u8]) -> AdbResult<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    pub fn parser(&mut self) -> &mut Parser<TcpStream> {
        &mut self.parser
    }

    /// An independent clone of the underlying socket, for a caller that
    /// needs to `shutdown()` the connection from another thread while a
    /// blocking read is in progress on this one (e.g. [`crate::tracker::Tracker`]).
    pub fn shutdown_handle(&self) -> AdbResult<TcpStream> {
        Ok(self.writer.try_clone()?)
    }

    /// Read the 4-byte status tag and translate `FAIL` into an error,
    /// leaving `OKAY` to the caller. Implements the "every request skeleton"
    /// of spec.md §4.3.
    pub fn read_status(&mut self) -> AdbResult<()> {
        let tag = self.parser.read_ascii(4)?;
        match tag.as_str() {
            "OKAY" => Ok(()),
            "FAIL" => self.parser.read_error(),
            other => self.parser.unexpected(other, "OKAY or FAIL"),
        }
    }

    /// Hand the connection over for raw byte-stream use (sync sub-protocol,
    /// shell passthrough). The parser's half of the socket is discarded;
    /// the returned stream is the other, still-live clone of the same
    /// socket, so nothing is lost.
    pub fn into_raw(self) -> TcpStream {
        let _ = self.parser.raw();
        self.writer
    }

    pub fn close(self) -> AdbResult<()> {
        self.writer.shutdown(std::net::Shutdown::Both).ok();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;
    use std::net::{Ipv4Addr, TcpListener};
    use std::thread;

    #[test]
    fn connect_and_round_trip_status() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 13];
            sock.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"0009host:kill");
            sock.write_all(b"OKAY").unwrap();
        });

        let config = Config::new().with_host(Ipv4Addr::LOCALHOST).with_port(port);
        let mut conn = Connection::connect(config).unwrap();
        conn.write_request("host:kill").unwrap();
        conn.read_status().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn fail_status_surfaces_message() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 11];
            sock.read_exact(&mut buf).unwrap();
            sock.write_all(b"FAIL0003bad").unwrap();
        });

        let config = Config::new().with_host(Ipv4Addr::LOCALHOST).with_port(port);
        let mut conn = Connection::connect(config).unwrap();
        conn.write_request("host:x").unwrap();
        let err = conn.read_status().unwrap_err();
        match err {
            AdbError::Fail(msg) => assert_eq!(msg, "bad"),
            other => panic!("wrong error: {other:?}"),
        }
        server.join().unwrap();
    }
}
