//! The `sync:` sub-protocol: STAT/LIST/SEND/RECV framed in little-endian
//! binary rather than the host protocol's 4-hex-digit ASCII lengths.
//! Grounded on `adb/sync.py`, `adb/_sync/stats.py`, `adb/_sync/entry.py`,
//! `adb/sync/pushtransfer.py` and `adb/sync/pulltransfer.py`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::connection::Connection;
use crate::error::{AdbError, AdbResult};
use crate::protocol;

const DATA_MAX_LENGTH: usize = 65536;
pub const TEMP_PATH: &str = "/data/local/tmp";
pub const DEFAULT_CHMOD: u32 = 0o644;

const S_IFMT: u32 = 0xf000;
const S_IFREG: u32 = 0x8000;
const S_IFDIR: u32 = 0x4000;
const S_IFLNK: u32 = 0xa000;

/// `/data/local/tmp/<basename>`, for staging a push before `pm install`.
pub fn temp(path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    format!("{TEMP_PATH}/{name}")
}

/// A `STAT` reply: file type/permission bits, size, and modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub mode: u32,
    pub size: u32,
    pub mtime: u32,
}

impl Stats {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & S_IFMT == S_IFLNK
    }
}

/// One `DENT` row from `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub stats: Stats,
}

/// Progress/lifecycle events for a push or pull, sent on the channel
/// returned alongside the transfer so the caller can report progress
/// without blocking the transfer loop.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    Progress { bytes_transferred: u64 },
    Cancelled,
    Error(String),
    End,
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// A cancel-capable handle to a running push or pull, mirroring
/// [`crate::tracker::Tracker`]'s shutdown-handle-plus-background-thread
/// shape. Dropping the handle blocks until the transfer thread exits.
pub struct TransferHandle {
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TransferHandle {
    /// Request that the transfer stop at its next chunk boundary. The
    /// transfer loop checks this flag between chunks (push) or reads
    /// (pull) and emits [`TransferEvent::Cancelled`] instead of running
    /// to completion.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Block until the transfer thread has exited.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for TransferHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// A live `sync:` session. Consumes the [`Connection`] it was opened from;
/// call [`Sync::end`] (or just drop it) to close the underlying socket.
pub struct Sync {
    connection: Connection,
}

impl Sync {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    fn send_command_with_arg(&mut self, cmd: &[u8; 4], arg: &str) -> AdbResult<()> {
        debug!(cmd = %String::from_utf8_lossy(cmd), arg, "sync command");
        let arg_bytes = arg.as_bytes();
        let mut payload = Vec::with_capacity(8 + arg_bytes.len());
        payload.extend_from_slice(cmd);
        payload.extend_from_slice(&(arg_bytes.len() as u32).to_le_bytes());
        payload.extend_from_slice(arg_bytes);
        self.connection.write_raw(&payload)
    }

    fn send_command_with_length(&mut self, cmd: &[u8; 4], length: u32) -> AdbResult<()> {
        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(cmd);
        payload.extend_from_slice(&length.to_le_bytes());
        self.connection.write_raw(&payload)
    }

    fn read_error<T>(&mut self) -> AdbResult<T> {
        self.connection.parser().read_error()
    }

    /// `STAT path`
    pub fn stat(&mut self, path: &str) -> AdbResult<Stats> {
        self.send_command_with_arg(protocol::STAT, path)?;
        let reply = self.connection.parser().read_ascii(4)?;
        match reply.as_bytes() {
            b"STAT" => {
                let data = self.connection.parser().read_bytes(12)?;
                let mode = u32::from_le_bytes(data[0..4].try_into().unwrap());
                let size = u32::from_le_bytes(data[4..8].try_into().unwrap());
                let mtime = u32::from_le_bytes(data[8..12].try_into().unwrap());
                if mode == 0 {
                    return Err(AdbError::ResponseError(format!(
                        "no such file or directory: '{path}'"
                    )));
                }
                Ok(Stats { mode, size, mtime })
            }
            b"FAIL" => self.read_error(),
            _ => self.connection.parser().unexpected(&reply, "STAT or FAIL"),
        }
    }

    /// `LIST path`
    pub fn readdir(&mut self, path: &str) -> AdbResult<Vec<Entry>> {
        self.send_command_with_arg(protocol::LIST, path)?;
        let mut entries = Vec::new();
        loop {
            let reply = self.connection.parser().read_ascii(4)?;
            match reply.as_bytes() {
                b"DENT" => {
                    let data = self.connection.parser().read_bytes(16)?;
                    let mode = u32::from_le_bytes(data[0..4].try_into().unwrap());
                    let size = u32::from_le_bytes(data[4..8].try_into().unwrap());
                    let mtime = u32::from_le_bytes(data[8..12].try_into().unwrap());
                    let namelen = u32::from_le_bytes(data[12..16].try_into().unwrap()) as usize;
                    let name_bytes = self.connection.parser().read_bytes(namelen)?;
                    let name = String::from_utf8(name_bytes)
                        .map_err(|e| AdbError::ParseError(e.to_string()))?;
                    if name != "." && name != ".." {
                        entries.push(Entry {
                            name,
                            stats: Stats { mode, size, mtime },
                        });
                    }
                }
                b"DONE" => {
                    self.connection.parser().read_bytes(16)?;
                    return Ok(entries);
                }
                b"FAIL" => return self.read_error(),
                _ => return self.connection.parser().unexpected(&reply, "DENT, DONE or FAIL"),
            }
        }
    }

    /// Push the contents of `file` to `path` on the device, running the
    /// transfer loop on a background thread. Consumes `self`: the
    /// connection moves onto the transfer thread and is closed there once
    /// the loop ends, cancels, or errors.
    pub fn push_file(
        self,
        file: &Path,
        path: &str,
        mode: u32,
    ) -> AdbResult<(TransferHandle, mpsc::Receiver<TransferEvent>)> {
        let mut source = File::open(file)?;
        let mtime = source
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as u32)
            .unwrap_or_else(now_secs);
        self.write_data(source, path, mode, mtime)
    }

    /// Push an in-memory/stream source to `path`, stamped with the current
    /// time (the original stamps stream pushes with "now" since there is no
    /// file mtime to read). `stream` is moved onto the transfer thread, so
    /// it must be owned and `'static`.
    pub fn push_stream<R: Read + Send + 'static>(
        self,
        stream: R,
        path: &str,
        mode: u32,
    ) -> AdbResult<(TransferHandle, mpsc::Receiver<TransferEvent>)> {
        self.write_data(stream, path, mode, now_secs())
    }

    fn write_data<R: Read + Send + 'static>(
        mut self,
        mut stream: R,
        path: &str,
        mode: u32,
        mtime: u32,
    ) -> AdbResult<(TransferHandle, mpsc::Receiver<TransferEvent>)> {
        let mode = mode | S_IFREG;
        self.send_command_with_arg(protocol::SEND, &format!("{path},{mode}"))?;

        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();
        let mut connection = self.connection;

        let thread = thread::spawn(move || {
            let result = (|| -> AdbResult<bool> {
                let mut buf = vec![0u8; DATA_MAX_LENGTH];
                loop {
                    if thread_cancel.load(Ordering::SeqCst) {
                        return Ok(false);
                    }
                    let n = stream.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    connection.write_raw(&{
                        let mut payload = Vec::with_capacity(8);
                        payload.extend_from_slice(protocol::DATA);
                        payload.extend_from_slice(&(n as u32).to_le_bytes());
                        payload
                    })?;
                    connection.write_raw(&buf[..n])?;
                    let _ = tx.send(TransferEvent::Progress {
                        bytes_transferred: n as u64,
                    });
                }
                connection.write_raw(&{
                    let mut payload = Vec::with_capacity(8);
                    payload.extend_from_slice(protocol::DONE);
                    payload.extend_from_slice(&mtime.to_le_bytes());
                    payload
                })?;
                let reply = connection.parser().read_ascii(4)?;
                match reply.as_bytes() {
                    b"OKAY" => {
                        connection.parser().read_bytes(4)?;
                        Ok(true)
                    }
                    b"FAIL" => connection.parser().read_error(),
                    _ => connection.parser().unexpected(&reply, "OKAY or FAIL"),
                }
            })();

            match result {
                Ok(true) => {
                    let _ = tx.send(TransferEvent::End);
                }
                Ok(false) => {
                    let _ = tx.send(TransferEvent::Cancelled);
                    let _ = tx.send(TransferEvent::End);
                }
                Err(e) => {
                    let _ = tx.send(TransferEvent::Error(e.to_string()));
                    let _ = tx.send(TransferEvent::End);
                }
            }
            let _ = connection.close();
        });

        Ok((
            TransferHandle {
                cancel,
                thread: Some(thread),
            },
            rx,
        ))
    }

    /// Pull `path` from the device, writing received chunks to `sink` on a
    /// background thread gated by the returned handle's cancel flag.
    /// Consumes `self` and `sink`: both move onto the transfer thread.
    pub fn pull<W: Write + Send + 'static>(
        mut self,
        path: &str,
        mut sink: W,
    ) -> AdbResult<(TransferHandle, mpsc::Receiver<TransferEvent>)> {
        self.send_command_with_arg(protocol::RECV, path)?;

        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();
        let mut connection = self.connection;

        let thread = thread::spawn(move || {
            let result = (|| -> AdbResult<bool> {
                loop {
                    if thread_cancel.load(Ordering::SeqCst) {
                        return Ok(false);
                    }
                    let reply = connection.parser().read_ascii(4)?;
                    match reply.as_bytes() {
                        b"DATA" => {
                            let length_data = connection.parser().read_bytes(4)?;
                            let length =
                                u32::from_le_bytes(length_data.try_into().unwrap()) as usize;
                            connection.parser().read_byte_flow(length, &mut sink)?;
                            let _ = tx.send(TransferEvent::Progress {
                                bytes_transferred: length as u64,
                            });
                        }
                        b"DONE" => {
                            connection.parser().read_bytes(4)?;
                            return Ok(true);
                        }
                        b"FAIL" => return connection.parser().read_error(),
                        _ => {
                            return connection.parser().unexpected(&reply, "DATA, DONE or FAIL")
                        }
                    }
                }
            })();

            match result {
                Ok(true) => {
                    let _ = tx.send(TransferEvent::End);
                }
                Ok(false) => {
                    let _ = tx.send(TransferEvent::Cancelled);
                    let _ = tx.send(TransferEvent::End);
                }
                Err(e) => {
                    let _ = tx.send(TransferEvent::Error(e.to_string()));
                    let _ = tx.send(TransferEvent::End);
                }
            }
            let _ = connection.close();
        });

        Ok((
            TransferHandle {
                cancel,
                thread: Some(thread),
            },
            rx,
        ))
    }

    pub fn end(self) -> AdbResult<()> {
        self.connection.close()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn temp_joins_basename_under_tmp() {
        assert_eq!(temp("/home/user/app.apk"), "/data/local/tmp/app.apk");
    }

    #[test]
    fn stats_classify_file_type() {
        let dir = Stats {
            mode: S_IFDIR | 0o755,
            size: 0,
            mtime: 0,
        };
        assert!(dir.is_dir());
        assert!(!dir.is_file());

        let file = Stats {
            mode: S_IFREG | 0o644,
            size: 10,
            mtime: 0,
        };
        assert!(file.is_file());
        assert!(!file.is_dir());
    }

    #[test]
    fn transfer_handle_cancel_sets_shared_flag() {
        let cancel = Arc::new(AtomicBool::new(false));
        let handle = TransferHandle {
            cancel: cancel.clone(),
            thread: None,
        };
        assert!(!cancel.load(Ordering::SeqCst));
        handle.cancel();
        assert!(cancel.load(Ordering::SeqCst));
    }
}
