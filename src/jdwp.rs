//! JDWP process tracker: diffs successive `track-jdwp` snapshots (newline-
//! separated pid lists on a device's transport) into add/remove events,
//! delivered on an `mpsc` channel from a dedicated reader thread. The JDWP
//! analogue of [`crate::tracker::Tracker`], same translation from the
//! original's `asyncio.Event`-based reader into a `std::thread` +
//! `mpsc::Sender` pair. Grounded on
//! `adb/common/host_transport/trackjdwp.py`.

use std::collections::BTreeSet;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::command::local_service::TrackJdwp;
use crate::connection::Connection;
use crate::error::AdbResult;

/// One change observed between two consecutive pid-list snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JdwpEvent {
    Added(String),
    Removed(String),
    /// Emitted once per snapshot, alongside the individual events above.
    ChangeSet { added: Vec<String>, removed: Vec<String> },
    /// The connection ended or a protocol error occurred; the reader thread
    /// has exited and no further events will arrive.
    End(Option<String>),
}

/// A running JDWP tracker. Dropping or calling [`JdwpTracker::end`] closes
/// the underlying connection, which unblocks the reader thread's pending
/// read.
pub struct JdwpTracker {
    shutdown: std::net::TcpStream,
    handle: Option<JoinHandle<()>>,
}

impl JdwpTracker {
    /// Send `track-jdwp` on `connection` (already attached to a device's
    /// transport) and start the background reader. `connection` is consumed
    /// by the reader thread.
    pub fn start(mut connection: Connection) -> AdbResult<(Self, mpsc::Receiver<JdwpEvent>)> {
        TrackJdwp.start(&mut connection)?;
        let shutdown = connection.shutdown_handle()?;
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let mut pids: BTreeSet<String> = BTreeSet::new();
            loop {
                let value = match connection.parser().read_value() {
                    Ok(value) => value,
                    Err(e) => {
                        let _ = tx.send(JdwpEvent::End(Some(e.to_string())));
                        return;
                    }
                };
                let text = String::from_utf8_lossy(&value);
                let new_pids: BTreeSet<String> = text
                    .lines()
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect();

                let added: Vec<String> = new_pids.difference(&pids).cloned().collect();
                let removed: Vec<String> = pids.difference(&new_pids).cloned().collect();
                for pid in &added {
                    let _ = tx.send(JdwpEvent::Added(pid.clone()));
                }
                for pid in &removed {
                    let _ = tx.send(JdwpEvent::Removed(pid.clone()));
                }
                if !(added.is_empty() && removed.is_empty()) {
                    let _ = tx.send(JdwpEvent::ChangeSet { added, removed });
                }
                pids = new_pids;
            }
        });

        Ok((
            Self {
                shutdown,
                handle: Some(handle),
            },
            rx,
        ))
    }

    /// Shut down the connection and wait for the reader thread to exit.
    pub fn end(mut self) {
        let _ = self.shutdown.shutdown(std::net::Shutdown::Both);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for JdwpTracker {
    fn drop(&mut self) {
        let _ = self.shutdown.shutdown(std::net::Shutdown::Both);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn diffs_pid_lists_into_added_and_removed() {
        let old: BTreeSet<String> = ["1234", "5678"].into_iter().map(String::from).collect();
        let new: BTreeSet<String> = ["5678", "9012"].into_iter().map(String::from).collect();
        let added: Vec<String> = new.difference(&old).cloned().collect();
        let removed: Vec<String> = old.difference(&new).cloned().collect();
        assert_eq!(added, vec!["9012".to_string()]);
        assert_eq!(removed, vec!["1234".to_string()]);
    }

    #[test]
    fn trailing_blank_line_is_ignored() {
        let text = "1234\n5678\n";
        let pids: BTreeSet<String> = text.lines().filter(|l| !l.is_empty()).map(String::from).collect();
        assert_eq!(pids.len(), 2);
    }
}
