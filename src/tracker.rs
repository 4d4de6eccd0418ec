//! Device tracker: diffs successive `host:track-devices` snapshots into
//! add/remove/change events, delivered on an `mpsc` channel from a
//! dedicated reader thread. Grounded on `adb/tracker.py`, translating its
//! `asyncio.Event`-based reader task into a `std::thread` + `mpsc::Sender`
//! pair (see SPEC_FULL.md's concurrency model: no async runtime in this
//! workspace's dependency graph).

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::command::host_service::{Device, HostTrackDevices};
use crate::connection::Connection;
use crate::error::AdbResult;

/// One change observed between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Added(Device),
    Removed(Device),
    /// A device whose reported state changed (e.g. `offline` -> `device`).
    Changed { old: Device, new: Device },
    /// Emitted once per snapshot, alongside the individual events above.
    ChangeSet {
        added: Vec<Device>,
        removed: Vec<Device>,
        changed: Vec<Device>,
    },
    /// The connection ended or a protocol error occurred; the reader thread
    /// has exited and no further events will arrive.
    End(Option<String>),
}

/// A running device tracker. Dropping or calling [`Tracker::end`] closes the
/// underlying connection, which unblocks the reader thread's pending read.
pub struct Tracker {
    shutdown: std::net::TcpStream,
    handle: Option<JoinHandle<()>>,
}

impl Tracker {
    /// Send `host:track-devices` on `connection` and start the background
    /// reader. `connection` is consumed by the reader thread.
    pub fn start(mut connection: Connection) -> AdbResult<(Self, mpsc::Receiver<TrackerEvent>)> {
        HostTrackDevices.start(&mut connection)?;
        let shutdown = connection.shutdown_handle()?;
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let mut device_map: BTreeMap<String, Device> = BTreeMap::new();
            loop {
                let snapshot = match read_snapshot(&mut connection) {
                    Ok(devices) => devices,
                    Err(e) => {
                        let _ = tx.send(TrackerEvent::End(Some(e.to_string())));
                        return;
                    }
                };

                let mut new_map = BTreeMap::new();
                let mut added = Vec::new();
                let mut removed = Vec::new();
                let mut changed = Vec::new();

                for device in &snapshot {
                    match device_map.get(&device.id) {
                        Some(old) if old.kind != device.kind => {
                            changed.push(device.clone());
                            let _ = tx.send(TrackerEvent::Changed {
                                old: old.clone(),
                                new: device.clone(),
                            });
                        }
                        Some(_) => {}
                        None => {
                            added.push(device.clone());
                            let _ = tx.send(TrackerEvent::Added(device.clone()));
                        }
                    }
                    new_map.insert(device.id.clone(), device.clone());
                }
                for (id, device) in &device_map {
                    if !new_map.contains_key(id) {
                        removed.push(device.clone());
                        let _ = tx.send(TrackerEvent::Removed(device.clone()));
                    }
                }

                if !(added.is_empty() && removed.is_empty() && changed.is_empty()) {
                    let _ = tx.send(TrackerEvent::ChangeSet {
                        added,
                        removed,
                        changed,
                    });
                }

                device_map = new_map;
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

impl Drop for Tracker {
    fn drop(&mut self) {
        let _ = self.shutdown.shutdown(std::net::Shutdown::Both);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn read_snapshot(connection: &mut Connection) -> AdbResult<Vec<Device>> {
    let value = connection.parser().read_value()?;
    let text = String::from_utf8(value).map_err(|e| crate::error::AdbError::ParseError(e.to_string()))?;
    Ok(crate::command::host_service::parse_snapshot(&text))
}

#[cfg(test)]
mod test {
    use super::*;

    fn dev(id: &str, kind: &str) -> Device {
        Device {
            id: id.to_string(),
            kind: kind.to_string(),
        }
    }

    #[test]
    fn change_detection_treats_kind_change_as_changed() {
        let old = dev("1234", "offline");
        let new = dev("1234", "device");
        assert_ne!(old, new);
        assert_eq!(old.id, new.id);
    }
}
