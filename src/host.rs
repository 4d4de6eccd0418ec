//! Host-level façade: one fresh [`Connection`] per call, mirroring the
//! `async with await self.connection()` pattern every method in
//! `adb/client.py` uses before issuing its one host command.

use crate::command::host_service::{
    Device, DeviceLong, ForwardEntry, HostConnect, HostDevices, HostDevicesLong, HostDisconnect,
    HostForward, HostGetDevPath, HostGetSerialNo, HostGetState, HostKill, HostListForward,
    HostTrackDevices, HostTransport, HostVersion, HostWaitForAny,
};
use crate::command::AdbCommand;
use crate::config::Config;
use crate::connection::Connection;
use crate::error::AdbResult;
use crate::jdwp::{JdwpEvent, JdwpTracker};
use crate::tracker::{Tracker, TrackerEvent};

/// Opens one [`Connection`] per method call; callers that need several
/// operations on the same device transport should use [`Host::transport`]
/// directly and reuse the returned connection.
#[derive(Debug, Clone)]
pub struct Host {
    config: Config,
}

impl Host {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Open a fresh connection to the ADB daemon.
    pub fn connection(&self) -> AdbResult<Connection> {
        Connection::connect(self.config.clone())
    }

    pub fn version(&self) -> AdbResult<u32> {
        HostVersion.execute(&mut self.connection()?)
    }

    pub fn connect(&self, host: &str, port: u16) -> AdbResult<String> {
        HostConnect {
            host: host.to_string(),
            port,
        }
        .execute(&mut self.connection()?)
    }

    pub fn disconnect(&self, host: &str, port: u16) -> AdbResult<String> {
        HostDisconnect {
            host: host.to_string(),
            port,
        }
        .execute(&mut self.connection()?)
    }

    pub fn devices(&self) -> AdbResult<Vec<Device>> {
        HostDevices.execute(&mut self.connection()?)
    }

    pub fn devices_long(&self) -> AdbResult<Vec<DeviceLong>> {
        HostDevicesLong.execute(&mut self.connection()?)
    }

    pub fn kill(&self) -> AdbResult<()> {
        HostKill.execute(&mut self.connection()?)
    }

    pub fn get_serial_no(&self, serial: &str) -> AdbResult<String> {
        HostGetSerialNo {
            serial: serial.to_string(),
        }
        .execute(&mut self.connection()?)
    }

    pub fn get_dev_path(&self, serial: &str) -> AdbResult<String> {
        HostGetDevPath {
            serial: serial.to_string(),
        }
        .execute(&mut self.connection()?)
    }

    pub fn get_state(&self, serial: &str) -> AdbResult<String> {
        HostGetState {
            serial: serial.to_string(),
        }
        .execute(&mut self.connection()?)
    }

    pub fn forward(&self, serial: &str, local: &str, remote: &str) -> AdbResult<()> {
        HostForward {
            serial: serial.to_string(),
            local: local.to_string(),
            remote: remote.to_string(),
        }
        .execute(&mut self.connection()?)
    }

    pub fn list_forward(&self, serial: &str) -> AdbResult<Vec<ForwardEntry>> {
        HostListForward {
            serial: serial.to_string(),
        }
        .execute(&mut self.connection()?)
    }

    pub fn wait_for_any(&self, serial: &str) -> AdbResult<String> {
        HostWaitForAny {
            serial: serial.to_string(),
        }
        .execute(&mut self.connection()?)
    }

    /// Start `host:track-devices` on a dedicated connection and return the
    /// running [`Tracker`] plus its event channel.
    pub fn track_devices(&self) -> AdbResult<(Tracker, std::sync::mpsc::Receiver<TrackerEvent>)> {
        Tracker::start(self.connection()?)
    }

    /// Attach to `serial`'s transport and start `track-jdwp` on a dedicated
    /// connection, returning the running [`JdwpTracker`] plus its event
    /// channel.
    pub fn track_jdwp(&self, serial: &str) -> AdbResult<(JdwpTracker, std::sync::mpsc::Receiver<JdwpEvent>)> {
        JdwpTracker::start(self.transport(serial)?)
    }

    /// Open a fresh connection and attach it to `serial`'s transport. The
    /// returned connection is now a raw device stream: only transport-level
    /// commands ([`crate::command::local_service`]) may be sent on it.
    pub fn transport(&self, serial: &str) -> AdbResult<Connection> {
        let mut connection = self.connection()?;
        HostTransport {
            serial: serial.to_string(),
        }
        .execute(&mut connection)?;
        Ok(connection)
    }
}
