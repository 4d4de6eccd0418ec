//! Host-level commands: spoken before any transport is attached, answered
//! directly by the daemon rather than forwarded to a device. Grounded on
//! `adb/command/host/*.py` and `adb/common/host*/*.py`.

use crate::command::AdbCommand;
use crate::connection::Connection;
use crate::error::{AdbError, AdbResult};

/// One row of `host:devices`/`host:devices-l`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub kind: String,
}

/// One row of `host:devices-l`, which additionally carries whitespace-split
/// descriptor fields (USB path, product/model/device keys, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLong {
    pub id: String,
    pub kind: String,
    pub fields: Vec<String>,
}

/// One row of `host-serial:*:list-forward`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardEntry {
    pub serial: String,
    pub local: String,
    pub remote: String,
}

fn read_value_line(connection: &mut Connection) -> AdbResult<String> {
    let bytes = connection.parser().read_value()?;
    String::from_utf8(bytes).map_err(|e| AdbError::ParseError(e.to_string()))
}

/// `host:version`
pub struct HostVersion;

impl AdbCommand for HostVersion {
    type Output = u32;

    fn raw_command(&self) -> String {
        "host:version".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        let value = read_value_line(connection)?;
        u32::from_str_radix(&value, 16).map_err(|e| AdbError::ParseError(e.to_string()))
    }
}

/// `host:connect:HOST:PORT`
pub struct HostConnect {
    pub host: String,
    pub port: u16,
}

impl AdbCommand for HostConnect {
    type Output = String;

    fn raw_command(&self) -> String {
        format!("host:connect:{}:{}", self.host, self.port)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        let value = read_value_line(connection)?;
        if value.contains("connected to") || value.contains("already connected") {
            Ok(format!("{}:{}", self.host, self.port))
        } else {
            Err(AdbError::ResponseError(value))
        }
    }
}

/// `host:disconnect:HOST:PORT`
pub struct HostDisconnect {
    pub host: String,
    pub port: u16,
}

impl AdbCommand for HostDisconnect {
    type Output = String;

    fn raw_command(&self) -> String {
        format!("host:disconnect:{}:{}", self.host, self.port)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        let value = read_value_line(connection)?;
        if value.is_empty() {
            Ok(format!("{}:{}", self.host, self.port))
        } else {
            Err(AdbError::ResponseError(value))
        }
    }
}

/// `host:devices`
pub struct HostDevices;

impl AdbCommand for HostDevices {
    type Output = Vec<Device>;

    fn raw_command(&self) -> String {
        "host:devices".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        let value = read_value_line(connection)?;
        Ok(parse_devices(&value))
    }
}

fn parse_devices(value: &str) -> Vec<Device> {
    value
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(2, '\t');
            let id = parts.next()?.to_string();
            let kind = parts.next()?.to_string();
            Some(Device { id, kind })
        })
        .collect()
}

/// `host:devices-l`
pub struct HostDevicesLong;

impl AdbCommand for HostDevicesLong {
    type Output = Vec<DeviceLong>;

    fn raw_command(&self) -> String {
        "host:devices-l".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        let value = read_value_line(connection)?;
        Ok(value
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let id = fields.next()?.to_string();
                let kind = fields.next()?.to_string();
                Some(DeviceLong {
                    id,
                    kind,
                    fields: fields.map(str::to_string).collect(),
                })
            })
            .collect())
    }
}

/// `host:kill`
pub struct HostKill;

impl AdbCommand for HostKill {
    type Output = ();

    fn raw_command(&self) -> String {
        "host:kill".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()
    }
}

/// `host:transport:SERIAL` — on success, the connection is repurposed as the
/// device stream; the caller must not issue another host command on it.
pub struct HostTransport {
    pub serial: String,
}

impl AdbCommand for HostTransport {
    type Output = ();

    fn raw_command(&self) -> String {
        format!("host:transport:{}", self.serial)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        match connection.read_status() {
            Ok(()) => Ok(()),
            Err(AdbError::Fail(msg)) if msg.to_lowercase().contains("not found") => {
                Err(AdbError::DeviceNotFound(self.serial.clone()))
            }
            Err(e) => Err(e),
        }
    }
}

/// `host-serial:SERIAL:get-serialno`
pub struct HostGetSerialNo {
    pub serial: String,
}

impl AdbCommand for HostGetSerialNo {
    type Output = String;

    fn raw_command(&self) -> String {
        format!("host-serial:{}:get-serialno", self.serial)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        read_value_line(connection)
    }
}

/// `host-serial:SERIAL:get-devpath`
pub struct HostGetDevPath {
    pub serial: String,
}

impl AdbCommand for HostGetDevPath {
    type Output = String;

    fn raw_command(&self) -> String {
        format!("host-serial:{}:get-devpath", self.serial)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        read_value_line(connection)
    }
}

/// `host-serial:SERIAL:get-state`
pub struct HostGetState {
    pub serial: String,
}

impl AdbCommand for HostGetState {
    type Output = String;

    fn raw_command(&self) -> String {
        format!("host-serial:{}:get-state", self.serial)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        read_value_line(connection)
    }
}

/// `host-serial:SERIAL:forward:LOCAL;REMOTE` — two consecutive `OKAY`s.
pub struct HostForward {
    pub serial: String,
    pub local: String,
    pub remote: String,
}

impl AdbCommand for HostForward {
    type Output = ();

    fn raw_command(&self) -> String {
        format!(
            "host-serial:{}:forward:{};{}",
            self.serial, self.local, self.remote
        )
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        connection.read_status()
    }
}

/// `host-serial:SERIAL:list-forward`
pub struct HostListForward {
    pub serial: String,
}

impl AdbCommand for HostListForward {
    type Output = Vec<ForwardEntry>;

    fn raw_command(&self) -> String {
        format!("host-serial:{}:list-forward", self.serial)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        let value = read_value_line(connection)?;
        Ok(value
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                Some(ForwardEntry {
                    serial: fields.next()?.to_string(),
                    local: fields.next()?.to_string(),
                    remote: fields.next()?.to_string(),
                })
            })
            .collect())
    }
}

/// `host-serial:SERIAL:wait-for-any` — two consecutive `OKAY`s, then the
/// serial that became available (the wildcard `"*"` or a specific serial).
pub struct HostWaitForAny {
    pub serial: String,
}

impl AdbCommand for HostWaitForAny {
    type Output = String;

    fn raw_command(&self) -> String {
        format!("host-serial:{}:wait-for-any", self.serial)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        connection.read_status()?;
        Ok(self.serial.clone())
    }
}

/// `host:track-devices` — the status read here is just the entry check;
/// the caller (`Tracker`) continues reading length-prefixed snapshots on
/// this same connection afterward.
pub struct HostTrackDevices;

impl HostTrackDevices {
    pub fn raw_command(&self) -> String {
        "host:track-devices".to_string()
    }

    pub fn start(&self, connection: &mut Connection) -> AdbResult<()> {
        connection.write_request(&self.raw_command())?;
        connection.read_status()
    }
}

/// Decode the value of a `host:track-devices` snapshot into the same shape
/// used by `host:devices`, for use by [`crate::tracker::Tracker`].
pub fn parse_snapshot(value: &str) -> Vec<Device> {
    parse_devices(value)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_plain_device_list() {
        let devices = parse_devices("1234\tdevice\n5678\toffline\n");
        assert_eq!(
            devices,
            vec![
                Device {
                    id: "1234".into(),
                    kind: "device".into()
                },
                Device {
                    id: "5678".into(),
                    kind: "offline".into()
                },
            ]
        );
    }

    #[test]
    fn parses_empty_device_list() {
        assert!(parse_devices("").is_empty());
    }
}
