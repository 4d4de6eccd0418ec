//! The high-level façade most callers use. Each method opens whatever
//! connection(s) it needs and translates a `DeviceNotFound` from the
//! transport attach step into the same error a caller would get from any
//! other command. Grounded on `adb/client.py`, reconciled with the
//! teacher's command/response split instead of `client.py`'s bespoke
//! per-command wrapper classes under `command/host*`.

use std::collections::BTreeMap;
use std::net::TcpStream;
use std::path::Path;

use crate::auth::AndroidPublicKey;
use crate::bridge::server::Server;
use crate::command::host_service::{Device, DeviceLong, ForwardEntry};
use crate::command::local_service::{
    AmStart, AmStartService, FramebufferCommand, GetProp, Install, Logcat, PmClear,
    PmListFeatures, PmListPackages, PmPath, Reboot, Remount, ReverseEntry, ReverseForward,
    ReverseListForward, Root, ShellCommand, SyncEntry, TcpIp, Uninstall,
};
use crate::command::AdbCommand;
use crate::config::Config;
use crate::error::AdbResult;
use crate::framebuffer::Header;
use crate::host::Host;
use crate::intent::IntentOptions;
use crate::jdwp::{JdwpEvent, JdwpTracker};
use crate::sync::{Sync, TransferEvent};
use crate::tracker::{Tracker, TrackerEvent};

/// Basic device info as surfaced by `get_device_info`, analogous to
/// `client.py`'s ad-hoc dictionary built from `getprop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: String,
    pub model: String,
    pub device: String,
    pub release: String,
    pub sdk: String,
}

#[derive(Debug, Clone)]
pub struct Client {
    host: Host,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self {
            host: Host::new(config),
        }
    }

    pub fn version(&self) -> AdbResult<u32> {
        self.host.version()
    }

    pub fn connect(&self, host: &str, port: u16) -> AdbResult<String> {
        self.host.connect(host, port)
    }

    pub fn disconnect(&self, host: &str, port: u16) -> AdbResult<String> {
        self.host.disconnect(host, port)
    }

    pub fn devices(&self) -> AdbResult<Vec<Device>> {
        self.host.devices()
    }

    pub fn devices_long(&self) -> AdbResult<Vec<DeviceLong>> {
        self.host.devices_long()
    }

    pub fn track_devices(&self) -> AdbResult<(Tracker, std::sync::mpsc::Receiver<TrackerEvent>)> {
        self.host.track_devices()
    }

    pub fn track_jdwp(
        &self,
        serial: &str,
    ) -> AdbResult<(JdwpTracker, std::sync::mpsc::Receiver<JdwpEvent>)> {
        self.host.track_jdwp(serial)
    }

    pub fn forward(&self, serial: &str, local: &str, remote: &str) -> AdbResult<()> {
        self.host.forward(serial, local, remote)
    }

    pub fn list_forward(&self, serial: &str) -> AdbResult<Vec<ForwardEntry>> {
        self.host.list_forward(serial)
    }

    pub fn reverse(&self, serial: &str, remote: &str, local: &str) -> AdbResult<()> {
        let mut connection = self.host.transport(serial)?;
        ReverseForward {
            remote: remote.to_string(),
            local: local.to_string(),
        }
        .execute(&mut connection)
    }

    pub fn list_reverse(&self, serial: &str) -> AdbResult<Vec<ReverseEntry>> {
        let mut connection = self.host.transport(serial)?;
        ReverseListForward.execute(&mut connection)
    }

    /// Attach a fresh connection to `serial`'s transport, for callers that
    /// need a command not wrapped by [`Client`] itself.
    pub fn transport(&self, serial: &str) -> AdbResult<crate::connection::Connection> {
        self.host.transport(serial)
    }

    pub fn shell(&self, serial: &str, command: &str) -> AdbResult<String> {
        let mut connection = self.host.transport(serial)?;
        let output = ShellCommand::new(command.to_string()).execute(&mut connection)?;
        Ok(output.trim_end().to_string())
    }

    pub fn reboot(&self, serial: &str) -> AdbResult<()> {
        let mut connection = self.host.transport(serial)?;
        Reboot.execute(&mut connection)
    }

    pub fn root(&self, serial: &str) -> AdbResult<()> {
        let mut connection = self.host.transport(serial)?;
        Root.execute(&mut connection)
    }

    pub fn remount(&self, serial: &str) -> AdbResult<()> {
        let mut connection = self.host.transport(serial)?;
        Remount.execute(&mut connection)
    }

    pub fn tcpip(&self, serial: &str, port: u16) -> AdbResult<u16> {
        let mut connection = self.host.transport(serial)?;
        TcpIp { port }.execute(&mut connection)
    }

    pub fn get_properties(&self, serial: &str) -> AdbResult<BTreeMap<String, String>> {
        let mut connection = self.host.transport(serial)?;
        GetProp.execute(&mut connection)
    }

    pub fn list_packages(&self, serial: &str) -> AdbResult<Vec<String>> {
        let mut connection = self.host.transport(serial)?;
        PmListPackages.execute(&mut connection)
    }

    pub fn list_features(&self, serial: &str) -> AdbResult<BTreeMap<String, Option<String>>> {
        let mut connection = self.host.transport(serial)?;
        PmListFeatures.execute(&mut connection)
    }

    pub fn install(&self, serial: &str, apk_path: &str) -> AdbResult<()> {
        let mut connection = self.host.transport(serial)?;
        Install {
            apk_path: apk_path.to_string(),
        }
        .execute(&mut connection)
    }

    pub fn uninstall(&self, serial: &str, package: &str) -> AdbResult<()> {
        let mut connection = self.host.transport(serial)?;
        Uninstall {
            package: package.to_string(),
        }
        .execute(&mut connection)
    }

    pub fn clear(&self, serial: &str, package: &str) -> AdbResult<()> {
        let mut connection = self.host.transport(serial)?;
        PmClear {
            package: package.to_string(),
        }
        .execute(&mut connection)
    }

    pub fn package_path(&self, serial: &str, package: &str) -> AdbResult<String> {
        let mut connection = self.host.transport(serial)?;
        PmPath {
            package: package.to_string(),
        }
        .execute(&mut connection)
    }

    pub fn logcat(&self, serial: &str, clear: bool) -> AdbResult<TcpStream> {
        let connection = self.host.transport(serial)?;
        Logcat { clear }.execute(connection)
    }

    pub fn framebuffer(&self, serial: &str) -> AdbResult<(Header, TcpStream)> {
        let connection = self.host.transport(serial)?;
        FramebufferCommand::new().execute(connection)
    }

    /// `am start`.
    pub fn start_activity(&self, serial: &str, options: IntentOptions) -> AdbResult<()> {
        let mut connection = self.host.transport(serial)?;
        AmStart { options }.command().execute(&mut connection)
    }

    /// `am startservice`. Older devices reject the legacy `--user` argument
    /// outright; on failure with a `user` option set, retries once with it
    /// omitted rather than surfacing the error.
    pub fn start_service(&self, serial: &str, options: IntentOptions) -> AdbResult<()> {
        let retry_without_user = options.user.is_some();
        let mut connection = self.host.transport(serial)?;
        let result = AmStartService {
            options: options.clone(),
        }
        .command()
        .execute(&mut connection);

        match result {
            Err(_) if retry_without_user => {
                let mut options = options;
                options.user = None;
                let mut connection = self.host.transport(serial)?;
                AmStartService { options }.command().execute(&mut connection)
            }
            other => other,
        }
    }

    /// Start a sync session on `serial`'s transport.
    pub fn sync_service(&self, serial: &str) -> AdbResult<Sync> {
        let connection = self.host.transport(serial)?;
        SyncEntry.execute(connection)
    }

    pub fn push(&self, serial: &str, local: &Path, remote: &str) -> AdbResult<Vec<TransferEvent>> {
        let sync = self.sync_service(serial)?;
        let (handle, rx) = sync.push_file(local, remote, crate::sync::DEFAULT_CHMOD)?;
        let events = rx.iter().collect();
        handle.join();
        Ok(events)
    }

    pub fn pull(&self, serial: &str, remote: &str, local: &Path) -> AdbResult<Vec<TransferEvent>> {
        let sync = self.sync_service(serial)?;
        let file = std::fs::File::create(local)?;
        let (handle, rx) = sync.pull(remote, file)?;
        let events = rx.iter().collect();
        handle.join();
        Ok(events)
    }

    pub fn get_device_info(&self, serial: &str) -> AdbResult<DeviceInfo> {
        let props = self.get_properties(serial)?;
        let get = |key: &str| props.get(key).cloned().unwrap_or_else(|| "unknown".to_string());
        Ok(DeviceInfo {
            serial: serial.to_string(),
            model: get("ro.product.model"),
            device: get("ro.product.device"),
            release: get("ro.build.version.release"),
            sdk: get("ro.build.version.sdk"),
        })
    }

    /// Build a [`Server`] exposing `serial`'s transport over plain TCP,
    /// accepting every key that verifies (no `authHandler`). Use
    /// [`Client::create_tcp_usb_bridge_with_auth_handler`] to gate
    /// connections on something beyond signature verification.
    pub fn create_tcp_usb_bridge(&self, serial: &str) -> Server {
        Server::new(self.clone(), serial.to_string())
    }

    /// As [`Client::create_tcp_usb_bridge`], but `auth` is consulted once a
    /// connecting peer's signature and RSA public key both verify;
    /// returning `false` rejects the connection.
    pub fn create_tcp_usb_bridge_with_auth_handler(
        &self,
        serial: &str,
        auth: impl Fn(&AndroidPublicKey) -> bool + Send + Sync + 'static,
    ) -> Server {
        Server::with_auth_handler(self.clone(), serial.to_string(), auth)
    }

    pub fn get_battery_level(&self, serial: &str) -> AdbResult<String> {
        let output = self.shell(serial, "dumpsys battery | grep level")?;
        Ok(output
            .split(':')
            .nth(1)
            .unwrap_or("")
            .trim()
            .to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn device_info_defaults_to_unknown_fields() {
        let props: BTreeMap<String, String> = BTreeMap::new();
        let get = |key: &str| props.get(key).cloned().unwrap_or_else(|| "unknown".to_string());
        assert_eq!(get("ro.product.model"), "unknown");
    }
}
