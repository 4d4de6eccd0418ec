//! Transport commands: executed after `host:transport:SERIAL` has attached
//! the connection to a device. Grounded on the teacher's existing
//! `ShellCommand`/`ScreenCap*`/`Input` (kept, generalized to run over
//! [`Connection`] instead of a raw `TcpStream`) and, for everything the
//! teacher didn't already have, `adb/common/host_transport/*.py` and
//! `adb/command/host_transport/*.py`.

use std::collections::BTreeMap;
use std::net::TcpStream;
use std::time::Duration;

use regex::Regex;

use crate::connection::Connection;
use crate::error::{AdbError, AdbResult};
use crate::framebuffer::Header;
use crate::intent::IntentOptions;

use super::AdbCommand;

fn expect_okay_or_fail<T>(
    connection: &mut Connection,
    on_okay: impl FnOnce(&mut Connection) -> AdbResult<T>,
) -> AdbResult<T> {
    let tag = connection.parser().read_ascii(4)?;
    match tag.as_str() {
        "OKAY" => on_okay(connection),
        "FAIL" => connection.parser().read_error(),
        other => connection.parser().unexpected(other, "OKAY or FAIL"),
    }
}

/// shell:command
///
/// command is something like "cmd arg1 arg2 ..."
pub struct ShellCommand {
    command: String,
}

impl ShellCommand {
    pub fn new(command: String) -> Self {
        Self { command }
    }
}

impl AdbCommand for ShellCommand {
    type Output = String;

    fn raw_command(&self) -> String {
        format!("shell:{}", self.command)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let bytes = connection.parser().read_all()?;
            String::from_utf8(bytes).map_err(|e| AdbError::ParseError(e.to_string()))
        })
    }
}

/// Png decoded screencap
///
/// `shell:screencap -p`
pub struct ScreenCapPng;

impl Default for ScreenCapPng {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenCapPng {
    pub fn new() -> Self {
        Self
    }
}

impl AdbCommand for ScreenCapPng {
    type Output = Vec<u8>;

    fn raw_command(&self) -> String {
        "shell:screencap -p".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| connection.parser().read_all())
    }
}

/// Raw screencap (unencoded framebuffer data)
///
/// Returns raw pixel data with a 12-byte header, significantly faster than
/// PNG encoding.
///
/// ## Command
/// `shell:screencap`
///
/// ## Data Format
/// ```text
/// Header (12 bytes, Little Endian):
///   [0..4]   Width  (u32)
///   [4..8]   Height (u32)
///   [8..12]  Format (u32)
///            - 1 = RGBA_8888 (Red, Green, Blue, Alpha)
///
/// Pixel Data (width * height * 4 bytes):
///   Raw pixel bytes
/// ```
pub struct ScreenCapRaw;

impl Default for ScreenCapRaw {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenCapRaw {
    pub fn new() -> Self {
        Self
    }
}

impl AdbCommand for ScreenCapRaw {
    type Output = (u32, u32, Vec<u8>);

    fn raw_command(&self) -> String {
        "shell:screencap".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let data = connection.parser().read_all()?;
            if data.len() < 12 {
                return Err(AdbError::ParseError("screencap payload too short".into()));
            }
            let width = u32::from_le_bytes(data[0..4].try_into().unwrap());
            let height = u32::from_le_bytes(data[4..8].try_into().unwrap());
            let format = u32::from_le_bytes(data[8..12].try_into().unwrap());
            if format != 1 {
                return Err(AdbError::ParseError(format!(
                    "unsupported screencap format {format}"
                )));
            }
            Ok((width, height, data[12..].to_vec()))
        })
    }
}

pub enum Input {
    /// shell:input swipe x1 y1 x2 y2 duration
    Swipe {
        p1: (u32, u32),
        p2: (i32, i32),
        duration: Duration,
    },
    /// .0 is keycode
    ///
    /// shell:input keyevent <keycode>
    Keyevent(String),
}

impl AdbCommand for Input {
    type Output = ();

    fn raw_command(&self) -> String {
        match self {
            Input::Swipe { p1, p2, duration } => {
                format!(
                    "shell:input swipe {} {} {} {} {}",
                    p1.0,
                    p1.1,
                    p2.0,
                    p2.1,
                    duration.as_millis()
                )
            }
            Input::Keyevent(keycode) => format!("shell:input keyevent {}", keycode),
        }
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()
    }
}

/// `logcat:` — streams `logcat -B *:I` (optionally preceded by `logcat -c`
/// to clear the buffer first) as a raw byte stream handed back to the
/// caller, since log lines keep arriving indefinitely.
pub struct Logcat {
    pub clear: bool,
}

impl Logcat {
    pub fn execute(&self, mut connection: Connection) -> AdbResult<TcpStream> {
        let cmd = "logcat -B *:I 2>/dev/null";
        let request = if self.clear {
            format!("shell:logcat -c 2>/dev/null && {cmd}")
        } else {
            format!("shell:{cmd}")
        };
        connection.write_request(&request)?;
        connection.read_status()?;
        Ok(connection.into_raw())
    }
}

/// `framebuffer:` — parses the 52-byte header, then hands the caller the
/// connection's raw stream (one frame of pixel data) to read or pipe
/// through [`crate::framebuffer::RgbTransform`].
pub struct FramebufferCommand;

impl FramebufferCommand {
    pub fn new() -> Self {
        Self
    }

    /// Send the request and return the parsed header plus the raw
    /// connection for reading pixel data. Consumes `connection` because the
    /// parser is handed off via [`Connection::into_raw`].
    pub fn execute(&self, mut connection: Connection) -> AdbResult<(Header, TcpStream)> {
        connection.write_request("framebuffer:")?;
        connection.read_status()?;
        let header_bytes = connection
            .parser()
            .read_bytes(crate::framebuffer::HEADER_LEN)?;
        let header = Header::parse(&header_bytes)?;
        Ok((header, connection.into_raw()))
    }
}

impl Default for FramebufferCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// `reboot:`
pub struct Reboot;

impl AdbCommand for Reboot {
    type Output = ();

    fn raw_command(&self) -> String {
        "reboot:".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            connection.parser().read_all()?;
            Ok(())
        })
    }
}

/// `root:`
pub struct Root;

impl AdbCommand for Root {
    type Output = ();

    fn raw_command(&self) -> String {
        "root:".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let bytes = connection.parser().read_all()?;
            let text = String::from_utf8_lossy(&bytes);
            if text.contains("restarting adbd as root") {
                Ok(())
            } else {
                Err(AdbError::ResponseError(text.trim().to_string()))
            }
        })
    }
}

/// `remount:`
pub struct Remount;

impl AdbCommand for Remount {
    type Output = ();

    fn raw_command(&self) -> String {
        "remount:".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()
    }
}

/// `usb:`
pub struct Usb;

impl AdbCommand for Usb {
    type Output = ();

    fn raw_command(&self) -> String {
        "usb:".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()
    }
}

/// `tcpip:PORT`
pub struct TcpIp {
    pub port: u16,
}

impl AdbCommand for TcpIp {
    type Output = u16;

    fn raw_command(&self) -> String {
        format!("tcpip:{}", self.port)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let bytes = connection.parser().read_all()?;
            let text = String::from_utf8_lossy(&bytes);
            if text.contains("restarting in") {
                Ok(self.port)
            } else {
                Err(AdbError::ResponseError(text.trim().to_string()))
            }
        })
    }
}

/// `shell:getprop`
pub struct GetProp;

impl AdbCommand for GetProp {
    type Output = BTreeMap<String, String>;

    fn raw_command(&self) -> String {
        "shell:getprop".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let bytes = connection.parser().read_all()?;
            let text = String::from_utf8_lossy(&bytes);
            let re = Regex::new(r"(?m)^\[([\s\S]*?)\]: \[([\s\S]*?)\]\r?$").unwrap();
            Ok(re
                .captures_iter(&text)
                .map(|c| (c[1].to_string(), c[2].to_string()))
                .collect())
        })
    }
}

/// `shell:pm list packages`
pub struct PmListPackages;

impl AdbCommand for PmListPackages {
    type Output = Vec<String>;

    fn raw_command(&self) -> String {
        "shell:pm list packages 2>/dev/null".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let bytes = connection.parser().read_all()?;
            let text = String::from_utf8_lossy(&bytes);
            let re = Regex::new(r"(?m)^package:(.*?)\r?$").unwrap();
            Ok(re.captures_iter(&text).map(|c| c[1].to_string()).collect())
        })
    }
}

/// `shell:pm list features`
pub struct PmListFeatures;

impl AdbCommand for PmListFeatures {
    type Output = BTreeMap<String, Option<String>>;

    fn raw_command(&self) -> String {
        "shell:pm list features 2>/dev/null".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let bytes = connection.parser().read_all()?;
            let text = String::from_utf8_lossy(&bytes);
            let re = Regex::new(r"(?m)^feature:(.*?)(?:=(.*?))?\r?$").unwrap();
            Ok(re
                .captures_iter(&text)
                .map(|c| {
                    let value = c.get(2).map(|m| m.as_str().to_string());
                    (c[1].to_string(), value)
                })
                .collect())
        })
    }
}

/// `shell:pm install -r APK` — fails on `Failure [code]`, per the resolved
/// Open Question (some original code paths treated any non-Success as
/// success; this is a bug and not reproduced here).
pub struct Install {
    pub apk_path: String,
}

impl AdbCommand for Install {
    type Output = ();

    fn raw_command(&self) -> String {
        format!("shell:pm install -r {}", shell_escape(&self.apk_path))
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let re = Regex::new(r"^(Success|Failure \[(.*?)\])$").unwrap();
            let line = connection.parser().search_line(&re)?;
            match line {
                Some(line) if line == "Success" => Ok(()),
                Some(line) => {
                    let code = re
                        .captures(&line)
                        .and_then(|c| c.get(2))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    Err(AdbError::CommandFailed(format!(
                        "{} could not be installed [{code}]",
                        self.apk_path
                    )))
                }
                None => Err(AdbError::CommandFailed(format!(
                    "{} install result not found before stream ended",
                    self.apk_path
                ))),
            }
        })
    }
}

/// `shell:pm uninstall PKG`
pub struct Uninstall {
    pub package: String,
}

impl AdbCommand for Uninstall {
    type Output = ();

    fn raw_command(&self) -> String {
        format!("shell:pm uninstall {}", self.package)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let re = Regex::new(r"^(Success|Failure.*|.*Unknown package:.*)$").unwrap();
            connection.parser().search_line(&re)?;
            Ok(())
        })
    }
}

/// `shell:pm clear PKG`
pub struct PmClear {
    pub package: String,
}

impl AdbCommand for PmClear {
    type Output = ();

    fn raw_command(&self) -> String {
        format!("shell:pm clear {}", self.package)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let re = Regex::new(r"^(Success|Failed)$").unwrap();
            match connection.parser().search_line(&re)? {
                Some(line) if line == "Success" => Ok(()),
                _ => Err(AdbError::CommandFailed(format!(
                    "package '{}' could not be cleared",
                    self.package
                ))),
            }
        })
    }
}

/// `shell:pm path PKG`
pub struct PmPath {
    pub package: String,
}

impl AdbCommand for PmPath {
    type Output = String;

    fn raw_command(&self) -> String {
        format!("shell:pm path {}", self.package)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let bytes = connection.parser().read_all()?;
            let text = String::from_utf8_lossy(&bytes);
            text.trim()
                .strip_prefix("package:")
                .map(|s| s.trim().to_string())
                .ok_or_else(|| AdbError::ResponseError(text.trim().to_string()))
        })
    }
}

enum AmVerb {
    Start,
    StartService,
}

struct AmCommand {
    verb: AmVerb,
    options: IntentOptions,
}

impl AdbCommand for AmCommand {
    type Output = ();

    fn raw_command(&self) -> String {
        let mut args = self.options.to_args();
        if matches!(self.verb, AmVerb::Start) && self.options.debug {
            args.push("-D".to_string());
        }
        if matches!(self.verb, AmVerb::Start) && self.options.wait {
            args.push("-W".to_string());
        }
        if let Some(user) = &self.options.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        let verb = match self.verb {
            AmVerb::Start => "start",
            AmVerb::StartService => "startservice",
        };
        format!("shell:am {verb} {}", args.join(" "))
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        expect_okay_or_fail(connection, |connection| {
            let re = Regex::new(r"^Error: (.*)$").unwrap();
            match connection.parser().search_line(&re) {
                Ok(Some(line)) => Err(AdbError::CommandFailed(line)),
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            }
        })
    }
}

/// `shell:am start ...`
pub struct AmStart {
    pub options: IntentOptions,
}

impl AmStart {
    pub fn command(self) -> impl AdbCommand<Output = ()> {
        AmCommand {
            verb: AmVerb::Start,
            options: self.options,
        }
    }
}

/// `shell:am startservice ...`
pub struct AmStartService {
    pub options: IntentOptions,
}

impl AmStartService {
    pub fn command(self) -> impl AdbCommand<Output = ()> {
        AmCommand {
            verb: AmVerb::StartService,
            options: self.options,
        }
    }
}

/// `reverse:forward:REMOTE;LOCAL` — two consecutive `OKAY`s, symmetric with
/// the host-level `forward` command.
pub struct ReverseForward {
    pub remote: String,
    pub local: String,
}

impl AdbCommand for ReverseForward {
    type Output = ();

    fn raw_command(&self) -> String {
        format!("reverse:forward:{};{}", self.remote, self.local)
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        connection.read_status()
    }
}

/// One row of `reverse:list-forward`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseEntry {
    pub remote: String,
    pub local: String,
}

/// `reverse:list-forward`
pub struct ReverseListForward;

impl AdbCommand for ReverseListForward {
    type Output = Vec<ReverseEntry>;

    fn raw_command(&self) -> String {
        "reverse:list-forward".to_string()
    }

    fn handle_response(&self, connection: &mut Connection) -> AdbResult<Self::Output> {
        connection.read_status()?;
        let value = connection.parser().read_value()?;
        let text = String::from_utf8(value).map_err(|e| AdbError::ParseError(e.to_string()))?;
        Ok(text
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let _serial = fields.next()?;
                let remote = fields.next()?.to_string();
                let local = fields.next()?.to_string();
                Some(ReverseEntry { remote, local })
            })
            .collect())
    }
}

/// `localfilesystem:PATH` (or `PATH` verbatim if it already contains `:`).
pub struct LocalService {
    pub path: String,
}

impl LocalService {
    /// Send the request and return the raw connection for the caller to
    /// read/write freely.
    pub fn execute(&self, mut connection: Connection) -> AdbResult<TcpStream> {
        let request = if self.path.contains(':') {
            self.path.clone()
        } else {
            format!("localfilesystem:{}", self.path)
        };
        connection.write_request(&request)?;
        connection.read_status()?;
        Ok(connection.into_raw())
    }
}

/// `log:NAME`
pub struct LogService {
    pub name: String,
}

impl LogService {
    pub fn execute(&self, mut connection: Connection) -> AdbResult<TcpStream> {
        connection.write_request(&format!("log:{}", self.name))?;
        connection.read_status()?;
        Ok(connection.into_raw())
    }
}

/// `tcp:PORT[:HOST]`
pub struct TcpService {
    pub port: u16,
    pub host: Option<String>,
}

impl TcpService {
    pub fn execute(&self, mut connection: Connection) -> AdbResult<TcpStream> {
        let request = match &self.host {
            Some(host) => format!("tcp:{}:{host}", self.port),
            None => format!("tcp:{}", self.port),
        };
        connection.write_request(&request)?;
        connection.read_status()?;
        Ok(connection.into_raw())
    }
}

/// `shell:EXTERNAL_STORAGE=/data/local/tmp monkey --port PORT -v`
pub struct Monkey {
    pub port: u16,
}

impl Monkey {
    pub fn execute(&self, mut connection: Connection) -> AdbResult<TcpStream> {
        connection.write_request(&format!(
            "shell:EXTERNAL_STORAGE=/data/local/tmp monkey --port {} -v",
            self.port
        ))?;
        connection.read_status()?;
        let re = Regex::new(r"^:Monkey:").unwrap();
        // Best-effort: consume the banner line if present, then hand the
        // caller the raw stream either way (no read timeout here, unlike
        // the original's 1s wait, since connections are synchronous).
        let _ = connection.parser().search_line(&re);
        Ok(connection.into_raw())
    }
}

/// `sync:` — hands back a [`crate::sync::Sync`] session over the connection.
pub struct SyncEntry;

impl SyncEntry {
    pub fn execute(&self, mut connection: Connection) -> AdbResult<crate::sync::Sync> {
        connection.write_request("sync:")?;
        connection.read_status()?;
        Ok(crate::sync::Sync::new(connection))
    }
}

/// `track-jdwp` — like `host:track-devices` but for JDWP process ids on the
/// attached device's transport; the caller (`JdwpTracker`) continues reading
/// length-prefixed pid-list snapshots on this same connection afterward.
pub struct TrackJdwp;

impl TrackJdwp {
    pub fn raw_command(&self) -> String {
        "track-jdwp".to_string()
    }

    pub fn start(&self, connection: &mut Connection) -> AdbResult<()> {
        connection.write_request(&self.raw_command())?;
        connection.read_status()
    }
}

fn shell_escape(arg: &str) -> String {
    if arg
        .chars()
        .all(|c| c.is_alphanumeric() || "._-/".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shell_escape_leaves_plain_paths_alone() {
        assert_eq!(shell_escape("/sdcard/app.apk"), "/sdcard/app.apk");
    }

    #[test]
    fn shell_escape_quotes_spaces() {
        assert_eq!(shell_escape("my app.apk"), "'my app.apk'");
    }

    #[test]
    fn am_command_renders_start_with_flags() {
        let cmd = AmCommand {
            verb: AmVerb::Start,
            options: IntentOptions {
                action: Some("android.intent.action.MAIN".to_string()),
                debug: true,
                wait: true,
                ..Default::default()
            },
        };
        assert_eq!(
            cmd.raw_command(),
            "shell:am start -a android.intent.action.MAIN -D -W"
        );
    }

    #[test]
    fn am_command_renders_startservice_with_user() {
        let cmd = AmCommand {
            verb: AmVerb::StartService,
            options: IntentOptions {
                component: Some("com.foo/.Svc".to_string()),
                user: Some("0".to_string()),
                ..Default::default()
            },
        };
        assert_eq!(
            cmd.raw_command(),
            "shell:am startservice -n com.foo/.Svc --user 0"
        );
    }
}
