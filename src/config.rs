//! Connection configuration: daemon host/port and the binary used to
//! auto-start it, with the same defaults and environment fallbacks as
//! `adb/connection.py`'s `options` dict.

use std::env;
use std::net::Ipv4Addr;

/// Default TCP port the ADB daemon listens on for host-protocol connections.
pub const DEFAULT_PORT: u16 = 5037;

/// Options recognised when establishing a [`crate::Connection`].
#[derive(Debug, Clone)]
pub struct Config {
    pub host: Ipv4Addr,
    pub port: u16,
    pub bin: String,
}

impl Default for Config {
    fn default() -> Self {
        let host = env::var("ADB_HOST")
            .ok()
            .and_then(|h| h.parse().ok())
            .unwrap_or(Ipv4Addr::LOCALHOST);
        let port = env::var("ADB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Self {
            host,
            port,
            bin: "adb".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: Ipv4Addr) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bin(mut self, bin: impl Into<String>) -> Self {
        self.bin = bin.into();
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_is_loopback_5037() {
        // SAFETY: tests run single-threaded enough within this process for
        // this env scope; we don't rely on it being unset elsewhere.
        unsafe {
            env::remove_var("ADB_HOST");
            env::remove_var("ADB_PORT");
        }
        let cfg = Config::new();
        assert_eq!(cfg.host, Ipv4Addr::LOCALHOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.bin, "adb");
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = Config::new()
            .with_host(Ipv4Addr::new(10, 0, 0, 2))
            .with_port(1234)
            .with_bin("my-adb");
        assert_eq!(cfg.host, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(cfg.port, 1234);
        assert_eq!(cfg.bin, "my-adb");
    }
}
