//! Client-side library for the Android Debug Bridge: the host-protocol
//! wire format, the sync sub-protocol, a device tracker, a framebuffer
//! decoder, RSA authentication, and a TCP/USB bridge server.
//!
//! [`Client`] is the façade most callers want; [`Host`] gives lower-level
//! per-command access when a caller needs to reuse one transport
//! connection across several operations.

pub mod auth;
pub mod bridge;
pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod framebuffer;
pub mod host;
pub mod intent;
pub mod jdwp;
pub mod parser;
pub mod protocol;
pub mod sync;
pub mod tracker;

pub use client::{Client, DeviceInfo};
pub use config::Config;
pub use connection::Connection;
pub use error::{AdbError, AdbResult};
pub use host::Host;
