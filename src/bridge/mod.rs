//! The TCP/USB bridge: exposes one device's transport over a plain TCP
//! socket speaking the same 24-byte-header packet protocol `adbd` uses
//! over USB, so a network peer can `adb connect` to it directly. Grounded
//! on `adb/tcpusb/*`.

pub mod packet;
pub mod packet_reader;
pub mod rolling_counter;
pub mod server;
pub mod service;
pub mod service_map;
pub mod socket;

pub use server::Server;
