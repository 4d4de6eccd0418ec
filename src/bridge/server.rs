//! The TCP/USB bridge's accept loop: one thread per incoming connection,
//! each driving a fresh [`Socket`] against the same device. Grounded on
//! `adb/tcpusb/server.py`.

use std::net::{TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::auth::AndroidPublicKey;
use crate::client::Client;
use crate::error::AdbResult;

use super::socket::{AuthHandler, Socket};

/// Exposes one device's transport over a plain TCP socket, the way
/// `adb forward`'s `tcpip` counterpart lets a network client reach a device
/// without going through USB.
pub struct Server {
    client: Client,
    serial: String,
    auth: AuthHandler,
}

impl Server {
    /// `auth` is consulted once per connection after the token signature
    /// and RSA public key both verify; returning `false` rejects the
    /// connection, the same `options['auth']` hook the original exposes.
    /// Defaults to accepting every verified key when built with [`Server::new`].
    pub fn new(client: Client, serial: impl Into<String>) -> Self {
        Self::with_auth_handler(client, serial, |_key| true)
    }

    pub fn with_auth_handler(
        client: Client,
        serial: impl Into<String>,
        auth: impl Fn(&AndroidPublicKey) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            client,
            serial: serial.into(),
            auth: Arc::new(auth),
        }
    }

    /// Bind `addr` and serve forever, spawning one thread per connection.
    /// Returns only if binding itself fails.
    pub fn listen(&self, addr: impl ToSocketAddrs) -> AdbResult<()> {
        let listener = TcpListener::bind(addr)?;
        info!(
            serial = %self.serial,
            addr = ?listener.local_addr()?,
            "bridge listening"
        );
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(%err, "failed to accept bridge connection");
                    continue;
                }
            };
            let client = self.client.clone();
            let serial = self.serial.clone();
            let auth = self.auth.clone();
            thread::spawn(move || Socket::new(client, serial, stream, auth).run());
        }
        Ok(())
    }
}
