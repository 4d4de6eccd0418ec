//! One bridge client connection: the `SYNC`/`CNXN`/`AUTH` handshake, then
//! dispatch of `OPEN`/`OKAY`/`WRTE`/`CLSE` to the right [`Service`].
//! Grounded on `adb/tcpusb/socket.py`.

use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex};

use rand::Rng;
use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{AdbError, AdbResult};

use super::packet::{
    Packet, A_AUTH, A_CLSE, A_CNXN, A_OKAY, A_OPEN, A_SYNC, A_WRTE, AUTH_RSAPUBLICKEY,
    AUTH_SIGNATURE, AUTH_TOKEN, TOKEN_LENGTH,
};
use super::packet_reader::PacketReader;
use super::rolling_counter::RollingCounter;
use super::service::Service;
use super::service_map::ServiceMap;
use crate::auth::AndroidPublicKey;

/// Called once a signed token and RSA public key have both been verified;
/// returning `false` rejects the connection as the bridge's `authHandler`
/// equivalent, mirroring `options['auth']` in the original.
pub type AuthHandler = Arc<dyn Fn(&AndroidPublicKey) -> bool + Send + Sync>;

pub struct Socket {
    client: Client,
    serial: String,
    writer: Arc<Mutex<TcpStream>>,
    auth: AuthHandler,
    version: u32,
    max_payload: usize,
    authorized: bool,
    sync_token: RollingCounter,
    remote_id: RollingCounter,
    services: ServiceMap<Service>,
    token: Option<Vec<u8>>,
    signature: Option<Vec<u8>>,
    ended: bool,
}

impl Socket {
    pub fn new(client: Client, serial: String, stream: TcpStream, auth: AuthHandler) -> Self {
        Self {
            client,
            serial,
            writer: Arc::new(Mutex::new(stream)),
            auth,
            version: 1,
            max_payload: 4096,
            authorized: false,
            sync_token: RollingCounter::new(u32::MAX, 0),
            remote_id: RollingCounter::new(u32::MAX, 0),
            services: ServiceMap::new(),
            token: None,
            signature: None,
            ended: false,
        }
    }

    /// Drive this connection until the client disconnects or a protocol
    /// error ends it; tears down every open service before returning.
    pub fn run(mut self) {
        let reader = {
            let writer = self.writer.lock().expect("bridge writer poisoned");
            match writer.try_clone() {
                Ok(reader) => reader,
                Err(err) => {
                    warn!(%err, "failed to clone bridge socket");
                    return;
                }
            }
        };
        let mut packet_reader = PacketReader::new(reader);
        loop {
            match packet_reader.read_packet() {
                Ok(Some(packet)) => {
                    if let Err(err) = self.handle(packet) {
                        warn!(serial = %self.serial, %err, "ending bridge connection");
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(serial = %self.serial, %err, "packet reader error");
                    break;
                }
            }
        }
        self.end();
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.services.end_all(|mut service| service.end());
        if let Ok(writer) = self.writer.lock() {
            writer.shutdown(Shutdown::Both).ok();
        }
    }

    fn handle(&mut self, packet: Packet) -> AdbResult<()> {
        match packet.command {
            A_SYNC => self.handle_sync(),
            A_CNXN => self.handle_connection(&packet),
            A_OPEN => self.handle_open(&packet),
            A_OKAY | A_WRTE | A_CLSE => self.forward_service_packet(&packet),
            A_AUTH => self.handle_auth(&packet),
            other => Err(AdbError::ProtocolError(format!(
                "unknown bridge command {other:#x}"
            ))),
        }
    }

    fn write_packet(&self, wire: Vec<u8>) -> AdbResult<()> {
        let mut writer = self.writer.lock().expect("bridge writer poisoned");
        writer.write_all(&wire)?;
        Ok(())
    }

    fn handle_sync(&mut self) -> AdbResult<()> {
        debug!("I:A_SYNC");
        let token = self.sync_token.next();
        debug!("O:A_SYNC");
        self.write_packet(Packet::assemble(A_SYNC, 1, token, &[]))
    }

    fn handle_connection(&mut self, packet: &Packet) -> AdbResult<()> {
        debug!("I:A_CNXN");
        self.version = packet.arg0;
        self.max_payload = packet.arg1.min(u16::MAX as u32) as usize;
        let mut token = vec![0u8; TOKEN_LENGTH];
        rand::thread_rng().fill(token.as_mut_slice());
        debug!(token = %hex(&token), "created challenge");
        self.token = Some(token.clone());
        debug!("O:A_AUTH");
        self.write_packet(Packet::assemble(A_AUTH, AUTH_TOKEN, 0, &token))
    }

    fn handle_auth(&mut self, packet: &Packet) -> AdbResult<()> {
        debug!("I:A_AUTH");
        match packet.arg0 {
            AUTH_SIGNATURE => {
                if self.signature.is_none() {
                    self.signature = Some(packet.data.clone());
                }
                let token = self.token.clone().unwrap_or_default();
                debug!("O:A_AUTH");
                self.write_packet(Packet::assemble(A_AUTH, AUTH_TOKEN, 0, &token))
            }
            AUTH_RSAPUBLICKEY => {
                let signature = self
                    .signature
                    .clone()
                    .ok_or_else(|| AdbError::AuthError("public key sent before signature".into()))?;
                if packet.data.len() < 2 {
                    return Err(AdbError::AuthError("empty RSA public key".into()));
                }
                let key_text = std::str::from_utf8(&packet.data[..packet.data.len() - 1])
                    .map_err(|_| AdbError::AuthError("public key is not valid utf-8".into()))?;
                let key = AndroidPublicKey::parse(key_text)?;
                let token = self.token.clone().unwrap_or_default();
                if !key.verify(&token, &signature)? {
                    debug!("signature mismatch");
                    return Err(AdbError::AuthError("signature mismatch".into()));
                }
                debug!(fingerprint = %key.fingerprint, "signature verified");
                if !(self.auth)(&key) {
                    debug!(fingerprint = %key.fingerprint, "rejected by auth handler");
                    return Err(AdbError::UnauthorizedError);
                }
                self.authorized = true;
                let device_id = self.device_id()?;
                debug!("O:A_CNXN");
                self.write_packet(Packet::assemble(
                    A_CNXN,
                    self.version,
                    self.max_payload as u32,
                    &device_id,
                ))
            }
            other => Err(AdbError::ProtocolError(format!(
                "unknown authentication method {other}"
            ))),
        }
    }

    /// Build the same `device::ro.product.name=...;` id string real `adbd`
    /// announces on `CNXN`.
    fn device_id(&self) -> AdbResult<Vec<u8>> {
        let props = self.client.get_properties(&self.serial)?;
        let mut id = String::from("device::");
        for key in ["ro.product.name", "ro.product.model", "ro.product.device"] {
            let value = props.get(key).cloned().unwrap_or_default();
            id.push_str(&format!("{key}={value};"));
        }
        let mut bytes = id.into_bytes();
        bytes.push(0);
        Ok(bytes)
    }

    fn handle_open(&mut self, packet: &Packet) -> AdbResult<()> {
        if !self.authorized {
            return Err(AdbError::UnauthorizedError);
        }
        let remote_id = packet.arg0;
        let local_id = self.remote_id.next();
        if packet.data.len() < 2 {
            return Err(AdbError::ProtocolError("empty service name".into()));
        }
        let name = std::str::from_utf8(&packet.data[..packet.data.len() - 1])
            .map_err(|_| AdbError::ProtocolError("service name is not valid utf-8".into()))?;
        debug!(name, "calling service");
        let service = Service::open(
            &self.client,
            &self.serial,
            local_id,
            remote_id,
            name,
            self.max_payload,
            self.writer.clone(),
        )?;
        self.services.insert(local_id, service);
        debug!(count = self.services.count(), "services open simultaneously");
        Ok(())
    }

    fn forward_service_packet(&mut self, packet: &Packet) -> AdbResult<()> {
        if !self.authorized {
            return Err(AdbError::UnauthorizedError);
        }
        let remote_id = packet.arg0;
        let local_id = packet.arg1;
        match packet.command {
            A_OKAY => {
                if let Some(service) = self.services.get(local_id) {
                    service.ack();
                } else {
                    debug!(local_id, "ack for an already-closed service");
                }
            }
            A_WRTE => {
                let wrote = match self.services.get_mut(local_id) {
                    Some(service) => {
                        service.write(&packet.data)?;
                        true
                    }
                    None => false,
                };
                if wrote {
                    self.write_packet(Packet::assemble(A_OKAY, local_id, remote_id, &[]))?;
                } else {
                    debug!(local_id, "write to an already-closed service");
                }
            }
            A_CLSE => {
                if let Some(mut service) = self.services.remove(local_id) {
                    service.end();
                }
            }
            _ => unreachable!("forward_service_packet only sees OKAY/WRTE/CLSE"),
        }
        Ok(())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn device_id_uses_semicolon_separated_fields() {
        let mut id = String::from("device::");
        for (key, value) in [("ro.product.name", "walleye"), ("ro.product.model", "Pixel 2")] {
            id.push_str(&format!("{key}={value};"));
        }
        assert_eq!(id, "device::ro.product.name=walleye;ro.product.model=Pixel 2;");
    }
}
