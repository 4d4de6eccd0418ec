//! One open bridge service: a device transport attached to a single
//! `A_OPEN`/local id pair, with a background thread pumping device reads
//! out as `A_WRTE` packets gated by a window-of-one ack — the same single
//! outstanding write the original's cooperative `_try_push` maintained,
//! translated from an event-loop poll into a blocking thread that waits on
//! an ack channel. Grounded on `adb/tcpusb/service.py`.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::client::Client;
use crate::error::AdbResult;

use super::packet::{Packet, A_CLSE, A_OKAY, A_WRTE};

/// State shared between the owning [`Socket`](super::socket::Socket)'s
/// dispatch thread and this service's pump thread, so either side can send
/// the final `A_CLSE` exactly once.
struct Shared {
    bridge_writer: Arc<Mutex<TcpStream>>,
    local_id: u32,
    remote_id: u32,
    /// Set once the device side has confirmed `OKAY` for this service's
    /// `A_OPEN`. A service that never opened reports local id 0 on close,
    /// matching the original's `local_id = self.local_id if self.opened
    /// else 0`.
    opened: AtomicBool,
    ended: AtomicBool,
}

impl Shared {
    fn close_once(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        let local_id = if self.opened.load(Ordering::SeqCst) {
            self.local_id
        } else {
            0
        };
        debug!(local_id, "O:A_CLSE");
        let wire = Packet::assemble(A_CLSE, local_id, self.remote_id, &[]);
        if let Ok(mut writer) = self.bridge_writer.lock() {
            let _ = writer.write_all(&wire);
        }
    }
}

pub struct Service {
    shared: Arc<Shared>,
    transport_write: TcpStream,
    ack_tx: mpsc::Sender<()>,
    pump: Option<JoinHandle<()>>,
}

impl Service {
    /// Attach `serial`'s transport, open `name` on it, reply with
    /// `A_OKAY`/`A_CLSE` on `bridge_writer`, and start the pump thread that
    /// forwards whatever the device writes back as `A_WRTE` packets.
    pub fn open(
        client: &Client,
        serial: &str,
        local_id: u32,
        remote_id: u32,
        name: &str,
        max_payload: usize,
        bridge_writer: Arc<Mutex<TcpStream>>,
    ) -> AdbResult<Self> {
        trace!(name, "opening transport service");
        let shared = Arc::new(Shared {
            bridge_writer,
            local_id,
            remote_id,
            opened: AtomicBool::new(false),
            ended: AtomicBool::new(false),
        });

        let mut connection = client.transport(serial)?;
        connection.write_request(name)?;
        let open_result = connection.read_status();
        let transport = connection.into_raw();

        if let Err(err) = open_result {
            shared.close_once();
            return Err(err);
        }
        shared.opened.store(true, Ordering::SeqCst);

        let transport_write = transport.try_clone()?;
        {
            let wire = Packet::assemble(A_OKAY, local_id, remote_id, &[]);
            let mut writer = shared.bridge_writer.lock().expect("bridge writer poisoned");
            writer.write_all(&wire)?;
        }
        debug!(local_id, remote_id, "O:A_OKAY");

        let (ack_tx, ack_rx) = mpsc::channel();
        let pump = {
            let shared = shared.clone();
            thread::spawn(move || pump_device_to_bridge(transport, shared, max_payload, ack_rx))
        };

        Ok(Self {
            shared,
            transport_write,
            ack_tx,
            pump: Some(pump),
        })
    }

    pub fn local_id(&self) -> u32 {
        self.shared.local_id
    }

    /// The device acked the last `A_WRTE`; let the pump read the next chunk.
    pub fn ack(&self) {
        let _ = self.ack_tx.send(());
    }

    /// Forward bridge-side `A_WRTE` data straight onto the device transport.
    pub fn write(&mut self, data: &[u8]) -> AdbResult<()> {
        if !data.is_empty() {
            self.transport_write.write_all(data)?;
        }
        Ok(())
    }

    pub fn end(&mut self) {
        self.transport_write.shutdown(Shutdown::Both).ok();
        let _ = self.ack_tx.send(());
        self.shared.close_once();
        if let Some(handle) = self.pump.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.end();
    }
}

fn pump_device_to_bridge(
    mut transport_read: TcpStream,
    shared: Arc<Shared>,
    max_payload: usize,
    ack_rx: mpsc::Receiver<()>,
) {
    let mut buf = vec![0u8; max_payload];
    loop {
        if shared.ended.load(Ordering::SeqCst) {
            break;
        }
        let n = match transport_read.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        debug!(local_id = shared.local_id, n, "O:A_WRTE");
        let wire = Packet::assemble(A_WRTE, shared.local_id, shared.remote_id, &buf[..n]);
        let sent = shared
            .bridge_writer
            .lock()
            .map(|mut w| w.write_all(&wire))
            .is_ok();
        if !sent {
            break;
        }
        if ack_rx.recv().is_err() || shared.ended.load(Ordering::SeqCst) {
            break;
        }
    }
    shared.close_once();
}
