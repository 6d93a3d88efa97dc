//! Outbound transmission loop and inbound handoff queue.
//!
//! Packets are never written to the wire at enqueue time. A background
//! transmitter drains each client's queue at most one packet per pass, gated
//! by that client's measured latency, and stamps deferred rewrites (send
//! timestamps, corrector latency) at the actual send instant. Inbound bytes
//! flow the other way through a channel, so socket threads never touch
//! scene state directly.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::warn;

use crate::client::client_list::ClientList;
use crate::client::rewrite::RewriteKind;
use crate::client::{Client, OutgoingPacket};
use crate::identity::Identity;
use crate::packet::Packet;
use crate::time;
use crate::types::LATENCY_UNKNOWN;

/// Where outbound bytes go. Implemented over a UDP socket in production and
/// over an in-memory sink in tests.
pub trait Transport: Send + Sync {
    fn send(&self, bytes: &[u8], to: &Identity) -> io::Result<()>;
}

/// Transmission-loop tunables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Idle interval between drain passes when nothing wakes the loop early.
    pub tick: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(10),
        }
    }
}

struct Shared {
    stop: Mutex<bool>,
    wake: Condvar,
}

/// Background thread that drains client send queues onto a [`Transport`].
///
/// Each pass sends at most one packet per client, and only to clients whose
/// time since last send has reached their latency gate. Queued packets
/// therefore coalesce naturally on slow links instead of bursting.
pub struct Transmitter {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Transmitter {
    /// Spawns the transmission thread.
    pub fn start(
        clients: Arc<ClientList>,
        transport: Arc<dyn Transport>,
        config: PipelineConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("scenesync-transmitter".into())
            .spawn(move || run_loop(thread_shared, clients, transport, config.tick))
            .ok();
        if handle.is_none() {
            warn!("failed to spawn transmitter thread; nothing will be sent");
        }
        Self { shared, handle }
    }

    /// Wakes the loop for an immediate drain pass.
    pub fn notify(&self) {
        self.shared.wake.notify_one();
    }

    /// Signals the loop to finish and joins the thread.
    pub fn stop(&mut self) {
        let Ok(mut stop) = self.shared.stop.lock() else {
            panic!("transmitter stop mutex poisoned; a holder panicked");
        };
        *stop = true;
        drop(stop);
        self.shared.wake.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Transmitter {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

fn run_loop(shared: Arc<Shared>, clients: Arc<ClientList>, transport: Arc<dyn Transport>, tick: Duration) {
    loop {
        drain_pass(&clients, transport.as_ref());

        let Ok(stop) = shared.stop.lock() else {
            panic!("transmitter stop mutex poisoned; a holder panicked");
        };
        if *stop {
            return;
        }
        let Ok((stop, _timeout)) = shared.wake.wait_timeout(stop, tick) else {
            panic!("transmitter stop mutex poisoned; a holder panicked");
        };
        if *stop {
            return;
        }
    }
}

/// One pass over every client: at most one packet each, latency-gated.
fn drain_pass(clients: &ClientList, transport: &dyn Transport) {
    // clone the client handles out so the registry lock is not held while
    // stamping and sending
    let ready: Vec<Arc<Client>> = clients.lock().iter().cloned().collect();
    for client in ready {
        if client.last_packet_elapsed() < client.send_gate() {
            continue;
        }
        let Some(mut outgoing) = client.pop_packet() else {
            continue;
        };
        if let Err(err) = apply_rewrites(&client, &mut outgoing) {
            warn!("dropping outbound packet for {}: {err}", client.identity());
            continue;
        }
        match transport.send(outgoing.packet.as_bytes(), client.identity()) {
            Ok(()) => client.mark_sent(),
            Err(err) => warn!("send to {} failed: {err}", client.identity()),
        }
    }
}

/// Stamps a queued packet's deferred fields with send-instant values.
fn apply_rewrites(
    client: &Client,
    outgoing: &mut OutgoingPacket,
) -> Result<(), crate::packet::error::PacketError> {
    if outgoing.rewrites.is_empty() {
        return Ok(());
    }
    let now64 = match time::try_stamp64() {
        Ok(now64) => now64,
        Err(err) => {
            warn!("wall clock unavailable ({err}); stamping zero timestamps");
            0
        }
    };
    for op in &outgoing.rewrites {
        match op.kind {
            RewriteKind::Timestamp16 => {
                outgoing.packet.pack_at(op.offset, &time::to_stamp16(now64))?;
            }
            RewriteKind::Timestamp64 => {
                outgoing.packet.pack_at(op.offset, &now64)?;
            }
            RewriteKind::CorrectorLatency => {
                let latency = client.take_corrector_latency().unwrap_or(LATENCY_UNKNOWN);
                outgoing.packet.pack_at(op.offset, &latency)?;
            }
        }
    }
    Ok(())
}

/// Handoff point between socket threads and the simulation thread.
///
/// Any number of [`ReceiveHandle`] clones push raw datagrams in; the owning
/// thread drains them as [`Packet`]s whenever it is ready.
pub struct ReceiveQueue {
    tx: Sender<(Vec<u8>, Identity)>,
    rx: Receiver<(Vec<u8>, Identity)>,
}

/// Cloneable producer side of a [`ReceiveQueue`].
#[derive(Clone)]
pub struct ReceiveHandle {
    tx: Sender<(Vec<u8>, Identity)>,
}

impl ReceiveHandle {
    /// Queues one received datagram. Returns false if the queue side was
    /// dropped.
    pub fn push(&self, bytes: Vec<u8>, from: Identity) -> bool {
        self.tx.send((bytes, from)).is_ok()
    }
}

impl ReceiveQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> ReceiveHandle {
        ReceiveHandle {
            tx: self.tx.clone(),
        }
    }

    /// Takes the next pending datagram without blocking.
    pub fn try_recv(&self) -> Option<(Packet, Identity)> {
        match self.rx.try_recv() {
            Ok((bytes, from)) => Some((Packet::from_bytes(bytes), from)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drains everything currently pending, in arrival order.
    pub fn drain(&self) -> Vec<(Packet, Identity)> {
        let mut out = Vec::new();
        while let Some(item) = self.try_recv() {
            out.push(item);
        }
        out
    }
}

impl Default for ReceiveQueue {
    fn default() -> Self {
        Self::new()
    }
}
