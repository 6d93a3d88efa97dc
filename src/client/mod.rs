//! Per-connection session state and the thread-safe client registry.

pub mod client_list;
pub mod event;
pub mod rewrite;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::warn;

use crate::identity::Identity;
use crate::latency::LatencyPlanner;
use crate::packet::{error::PacketError, Packet};

pub use event::ClientEvent;
pub use rewrite::{RewriteKind, RewriteOp};

/// Tunables for a single connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Send queue bound; the oldest queued packet is dropped on overflow.
    pub send_queue_cap: usize,
    /// Silence duration after which a client counts as timed out.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_queue_cap: 64,
            timeout: Duration::from_secs(10),
        }
    }
}

/// A queued outbound packet plus the rewrites to apply right before it hits
/// the wire.
#[derive(Debug, Clone)]
pub struct OutgoingPacket {
    pub packet: Packet,
    pub rewrites: Vec<RewriteOp>,
}

struct ClientInner {
    queue: VecDeque<OutgoingPacket>,
    last_sent: Instant,
    last_heard: Instant,
    /// Capture instant of the peer timestamp currently awaiting its echo.
    corrector: Option<Instant>,
    planner: LatencyPlanner,
}

/// Per-connection session data: send queue, latency statistics, timeout
/// clock and the latency planner.
///
/// All public methods acquire the internal (plain, non-recursive) mutex
/// themselves; callers never hold it across calls.
pub struct Client {
    identity: Identity,
    send_queue_cap: usize,
    inner: Mutex<ClientInner>,
}

impl Client {
    pub fn new(identity: Identity, config: &ClientConfig) -> Self {
        let now = Instant::now();
        Self {
            identity,
            send_queue_cap: config.send_queue_cap,
            inner: Mutex::new(ClientInner {
                queue: VecDeque::new(),
                last_sent: now,
                last_heard: now,
                corrector: None,
                planner: LatencyPlanner::new(),
            }),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn locked(&self) -> MutexGuard<'_, ClientInner> {
        let Ok(guard) = self.inner.lock() else {
            panic!("client mutex poisoned; a holder panicked");
        };
        guard
    }

    // Send queue

    /// Enqueues an outbound packet with its deferred rewrite instructions.
    /// On overflow the oldest packet is dropped: it carries the stalest
    /// state.
    pub fn push_packet(&self, packet: Packet, rewrites: Vec<RewriteOp>) {
        let mut inner = self.locked();
        if inner.queue.len() >= self.send_queue_cap {
            inner.queue.pop_front();
            warn!(
                "send queue overflow for {}: dropped oldest packet (cap {})",
                self.identity, self.send_queue_cap
            );
        }
        inner.queue.push_back(OutgoingPacket { packet, rewrites });
    }

    /// Dequeues FIFO, or `None` when empty.
    pub fn pop_packet(&self) -> Option<OutgoingPacket> {
        self.locked().queue.pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.locked().queue.len()
    }

    // Pacing & timeout

    /// Time since the last successful send; the transmission loop rate-gates
    /// on this against the measured latency.
    pub fn last_packet_elapsed(&self) -> Duration {
        self.locked().last_sent.elapsed()
    }

    pub fn mark_sent(&self) {
        self.locked().last_sent = Instant::now();
    }

    pub fn mark_heard(&self) {
        self.locked().last_heard = Instant::now();
    }

    pub fn timed_out(&self, timeout: Duration) -> bool {
        self.locked().last_heard.elapsed() >= timeout
    }

    /// Minimum interval between sends to this client: roughly one packet per
    /// measured one-way latency (zero until a measurement exists).
    pub fn send_gate(&self) -> Duration {
        let inner = self.locked();
        Duration::from_millis(u64::from(inner.planner.latency().unwrap_or(0)))
    }

    // Latency planner

    /// Appends planner data to an outbound packet; the returned rewrites are
    /// queued alongside it.
    pub fn pack_planner(&self, packet: &mut Packet) -> Vec<RewriteOp> {
        self.locked().planner.pack(packet)
    }

    /// Consumes planner data from an inbound packet. `now64` is the local
    /// receive instant in wall millis. Also refreshes the timeout clock.
    pub fn unpack_planner(&self, packet: &mut Packet, now64: u64) -> Result<(), PacketError> {
        let mut inner = self.locked();
        let report = inner.planner.unpack(packet, now64)?;
        if report.captured.is_some() {
            inner.corrector = Some(Instant::now());
        }
        inner.last_heard = Instant::now();
        Ok(())
    }

    /// One-shot consume-and-clear of the pending corrector capture,
    /// converted to elapsed millis. `None` when nothing is pending.
    pub fn take_corrector_latency(&self) -> Option<u16> {
        self.locked()
            .corrector
            .take()
            .map(|captured| u16::try_from(captured.elapsed().as_millis()).unwrap_or(u16::MAX))
    }

    pub fn has_corrector_pending(&self) -> bool {
        self.locked().corrector.is_some()
    }

    // Measurements

    /// One-way latency of this host's packets toward the peer, millis.
    pub fn send_latency_ms(&self) -> Option<u16> {
        self.locked().planner.latency()
    }

    /// One-way latency as last reported by the peer, millis.
    pub fn recv_latency_ms(&self) -> Option<u16> {
        self.locked().planner.peer_latency()
    }

    pub fn rtt_ms(&self) -> Option<u16> {
        self.locked().planner.rtt()
    }

    /// Mean `peer clock - local clock`, millis.
    pub fn clock_offset_ms(&self) -> Option<i64> {
        self.locked().planner.clock_offset()
    }
}

#[cfg(test)]
mod tests {
    use super::{Client, ClientConfig};
    use crate::identity::Identity;
    use crate::packet::Packet;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn ident(port: u16) -> Identity {
        format!("127.0.0.1:{port}")
            .parse::<SocketAddr>()
            .unwrap()
            .into()
    }

    fn tagged(tag: u8) -> Packet {
        let mut packet = Packet::new();
        packet.pack(&tag);
        packet
    }

    #[test]
    fn queue_is_fifo() {
        let client = Client::new(ident(1), &ClientConfig::default());
        client.push_packet(tagged(1), Vec::new());
        client.push_packet(tagged(2), Vec::new());

        assert_eq!(client.pop_packet().unwrap().packet.as_bytes(), &[1]);
        assert_eq!(client.pop_packet().unwrap().packet.as_bytes(), &[2]);
        assert!(client.pop_packet().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let config = ClientConfig {
            send_queue_cap: 2,
            ..ClientConfig::default()
        };
        let client = Client::new(ident(1), &config);
        client.push_packet(tagged(1), Vec::new());
        client.push_packet(tagged(2), Vec::new());
        client.push_packet(tagged(3), Vec::new());

        assert_eq!(client.queue_len(), 2);
        assert_eq!(client.pop_packet().unwrap().packet.as_bytes(), &[2]);
        assert_eq!(client.pop_packet().unwrap().packet.as_bytes(), &[3]);
    }

    #[test]
    fn corrector_is_one_shot() {
        let client = Client::new(ident(1), &ClientConfig::default());
        assert!(client.take_corrector_latency().is_none());

        // a planner-carrying packet with a fresh peer timestamp arms it
        let mut inbound = Packet::new();
        inbound.pack(&100u16);
        inbound.pack(&u16::MAX);
        inbound.pack(&0u64);
        inbound.pack(&false);
        client.unpack_planner(&mut inbound, 0).unwrap();

        assert!(client.has_corrector_pending());
        assert!(client.take_corrector_latency().is_some());
        assert!(client.take_corrector_latency().is_none());
    }

    #[test]
    fn send_gate_defaults_to_zero() {
        let client = Client::new(ident(1), &ClientConfig::default());
        assert_eq!(client.send_gate(), Duration::ZERO);
    }

    #[test]
    fn fresh_client_is_not_timed_out() {
        let client = Client::new(ident(1), &ClientConfig::default());
        assert!(!client.timed_out(Duration::from_secs(5)));
        assert!(client.timed_out(Duration::ZERO));
    }
}
