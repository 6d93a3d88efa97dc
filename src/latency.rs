//! One-way latency, RTT and clock-offset estimation, piggy-backed on normal
//! traffic.
//!
//! Every outbound packet carries a 16-bit send timestamp (stamped at the
//! actual send instant via a deferred rewrite), the sender's current one-way
//! latency estimate, a full 64-bit timestamp and a sync flag. A receiver
//! captures the first unanswered timestamp it sees and echoes it on its next
//! outbound packet together with a corrector latency — how long the
//! timestamp was held before being echoed — so the original sender can
//! subtract the receiver's processing delay out of the measured round trip.
//! No dedicated ping packets are ever sent.

use crate::client::{RewriteKind, RewriteOp};
use crate::packet::{error::PacketError, Packet};
use crate::time::{to_stamp16, wrap16_elapsed};
use crate::types::LATENCY_UNKNOWN;

const OFFSET_RING_SIZE: usize = 6;

/// Fixed-size ring of clock-offset samples feeding a running mean.
#[derive(Debug, Default, Clone)]
struct OffsetRing {
    samples: [i64; OFFSET_RING_SIZE],
    len: usize,
    next: usize,
}

impl OffsetRing {
    fn push(&mut self, sample: i64) {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % OFFSET_RING_SIZE;
        self.len = (self.len + 1).min(OFFSET_RING_SIZE);
    }

    fn mean(&self) -> Option<i64> {
        if self.len == 0 {
            return None;
        }
        let sum: i64 = self.samples[..self.len].iter().sum();
        Some(sum / self.len as i64)
    }
}

/// What an unpack pass produced for the owning connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerUnpack {
    /// The peer timestamp captured by this pass, if any. The owner must
    /// record the capture instant so the corrector latency can be stamped
    /// when the echo is eventually sent.
    pub captured: Option<u16>,
}

/// Symmetric latency/clock-offset estimator; one per connection, owned by
/// its [`Client`](crate::Client) for the connection's whole lifetime.
///
/// Timestamps are caller-supplied milliseconds, so the algorithm is
/// clock-injectable for tests. Clock offset is reported as
/// `peer clock - local clock`.
#[derive(Debug, Default, Clone)]
pub struct LatencyPlanner {
    my_latency: Option<u16>,
    peer_latency: Option<u16>,
    last_rtt: Option<u16>,
    pending_echo: Option<u16>,
    offsets: OffsetRing,
}

impl LatencyPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends planner data to an outbound packet, returning the rewrite
    /// instructions that must be applied at the actual send instant.
    ///
    /// Wire layout: reserved u16 send timestamp, own latency (u16, sentinel
    /// [`LATENCY_UNKNOWN`]), reserved u64 full timestamp, u8 echo flag and —
    /// when a captured peer timestamp is pending — that timestamp plus a
    /// reserved u16 corrector-latency slot.
    pub fn pack(&mut self, packet: &mut Packet) -> Vec<RewriteOp> {
        let mut rewrites = Vec::with_capacity(3);

        let stamp_slot = packet.reserve(2);
        rewrites.push(RewriteOp::new(RewriteKind::Timestamp16, stamp_slot));

        packet.pack(&self.my_latency.unwrap_or(LATENCY_UNKNOWN));

        let full_slot = packet.reserve(8);
        rewrites.push(RewriteOp::new(RewriteKind::Timestamp64, full_slot));

        let echoing = self.pending_echo.is_some();
        packet.pack(&echoing);

        if let Some(echo) = self.pending_echo.take() {
            packet.pack(&echo);
            let corrector_slot = packet.reserve(2);
            rewrites.push(RewriteOp::new(
                RewriteKind::CorrectorLatency,
                corrector_slot,
            ));
        }

        rewrites
    }

    /// Consumes planner data from an inbound packet.
    ///
    /// Captures the peer's send timestamp when no earlier capture is still
    /// awaiting its echo. When the peer is echoing one of our own
    /// timestamps, derives RTT, one-way latency and a clock-offset sample;
    /// the sample lands in a fixed six-slot ring whose mean is the reported
    /// offset. `now64` is the local receive instant in wall millis.
    pub fn unpack(
        &mut self,
        packet: &mut Packet,
        now64: u64,
    ) -> Result<PlannerUnpack, PacketError> {
        let had_pending = self.pending_echo.is_some();

        let peer_stamp: u16 = packet.read()?;
        let captured = if had_pending {
            None
        } else {
            self.pending_echo = Some(peer_stamp);
            Some(peer_stamp)
        };

        let peer_latency: u16 = packet.read()?;
        if peer_latency != LATENCY_UNKNOWN {
            self.peer_latency = Some(peer_latency);
        }

        let peer_full: u64 = packet.read()?;
        let peer_echoing: bool = packet.read()?;

        if peer_echoing {
            let echoed: u16 = packet.read()?;
            let corrector: u16 = packet.read()?;

            if !had_pending {
                let now16 = to_stamp16(now64);
                let round_trip = wrap16_elapsed(now16, echoed);
                let transit = round_trip.saturating_sub(corrector);
                let one_way = transit / 2;

                self.last_rtt = Some(transit);
                self.my_latency = Some(one_way);

                let sample = peer_full as i64 - now64 as i64 + i64::from(one_way);
                self.offsets.push(sample);
            }
        }

        Ok(PlannerUnpack { captured })
    }

    /// One-way latency of this host's packets toward the peer, in millis.
    pub fn latency(&self) -> Option<u16> {
        self.my_latency
    }

    /// One-way latency as last reported by the peer, in millis.
    pub fn peer_latency(&self) -> Option<u16> {
        self.peer_latency
    }

    /// Last measured round trip, peer processing delay excluded.
    pub fn rtt(&self) -> Option<u16> {
        self.last_rtt
    }

    /// Running mean of `peer clock - local clock`, in millis.
    pub fn clock_offset(&self) -> Option<i64> {
        self.offsets.mean()
    }

    /// Whether a captured peer timestamp is still waiting to be echoed.
    pub fn awaiting_echo(&self) -> bool {
        self.pending_echo.is_some()
    }
}
