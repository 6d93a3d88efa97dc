/// What to stamp into an already-serialized buffer at the send instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteKind {
    /// Current wall millis modulo 65536 (planner send timestamp)
    Timestamp16,
    /// Current wall millis, full width
    Timestamp64,
    /// The sender's corrector latency, consumed from its pending capture
    CorrectorLatency,
}

/// A deferred rewrite instruction carried alongside a queued packet.
///
/// Stamping at the actual send instant — rather than at enqueue time — is
/// what keeps the latency estimate honest: queue wait counts as processing
/// delay and is corrected out on the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOp {
    pub kind: RewriteKind,
    pub offset: usize,
}

impl RewriteOp {
    pub fn new(kind: RewriteKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}
