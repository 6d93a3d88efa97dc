//! Leading message tag shared by every packet body.

use thiserror::Error;

use crate::packet::{error::PacketError, Packet};

/// Errors that can occur while decoding a message tag
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Unknown message tag received (possibly a malformed or hostile packet)
    #[error("unknown message tag {tag:#06x}")]
    UnknownTag { tag: u16 },

    /// Underlying packet extraction failed
    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// The logical message type carried by a packet, written as the first u16 of
/// the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Complete scene snapshot
    SceneFull,
    /// Per-client incremental scene update
    SceneDelta,
    /// Queued existence-transition events
    WatchedEvents,
    /// Receiver lost too much state and wants a fresh full snapshot
    AskFullUpdate,
    /// Application payload this crate does not interpret
    Data,
}

impl MessageKind {
    fn tag(self) -> u16 {
        match self {
            MessageKind::SceneFull => 1,
            MessageKind::SceneDelta => 2,
            MessageKind::WatchedEvents => 3,
            MessageKind::AskFullUpdate => 4,
            MessageKind::Data => 5,
        }
    }

    pub fn write(self, packet: &mut Packet) {
        packet.pack(&self.tag());
    }

    pub fn read(packet: &mut Packet) -> Result<Self, ProtocolError> {
        let tag: u16 = packet.read()?;
        match tag {
            1 => Ok(MessageKind::SceneFull),
            2 => Ok(MessageKind::SceneDelta),
            3 => Ok(MessageKind::WatchedEvents),
            4 => Ok(MessageKind::AskFullUpdate),
            5 => Ok(MessageKind::Data),
            _ => Err(ProtocolError::UnknownTag { tag }),
        }
    }
}
