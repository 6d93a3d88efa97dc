use thiserror::Error;

use crate::field::error::FieldError;
use crate::packet::error::PacketError;
use crate::protocol::ProtocolError;
use crate::types::{ClassId, UpdateCount};

/// Errors that can occur while packing or applying scene messages.
///
/// Stale packets are reported distinctly from extraction failures so a
/// caller can request a full resync instead of treating the buffer as
/// corrupt. None of these are fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// A delta's declared update-count range does not bracket local state:
    /// a duplicate, out-of-order or wrapped-around packet
    #[error("delta range {{{last}, {now}}} does not bracket local update count {local}")]
    StalePacket {
        last: UpdateCount,
        now: UpdateCount,
        local: UpdateCount,
    },

    /// A received class id has no registered constructor; applying the
    /// remaining objects of that packet is aborted
    #[error("no constructor registered for class id {class_id}")]
    UnknownClass { class_id: ClassId },

    /// The packet names a scene other than the one applying it
    #[error("packet is for scene {got:?}, this scene is {expected:?}")]
    WrongScene { expected: String, got: String },

    /// The packet's leading tag is not the message this call handles
    #[error("expected a {expected} message, got tag for another kind")]
    UnexpectedMessage { expected: &'static str },

    /// Pack or apply was invoked for an identity the scene is not syncing
    #[error("identity is not being synced by this scene")]
    UnknownClient,

    /// An operation referenced a sid this scene does not hold
    #[error("scene holds no entity with sid {sid}")]
    UnknownObject { sid: crate::types::Sid },

    /// A watched-event record carried an unknown event tag
    #[error("unknown watched event tag {tag}")]
    UnknownEventTag { tag: u8 },

    /// An object header carried an unknown sync mode
    #[error("unknown sync mode {value} in object header")]
    UnknownSyncMode { value: u8 },

    /// Field delta group failed to apply
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Underlying packet extraction failed
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// Message tag decoding failed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
