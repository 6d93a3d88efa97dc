use thiserror::Error;

use crate::packet::error::PacketError;

/// Errors that can occur while applying a field delta group
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// A delta entry referenced a field index this set does not have
    #[error("unknown field index {index} in a delta group for a set of {count} fields")]
    UnknownIndex { index: u8, count: usize },

    /// Underlying packet extraction failed
    #[error(transparent)]
    Packet(#[from] PacketError),
}
