use thiserror::Error;

/// Errors that can occur while packing into or extracting from a [`Packet`].
///
/// Extraction failures carry the byte offset at which the read was attempted
/// so a caller can log exactly where an incoming buffer went bad.
///
/// [`Packet`]: crate::Packet
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// A sequential or positional read ran past the end of the buffer
    #[error("read of {wanted} bytes at offset {offset} exceeds packet length {len}")]
    UnexpectedEnd {
        offset: usize,
        wanted: usize,
        len: usize,
    },

    /// The packet was invalidated by an earlier failed read and has not been
    /// revalidated since
    #[error("packet was invalidated by an earlier failed read")]
    Invalidated,

    /// A positional rewrite targeted bytes that do not exist yet.
    /// `pack_at` only overwrites, it never grows the buffer.
    #[error("rewrite of {wanted} bytes at offset {offset} exceeds packet length {len}")]
    RewriteOutOfBounds {
        offset: usize,
        wanted: usize,
        len: usize,
    },

    /// Attempted to shrink more bytes than the packet holds
    #[error("cannot shrink {wanted} bytes from a {len} byte packet")]
    ShrinkPastStart { wanted: usize, len: usize },

    /// Attempted to move the read cursor past the end of the buffer
    #[error("read cursor {pos} exceeds packet length {len}")]
    CursorOutOfBounds { pos: usize, len: usize },

    /// A length-prefixed string's payload was not valid UTF-8
    #[error("string payload at offset {offset} is not valid UTF-8")]
    InvalidString { offset: usize },
}
