//! Append-only binary buffer with independent write and read cursors.
//!
//! The write cursor is always at the end; fields whose final value is only
//! known later (update counts, object counts, send-instant timestamps) are
//! reserved with [`Packet::reserve`] and rewritten in place with
//! [`Packet::pack_at`]. The read cursor advances through sequential
//! [`Packet::read`] calls; a read that would run past the end marks the
//! packet invalid, and that flag is sticky until [`Packet::clear`] or
//! [`Packet::revalidate`].

pub mod error;
pub mod wire;

use error::PacketError;
use wire::Wire;

/// A borrowed, advancing view over a packet's bytes.
///
/// Positions reported in errors are absolute offsets into the underlying
/// buffer, not offsets relative to where the view started.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Consumes `n` bytes, or fails without consuming anything.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], PacketError> {
        if self.pos + n > self.buf.len() {
            return Err(PacketError::UnexpectedEnd {
                offset: self.pos,
                wanted: n,
                len: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), PacketError> {
        self.take(n).map(|_| ())
    }

    pub fn read<T: Wire>(&mut self) -> Result<T, PacketError> {
        T::de(self)
    }
}

/// An append-only, independently-read binary buffer.
///
/// Packets are value-like: the caller owns them on the stack or hands them
/// across threads inside a send queue entry.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    buf: Vec<u8>,
    read: usize,
    invalid: bool,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            read: 0,
            invalid: false,
        }
    }

    /// Wraps received bytes for extraction.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            buf: bytes,
            read: 0,
            invalid: false,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // Writing

    /// Copies raw bytes verbatim to the end.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Packs a value at the end, normalized to wire byte order.
    pub fn pack<T: Wire>(&mut self, value: &T) {
        value.ser(&mut self.buf);
    }

    /// Reserves `n` zeroed bytes at the end and returns their offset, to be
    /// rewritten with [`Packet::pack_at`] once the final value is known.
    pub fn reserve(&mut self, n: usize) -> usize {
        let offset = self.buf.len();
        self.buf.resize(offset + n, 0);
        offset
    }

    /// Overwrites a previously written (or reserved) position. Never grows
    /// the buffer; a rewrite that would is an error.
    pub fn pack_at<T: Wire>(&mut self, pos: usize, value: &T) -> Result<(), PacketError> {
        let mut scratch = Vec::new();
        value.ser(&mut scratch);
        if pos + scratch.len() > self.buf.len() {
            return Err(PacketError::RewriteOutOfBounds {
                offset: pos,
                wanted: scratch.len(),
                len: self.buf.len(),
            });
        }
        self.buf[pos..pos + scratch.len()].copy_from_slice(&scratch);
        Ok(())
    }

    /// Removes the last `n` bytes. Used to undo an optimistic reservation
    /// when nothing was ultimately written behind it.
    pub fn shrink(&mut self, n: usize) -> Result<(), PacketError> {
        if n > self.buf.len() {
            return Err(PacketError::ShrinkPastStart {
                wanted: n,
                len: self.buf.len(),
            });
        }
        self.buf.truncate(self.buf.len() - n);
        self.read = self.read.min(self.buf.len());
        Ok(())
    }

    /// Empties the buffer, resets the read cursor and clears the sticky
    /// invalid flag.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.read = 0;
        self.invalid = false;
    }

    // Reading

    /// Sequentially extracts a value, advancing the read cursor.
    ///
    /// On failure the packet is marked invalid; every subsequent sequential
    /// read fails fast with [`PacketError::Invalidated`] until
    /// [`Packet::revalidate`] or [`Packet::clear`].
    pub fn read<T: Wire>(&mut self) -> Result<T, PacketError> {
        if self.invalid {
            return Err(PacketError::Invalidated);
        }
        let mut reader = Reader::at(&self.buf, self.read);
        match T::de(&mut reader) {
            Ok(value) => {
                self.read = reader.pos();
                Ok(value)
            }
            Err(err) => {
                self.invalid = true;
                Err(err)
            }
        }
    }

    /// Sequentially extracts `n` raw bytes, with the same sticky
    /// invalidation as [`Packet::read`].
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, PacketError> {
        if self.invalid {
            return Err(PacketError::Invalidated);
        }
        let mut reader = Reader::at(&self.buf, self.read);
        match reader.take(n) {
            Ok(bytes) => {
                let out = bytes.to_vec();
                self.read = reader.pos();
                Ok(out)
            }
            Err(err) => {
                self.invalid = true;
                Err(err)
            }
        }
    }

    /// Advances the read cursor without extracting, discarding fields not
    /// relevant to the current receiver role.
    pub fn skip(&mut self, n: usize) -> Result<(), PacketError> {
        if self.invalid {
            return Err(PacketError::Invalidated);
        }
        if self.read + n > self.buf.len() {
            self.invalid = true;
            return Err(PacketError::UnexpectedEnd {
                offset: self.read,
                wanted: n,
                len: self.buf.len(),
            });
        }
        self.read += n;
        Ok(())
    }

    /// Random-access extraction. Does not advance the read cursor and does
    /// not invalidate the packet on failure.
    pub fn read_at<T: Wire>(&self, pos: usize) -> Result<T, PacketError> {
        let mut reader = Reader::at(&self.buf, pos);
        T::de(&mut reader)
    }

    pub fn read_cursor(&self) -> usize {
        self.read
    }

    pub fn set_read_cursor(&mut self, pos: usize) -> Result<(), PacketError> {
        if pos > self.buf.len() {
            return Err(PacketError::CursorOutOfBounds {
                pos,
                len: self.buf.len(),
            });
        }
        self.read = pos;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.read)
    }

    /// Whether every sequential read so far has succeeded.
    pub fn is_valid(&self) -> bool {
        !self.invalid
    }

    /// Clears the sticky invalid flag, leaving buffer and cursor untouched.
    pub fn revalidate(&mut self) {
        self.invalid = false;
    }
}
