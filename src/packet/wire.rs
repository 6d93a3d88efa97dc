use super::{error::PacketError, Reader};

/// A value with a deterministic wire form.
///
/// All multi-byte integers are normalized to little-endian on the wire,
/// independent of host architecture. Strings are length-prefixed (u32 count,
/// no terminator).
pub trait Wire: Sized {
    /// Appends the wire form of `self` to `out`.
    fn ser(&self, out: &mut Vec<u8>);

    /// Extracts a value from `reader`, advancing it.
    fn de(reader: &mut Reader<'_>) -> Result<Self, PacketError>;
}

macro_rules! wire_number {
    ($($num:ty),*) => {
        $(
            impl Wire for $num {
                fn ser(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn de(reader: &mut Reader<'_>) -> Result<Self, PacketError> {
                    let bytes = reader.take(core::mem::size_of::<$num>())?;
                    let mut raw = [0u8; core::mem::size_of::<$num>()];
                    raw.copy_from_slice(bytes);
                    Ok(<$num>::from_le_bytes(raw))
                }
            }
        )*
    };
}

wire_number!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Wire for bool {
    fn ser(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn de(reader: &mut Reader<'_>) -> Result<Self, PacketError> {
        Ok(u8::de(reader)? != 0)
    }
}

impl Wire for String {
    fn ser(&self, out: &mut Vec<u8>) {
        (self.len() as u32).ser(out);
        out.extend_from_slice(self.as_bytes());
    }

    fn de(reader: &mut Reader<'_>) -> Result<Self, PacketError> {
        let len = u32::de(reader)? as usize;
        let offset = reader.pos();
        let bytes = reader.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PacketError::InvalidString { offset })
    }
}

/// A 2D point, the wire form of vector-valued fields.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Wire for Point {
    fn ser(&self, out: &mut Vec<u8>) {
        self.x.ser(out);
        self.y.ser(out);
    }

    fn de(reader: &mut Reader<'_>) -> Result<Self, PacketError> {
        Ok(Self {
            x: f32::de(reader)?,
            y: f32::de(reader)?,
        })
    }
}
