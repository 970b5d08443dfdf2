//! Binary serialization contract for stored values.
//!
//! A storable type writes itself into a [`BinaryWriter`] and reads itself back
//! from a [`BinaryReader`]. The two methods must mirror each other exactly;
//! storage never looks inside the bytes.
//!
//! Layout:
//! - integers and floats are fixed width, little endian
//! - `bool` is one byte, any non-zero value reads back as `true`
//! - strings and blobs carry a 7-bit encoded length prefix followed by the
//!   raw bytes (UTF-8 for strings)

use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("7-bit encoded length is too large")]
    LengthOverflow,
}

// ============================================================================
// Writer
// ============================================================================

#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: BytesMut,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16_le(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64_le(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32_le(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    pub fn write_7bit_len(&mut self, mut len: usize) {
        while len >= 0x80 {
            self.buf.put_u8((len as u8 & 0x7f) | 0x80);
            len >>= 7;
        }
        self.buf.put_u8(len as u8);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_blob(value.as_bytes());
    }

    /// Length-prefixed byte blob.
    pub fn write_blob(&mut self, value: &[u8]) {
        self.write_7bit_len(value.len());
        self.buf.put_slice(value);
    }

    /// Raw bytes with no length prefix.
    pub fn write_raw(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

// ============================================================================
// Reader
// ============================================================================

#[derive(Debug)]
pub struct BinaryReader {
    buf: Bytes,
}

impl BinaryReader {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { buf: bytes.into() }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(DecodeError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64_le())
    }

    pub fn read_7bit_len(&mut self) -> Result<usize, DecodeError> {
        let mut value: u32 = 0;
        // A u32 never needs more than five groups.
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            let group = u32::from(byte & 0x7f);
            if shift == 28 && group > 0x0f {
                return Err(DecodeError::LengthOverflow);
            }
            value |= group << shift;
            if byte & 0x80 == 0 {
                return Ok(value as usize);
            }
        }
        Err(DecodeError::LengthOverflow)
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let blob = self.read_blob()?;
        String::from_utf8(blob.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    pub fn read_blob(&mut self) -> Result<Bytes, DecodeError> {
        let len = self.read_7bit_len()?;
        self.read_raw(len)
    }

    pub fn read_raw(&mut self, len: usize) -> Result<Bytes, DecodeError> {
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }
}

// ============================================================================
// Contract
// ============================================================================

/// A value that can be written to and read back from module storage.
///
/// `read` must consume exactly what `write` produced, in the same order.
pub trait BinarySerializable: Sized {
    fn write(&self, writer: &mut BinaryWriter);

    fn read(reader: &mut BinaryReader) -> Result<Self, DecodeError>;
}

pub fn to_bytes<T: BinarySerializable>(value: &T) -> Bytes {
    let mut writer = BinaryWriter::new();
    value.write(&mut writer);
    writer.into_bytes()
}

pub fn from_bytes<T: BinarySerializable>(bytes: impl Into<Bytes>) -> Result<T, DecodeError> {
    let mut reader = BinaryReader::new(bytes);
    T::read(&mut reader)
}

macro_rules! impl_primitive {
    ($($t:ty => $write:ident, $read:ident;)+) => {
        $(
            impl BinarySerializable for $t {
                fn write(&self, writer: &mut BinaryWriter) {
                    writer.$write(*self);
                }

                fn read(reader: &mut BinaryReader) -> Result<Self, DecodeError> {
                    reader.$read()
                }
            }
        )+
    };
}

impl_primitive! {
    bool => write_bool, read_bool;
    u8 => write_u8, read_u8;
    i8 => write_i8, read_i8;
    i16 => write_i16, read_i16;
    u16 => write_u16, read_u16;
    i32 => write_i32, read_i32;
    u32 => write_u32, read_u32;
    i64 => write_i64, read_i64;
    u64 => write_u64, read_u64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl BinarySerializable for String {
    fn write(&self, writer: &mut BinaryWriter) {
        writer.write_str(self);
    }

    fn read(reader: &mut BinaryReader) -> Result<Self, DecodeError> {
        reader.read_string()
    }
}

impl<T: BinarySerializable> BinarySerializable for Vec<T> {
    fn write(&self, writer: &mut BinaryWriter) {
        writer.write_7bit_len(self.len());
        for item in self {
            item.write(writer);
        }
    }

    fn read(reader: &mut BinaryReader) -> Result<Self, DecodeError> {
        let len = reader.read_7bit_len()?;
        // Every element takes at least one byte, so a corrupt length can't
        // make us reserve more than the input could hold.
        let mut items = Vec::with_capacity(len.min(reader.remaining()));
        for _ in 0..len {
            items.push(T::read(reader)?);
        }
        Ok(items)
    }
}

impl<T: BinarySerializable> BinarySerializable for Option<T> {
    fn write(&self, writer: &mut BinaryWriter) {
        match self {
            Some(value) => {
                writer.write_bool(true);
                value.write(writer);
            }
            None => writer.write_bool(false),
        }
    }

    fn read(reader: &mut BinaryReader) -> Result<Self, DecodeError> {
        if reader.read_bool()? {
            Ok(Some(T::read(reader)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Inventory {
        owner: String,
        slots: Vec<u16>,
        money: i64,
        nickname: Option<String>,
        weight: f32,
    }

    impl BinarySerializable for Inventory {
        fn write(&self, writer: &mut BinaryWriter) {
            writer.write_str(&self.owner);
            self.slots.write(writer);
            writer.write_i64(self.money);
            self.nickname.write(writer);
            writer.write_f32(self.weight);
        }

        fn read(reader: &mut BinaryReader) -> Result<Self, DecodeError> {
            Ok(Self {
                owner: reader.read_string()?,
                slots: Vec::read(reader)?,
                money: reader.read_i64()?,
                nickname: Option::read(reader)?,
                weight: reader.read_f32()?,
            })
        }
    }

    #[test]
    fn test_struct_round_trip() {
        let inventory = Inventory {
            owner: "Jürgen".to_string(),
            slots: vec![3, 0, 65535],
            money: -42,
            nickname: Some("j".to_string()),
            weight: 12.5,
        };

        let bytes = to_bytes(&inventory);
        let decoded: Inventory = from_bytes(bytes).unwrap();
        assert_eq!(decoded, inventory);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut writer = BinaryWriter::new();
        writer.write_i32(1);
        writer.write_str("ab");
        assert_eq!(writer.into_bytes().as_ref(), &[1, 0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_long_string_uses_multi_byte_length() {
        let long = "x".repeat(300);
        let bytes = to_bytes(&long);
        // 300 = 0b10_0101100 -> 0xAC 0x02
        assert_eq!(&bytes[..2], &[0xac, 0x02]);
        assert_eq!(from_bytes::<String>(bytes).unwrap(), long);
    }

    #[test]
    fn test_truncated_input_is_eof() {
        let err = from_bytes::<i64>(vec![1u8, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnexpectedEof {
                needed: 8,
                remaining: 3
            }
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let err = from_bytes::<String>(vec![2u8, 0xff, 0xfe]).unwrap_err();
        assert_eq!(err, DecodeError::InvalidUtf8);
    }

    #[test]
    fn test_length_overflow() {
        let err = from_bytes::<String>(vec![0xffu8, 0xff, 0xff, 0xff, 0xff, 0x01]).unwrap_err();
        assert_eq!(err, DecodeError::LengthOverflow);
    }

    #[test]
    fn test_nonzero_bool_reads_true() {
        assert!(from_bytes::<bool>(vec![7u8]).unwrap());
        assert!(!from_bytes::<bool>(vec![0u8]).unwrap());
    }
}
