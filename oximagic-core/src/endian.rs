//! Byte order and multi-width primitive encoding.
//!
//! Every typed read on a [`SeekableStream`](crate::stream::SeekableStream)
//! assembles its bytes through [`Primitive::decode`], so the byte-order rules
//! live in exactly one place.
//!
//! # Example
//!
//! ```
//! use oximagic_core::endian::{ByteOrder, Primitive};
//!
//! let mut buf = [0u8; 4];
//! 0xCAFEBABEu32.encode(ByteOrder::LittleEndian, &mut buf);
//! assert_eq!(buf, [0xBE, 0xBA, 0xFE, 0xCA]);
//! assert_eq!(u32::decode(&buf, ByteOrder::LittleEndian), 0xCAFEBABE);
//! ```

use crate::error::{OxiMagicError, Result};
use std::fmt;

/// Byte order used to assemble multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Most significant byte first (network order).
    #[default]
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

impl ByteOrder {
    /// The byte order of the platform this code was compiled for.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }

    /// The opposite byte order.
    pub const fn swapped(self) -> Self {
        match self {
            Self::BigEndian => Self::LittleEndian,
            Self::LittleEndian => Self::BigEndian,
        }
    }

    /// Parse a byte order label from a rule definition.
    ///
    /// Labels are case-insensitive. Any label starting with `native` resolves
    /// to big-endian, the same order a stream uses before it is configured,
    /// so rule authors and stream users see one interpretation.
    pub fn parse(label: &str) -> Result<Self> {
        let lower = label.trim().to_ascii_lowercase();
        if lower.starts_with("native") {
            return Ok(Self::BigEndian);
        }
        match lower.as_str() {
            "big" | "be" | "big-endian" | "big_endian" | "bigendian" | "network" | "motorola" => {
                Ok(Self::BigEndian)
            }
            "little" | "le" | "little-endian" | "little_endian" | "littleendian" | "intel" => {
                Ok(Self::LittleEndian)
            }
            _ => Err(OxiMagicError::invalid_rule(format!(
                "unknown byte order '{label}'"
            ))),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BigEndian => write!(f, "big-endian"),
            Self::LittleEndian => write!(f, "little-endian"),
        }
    }
}

/// A fixed-width value that can be decoded from and encoded to bytes.
pub trait Primitive: Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes.
    fn decode(bytes: &[u8], order: ByteOrder) -> Self;

    /// Encode into exactly `SIZE` bytes.
    fn encode(self, order: ByteOrder, out: &mut [u8]);
}

macro_rules! impl_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Primitive for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn decode(bytes: &[u8], order: ByteOrder) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    match order {
                        ByteOrder::BigEndian => <$ty>::from_be_bytes(raw),
                        ByteOrder::LittleEndian => <$ty>::from_le_bytes(raw),
                    }
                }

                #[inline]
                fn encode(self, order: ByteOrder, out: &mut [u8]) {
                    let raw = match order {
                        ByteOrder::BigEndian => self.to_be_bytes(),
                        ByteOrder::LittleEndian => self.to_le_bytes(),
                    };
                    out[..Self::SIZE].copy_from_slice(&raw);
                }
            }
        )*
    };
}

impl_primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Assemble 1 to 4 bytes into an unsigned value.
pub fn assemble_unsigned(bytes: &[u8], order: ByteOrder) -> Result<u32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(OxiMagicError::invalid_width(bytes.len()));
    }
    let value = match order {
        ByteOrder::BigEndian => bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32),
        ByteOrder::LittleEndian => bytes
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32),
    };
    Ok(value)
}

/// Sign-extend the low `width` bytes of `raw` to a 32-bit integer.
///
/// The sign bit is the top bit of the most significant byte.
#[inline]
pub fn sign_extend(raw: u32, width: usize) -> i32 {
    let shift = 32 - (width as u32 * 8);
    ((raw << shift) as i32) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!(ByteOrder::parse("big").unwrap(), ByteOrder::BigEndian);
        assert_eq!(ByteOrder::parse("LE").unwrap(), ByteOrder::LittleEndian);
        assert_eq!(
            ByteOrder::parse("nativeEndian").unwrap(),
            ByteOrder::BigEndian
        );
        assert!(ByteOrder::parse("middle").is_err());
    }

    #[test]
    fn test_decode_both_orders() {
        let bytes = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(u32::decode(&bytes, ByteOrder::BigEndian), 0x12345678);
        assert_eq!(u32::decode(&bytes, ByteOrder::LittleEndian), 0x78563412);
        assert_eq!(i16::decode(&[0xFF, 0xFE], ByteOrder::BigEndian), -2);
    }

    #[test]
    fn test_encode_decode_float() {
        let mut buf = [0u8; 8];
        1.5f64.encode(ByteOrder::LittleEndian, &mut buf);
        assert_eq!(f64::decode(&buf, ByteOrder::LittleEndian), 1.5);
        assert_ne!(f64::decode(&buf, ByteOrder::BigEndian), 1.5);
    }

    #[test]
    fn test_assemble_and_sign_extend() {
        let raw = assemble_unsigned(&[0xFF, 0x80, 0x00], ByteOrder::BigEndian).unwrap();
        assert_eq!(raw, 0xFF8000);
        assert_eq!(sign_extend(raw, 3), -32768);

        let raw = assemble_unsigned(&[0x00, 0x80], ByteOrder::LittleEndian).unwrap();
        assert_eq!(raw, 0x8000);
        assert_eq!(sign_extend(raw, 2), -32768);
        assert_eq!(sign_extend(0x7F, 1), 127);
        assert_eq!(sign_extend(0xFFFF_FFFF, 4), -1);

        assert!(assemble_unsigned(&[], ByteOrder::BigEndian).is_err());
        assert!(assemble_unsigned(&[0; 5], ByteOrder::BigEndian).is_err());
    }

    #[test]
    fn test_swapped() {
        assert_eq!(ByteOrder::BigEndian.swapped(), ByteOrder::LittleEndian);
        assert_eq!(ByteOrder::native().swapped().swapped(), ByteOrder::native());
    }
}
