//! Fixed-width integer matcher.

use super::Matcher;
use crate::comparison::Comparison;
use crate::context::Context;
use crate::location::{AbsoluteOffset, Location};
use oximagic_core::endian::{ByteOrder, sign_extend};
use oximagic_core::error::{OxiMagicError, Result};

/// Integer width read by a [`NumericMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    /// 1 byte.
    Byte,
    /// 2 bytes.
    Short,
    /// 4 bytes.
    Long,
}

impl Width {
    /// Width in bytes.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Short => 2,
            Self::Long => 4,
        }
    }

    /// Width for a byte count of 1, 2 or 4.
    pub fn from_bytes(bytes: usize) -> Result<Self> {
        match bytes {
            1 => Ok(Self::Byte),
            2 => Ok(Self::Short),
            4 => Ok(Self::Long),
            other => Err(OxiMagicError::invalid_width(other)),
        }
    }

    const fn all_bits(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Short => 0xFFFF,
            Self::Long => 0xFFFF_FFFF,
        }
    }
}

/// Parse an integer literal: decimal, `0x` hex or leading-`0` octal, with an
/// optional sign.
pub fn parse_literal(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (digits, radix) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (hex, 16)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (&unsigned[1..], 8)
    } else {
        (unsigned, 10)
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(bad_literal(text));
    }
    let magnitude = i64::from_str_radix(digits, radix).map_err(|_| bad_literal(text))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn bad_literal(text: &str) -> OxiMagicError {
    OxiMagicError::invalid_rule(format!("invalid numeric literal '{text}'"))
}

/// Compares a 1, 2 or 4 byte integer at a location with a reference value.
///
/// The value read is masked, then sign-extended when the matcher is signed.
/// The reference is truncated to the matcher width and read with the same
/// signedness, so `0xFF` and `-1` are the same reference for a signed byte.
#[derive(Debug)]
pub struct NumericMatcher {
    location: Box<dyn Location>,
    width: Width,
    value: i64,
    mask: Option<u32>,
    byte_order: ByteOrder,
    signed: bool,
    comparison: Comparison,
}

impl NumericMatcher {
    /// Signed, big-endian, unmasked `==` matcher at `offset`.
    pub fn new(offset: u64, width: Width, value: i64) -> Self {
        Self {
            location: Box::new(AbsoluteOffset(offset)),
            width,
            value,
            mask: None,
            byte_order: ByteOrder::BigEndian,
            signed: true,
            comparison: Comparison::Equals,
        }
    }

    /// Replace the location strategy.
    pub fn with_location(mut self, location: impl Location + 'static) -> Self {
        self.location = Box::new(location);
        self
    }

    /// AND the value read with `mask` before comparing.
    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Byte order of the value read.
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Signed or unsigned interpretation.
    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Comparison operator.
    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Width read.
    pub fn width(&self) -> Width {
        self.width
    }

    /// Reference value after truncation to the matcher width.
    pub fn reference(&self) -> i64 {
        self.interpret((self.value as u64 & self.width.all_bits() as u64) as u32)
    }

    fn interpret(&self, raw: u32) -> i64 {
        if self.signed {
            sign_extend(raw, self.width.bytes()) as i64
        } else {
            raw as i64
        }
    }
}

impl Matcher for NumericMatcher {
    fn matches(&self, ctx: &mut Context<'_>) -> Result<bool> {
        let stream = ctx.stream();
        self.location.locate(stream)?;

        let saved = stream.byte_order();
        stream.set_byte_order(self.byte_order);
        let read = stream.read_unsigned(self.width.bytes());
        stream.set_byte_order(saved);

        let raw = read? & self.mask.unwrap_or(u32::MAX);
        let actual = self.interpret(raw);
        Ok(self.comparison.evaluate(&actual, &self.reference()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oximagic_core::stream::{MemoryCachingStream, SeekableStream};

    fn check(matcher: &NumericMatcher, bytes: &[u8]) -> Result<bool> {
        let mut stream = MemoryCachingStream::from_bytes(bytes.to_vec());
        let mut ctx = Context::new(&mut stream);
        matcher.matches(&mut ctx)
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal("37").unwrap(), 37);
        assert_eq!(parse_literal("0x25").unwrap(), 0x25);
        assert_eq!(parse_literal("0XfF").unwrap(), 255);
        assert_eq!(parse_literal("010").unwrap(), 8);
        assert_eq!(parse_literal("0").unwrap(), 0);
        assert_eq!(parse_literal("-12").unwrap(), -12);
        assert_eq!(parse_literal("+0x10").unwrap(), 16);
        assert!(parse_literal("").is_err());
        assert!(parse_literal("0x").is_err());
        assert!(parse_literal("09").is_err());
        assert!(parse_literal("--1").is_err());
        assert!(parse_literal("twelve").is_err());
    }

    #[test]
    fn test_byte_equals() {
        let m = NumericMatcher::new(0, Width::Byte, 0x25);
        assert!(check(&m, b"%PDF").unwrap());
        assert!(!check(&m, b"PDF").unwrap());
    }

    #[test]
    fn test_signed_reference_truncation() {
        let signed = NumericMatcher::new(0, Width::Byte, 0xFF);
        assert_eq!(signed.reference(), -1);
        assert!(check(&signed, &[0xFF]).unwrap());

        let unsigned = NumericMatcher::new(0, Width::Byte, 0xFF).with_signed(false);
        assert_eq!(unsigned.reference(), 255);
        assert!(check(&unsigned, &[0xFF]).unwrap());
    }

    #[test]
    fn test_byte_order_and_mask() {
        let be = NumericMatcher::new(1, Width::Short, 0x1234).with_signed(false);
        assert!(check(&be, &[0, 0x12, 0x34]).unwrap());

        let le = NumericMatcher::new(1, Width::Short, 0x1234)
            .with_signed(false)
            .with_byte_order(ByteOrder::LittleEndian);
        assert!(check(&le, &[0, 0x34, 0x12]).unwrap());

        let masked = NumericMatcher::new(0, Width::Long, 0x0000_0100)
            .with_signed(false)
            .with_mask(0x0000_FF00);
        assert!(check(&masked, &[0xAB, 0xCD, 0x01, 0xEF]).unwrap());
    }

    #[test]
    fn test_ordering_respects_sign() {
        let signed = NumericMatcher::new(0, Width::Byte, 0).with_comparison(Comparison::Less);
        assert!(check(&signed, &[0x80]).unwrap());

        let unsigned = NumericMatcher::new(0, Width::Byte, 0)
            .with_signed(false)
            .with_comparison(Comparison::Greater);
        assert!(check(&unsigned, &[0x80]).unwrap());
    }

    #[test]
    fn test_stream_order_restored() {
        let m = NumericMatcher::new(0, Width::Short, 1).with_byte_order(ByteOrder::LittleEndian);
        let mut stream = MemoryCachingStream::from_bytes(vec![1, 0]);
        {
            let mut ctx = Context::new(&mut stream);
            assert!(m.matches(&mut ctx).unwrap());
        }
        assert_eq!(stream.byte_order(), ByteOrder::BigEndian);
    }

    #[test]
    fn test_short_input_is_eof() {
        let m = NumericMatcher::new(2, Width::Long, 0);
        let err = check(&m, &[1, 2, 3]).unwrap_err();
        assert!(err.is_eof());
        assert!(!err.is_contract_violation());
    }
}
