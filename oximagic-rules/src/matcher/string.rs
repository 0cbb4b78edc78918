//! Fixed byte-pattern matcher.

use super::{Matcher, unescape};
use crate::charset::Charset;
use crate::context::Context;
use crate::location::{AbsoluteOffset, Location};
use oximagic_core::error::Result;
use std::fmt;

/// Compares the bytes at a location with a fixed pattern.
pub struct StringMatcher {
    location: Box<dyn Location>,
    pattern: Vec<u8>,
    source: String,
    charset: Charset,
}

impl StringMatcher {
    /// Build from an escaped pattern encoded with `charset`.
    ///
    /// Malformed escapes and characters the charset cannot encode are
    /// rejected here rather than at match time.
    pub fn new(offset: u64, pattern: &str, charset: Charset) -> Result<Self> {
        let bytes = charset.encode(&unescape(pattern)?)?;
        Ok(Self {
            location: Box::new(AbsoluteOffset(offset)),
            pattern: bytes,
            source: pattern.to_string(),
            charset,
        })
    }

    /// Build from raw bytes.
    pub fn from_bytes(offset: u64, pattern: impl Into<Vec<u8>>) -> Self {
        let pattern = pattern.into();
        Self {
            location: Box::new(AbsoluteOffset(offset)),
            source: String::from_utf8_lossy(&pattern).into_owned(),
            pattern,
            charset: Charset::Latin1,
        }
    }

    /// Replace the location strategy.
    pub fn with_location(mut self, location: impl Location + 'static) -> Self {
        self.location = Box::new(location);
        self
    }

    /// Encoded pattern.
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }
}

impl Matcher for StringMatcher {
    fn matches(&self, ctx: &mut Context<'_>) -> Result<bool> {
        if self.pattern.is_empty() {
            return Ok(true);
        }
        let stream = ctx.stream();
        self.location.locate(stream)?;
        let mut actual = vec![0u8; self.pattern.len()];
        stream.read_fully(&mut actual)?;
        Ok(actual == self.pattern)
    }
}

impl fmt::Debug for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringMatcher")
            .field("location", &self.location)
            .field("pattern", &self.source)
            .field("charset", &self.charset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oximagic_core::stream::MemoryCachingStream;

    fn check(matcher: &StringMatcher, bytes: &[u8]) -> Result<bool> {
        let mut stream = MemoryCachingStream::from_bytes(bytes.to_vec());
        let mut ctx = Context::new(&mut stream);
        matcher.matches(&mut ctx)
    }

    #[test]
    fn test_exact_match_at_offset() {
        let m = StringMatcher::new(1, "PDF-", Charset::Latin1).unwrap();
        assert!(check(&m, b"%PDF-1.4").unwrap());
        assert!(!check(&m, b"%PDX-1.4").unwrap());
    }

    #[test]
    fn test_escaped_binary_pattern() {
        let m = StringMatcher::new(0, r"\x89PNG\r\n\x1a\n", Charset::Latin1).unwrap();
        assert_eq!(m.pattern(), b"\x89PNG\r\n\x1a\n");
        assert!(check(&m, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap());
    }

    #[test]
    fn test_utf16_pattern() {
        let m = StringMatcher::new(0, "ab", Charset::Utf16Le).unwrap();
        assert!(check(&m, &[b'a', 0, b'b', 0]).unwrap());
    }

    #[test]
    fn test_empty_pattern_always_matches() {
        let m = StringMatcher::from_bytes(100, Vec::new());
        assert!(check(&m, b"").unwrap());
    }

    #[test]
    fn test_short_stream_is_eof() {
        let m = StringMatcher::from_bytes(0, b"GIF89a".to_vec());
        assert!(check(&m, b"GIF").unwrap_err().is_eof());
    }

    #[test]
    fn test_unencodable_pattern_fails_at_build() {
        assert!(StringMatcher::new(0, r"€", Charset::Latin1).is_err());
        assert!(StringMatcher::new(0, r"\z", Charset::Latin1).is_err());
    }
}
