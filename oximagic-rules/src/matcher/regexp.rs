//! Bounded-window regular expression matcher.

use super::{Matcher, read_window};
use crate::charset::Charset;
use crate::comparison::Comparison;
use crate::context::Context;
use crate::location::{AbsoluteOffset, Location};
use oximagic_core::error::{OxiMagicError, Result};
use regex::bytes::{Regex, RegexBuilder};

/// Window size used when a rule gives none.
pub const DEFAULT_RANGE: usize = 100;

/// Compilation flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexpFlags {
    /// Case-insensitive matching.
    pub case_insensitive: bool,
    /// `^` and `$` match at line boundaries.
    pub multiline: bool,
    /// `.` also matches `\n`.
    pub dot_all: bool,
    /// Case folding covers non-ASCII letters.
    pub unicode_case: bool,
    /// Canonical equivalence. Not supported by the engine and ignored.
    pub canonical_eq: bool,
}

impl RegexpFlags {
    /// Set a flag by name.
    pub fn set(&mut self, name: &str) -> Result<()> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "case_insensitive" | "i" => self.case_insensitive = true,
            "multiline" | "m" => self.multiline = true,
            "dot_all" | "dotall" | "s" => self.dot_all = true,
            "unicode_case" | "u" => self.unicode_case = true,
            "canonical_eq" => self.canonical_eq = true,
            _ => {
                return Err(OxiMagicError::invalid_rule(format!(
                    "unknown regexp flag '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// Matches a regular expression against a decoded window of the stream.
///
/// The window is `range` bytes from the location, trimmed at end of stream.
/// The expression must match somewhere inside the window; without
/// `dot_all` it cannot span a line break. Only `==` and `!=` are accepted as
/// comparisons: `!=` inverts the result.
#[derive(Debug)]
pub struct RegexpMatcher {
    location: Box<dyn Location>,
    expression: String,
    regex: Regex,
    range: usize,
    charset: Charset,
    comparison: Comparison,
}

impl RegexpMatcher {
    /// Compile `expression` with default flags, Latin-1 decoding and the
    /// default range.
    pub fn new(offset: u64, expression: &str) -> Result<Self> {
        Self::with_options(
            offset,
            expression,
            RegexpFlags::default(),
            Charset::Latin1,
            DEFAULT_RANGE,
            Comparison::Equals,
        )
    }

    /// Compile with explicit options.
    pub fn with_options(
        offset: u64,
        expression: &str,
        flags: RegexpFlags,
        charset: Charset,
        range: usize,
        comparison: Comparison,
    ) -> Result<Self> {
        if !comparison.is_equality() {
            return Err(OxiMagicError::invalid_rule(format!(
                "regexp '{expression}' only supports == and !=, got {comparison}"
            )));
        }
        if flags.canonical_eq {
            tracing::warn!(expression, "canonical_eq is not supported; flag ignored");
        }
        let regex = RegexBuilder::new(&format!(r"\A(?:.*(?:{expression}).*)\z"))
            .case_insensitive(flags.case_insensitive)
            .multi_line(flags.multiline)
            .dot_matches_new_line(flags.dot_all)
            .unicode(flags.unicode_case || !flags.case_insensitive)
            .build()
            .map_err(|e| {
                OxiMagicError::invalid_rule(format!("invalid regexp '{expression}': {e}"))
            })?;
        Ok(Self {
            location: Box::new(AbsoluteOffset(offset)),
            expression: expression.to_string(),
            regex,
            range,
            charset,
            comparison,
        })
    }

    /// Replace the location strategy.
    pub fn with_location(mut self, location: impl Location + 'static) -> Self {
        self.location = Box::new(location);
        self
    }

    /// Source expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Window size in bytes.
    pub fn range(&self) -> usize {
        self.range
    }
}

impl Matcher for RegexpMatcher {
    fn matches(&self, ctx: &mut Context<'_>) -> Result<bool> {
        let stream = ctx.stream();
        self.location.locate(stream)?;
        let window = read_window(stream, self.range)?;
        let text = self.charset.decode(&window);
        let found = self.regex.is_match(text.as_bytes());
        Ok(self.comparison.evaluate_unordered(&found, &true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oximagic_core::stream::MemoryCachingStream;

    fn check(matcher: &RegexpMatcher, bytes: &[u8]) -> bool {
        let mut stream = MemoryCachingStream::from_bytes(bytes.to_vec());
        let mut ctx = Context::new(&mut stream);
        matcher.matches(&mut ctx).unwrap()
    }

    fn ranged(expression: &str, range: usize) -> RegexpMatcher {
        RegexpMatcher::with_options(
            0,
            expression,
            RegexpFlags::default(),
            Charset::Latin1,
            range,
            Comparison::Equals,
        )
        .unwrap()
    }

    #[test]
    fn test_window_of_ten() {
        let m = ranged("abc", 10);
        assert!(!check(&m, b"xxxxxxxxxx"));
        assert!(check(&m, b"xxxabcxxxx"));
    }

    #[test]
    fn test_match_beyond_range_is_ignored() {
        let m = ranged("abc", 10);
        assert!(!check(&m, b"xxxxxxxxxxabc"));
        assert!(!check(&m, b"xxxxxxxxab"));
    }

    #[test]
    fn test_window_trimmed_at_eof() {
        let m = ranged(r"abc\z", 10);
        assert!(check(&m, b"abc"));
        assert!(!check(&RegexpMatcher::new(0, "a").unwrap(), b""));
    }

    #[test]
    fn test_line_breaks_need_dot_all() {
        let plain = RegexpMatcher::new(0, "<html").unwrap();
        assert!(!check(&plain, b"<html>\n<body>"));

        let flags = RegexpFlags {
            dot_all: true,
            case_insensitive: true,
            ..RegexpFlags::default()
        };
        let m = RegexpMatcher::with_options(
            0,
            "<html",
            flags,
            Charset::Latin1,
            DEFAULT_RANGE,
            Comparison::Equals,
        )
        .unwrap();
        assert!(check(&m, b"<!doctype x>\n<HTML>\n<body>"));
    }

    #[test]
    fn test_not_equals_inverts() {
        let m = RegexpMatcher::with_options(
            0,
            "abc",
            RegexpFlags::default(),
            Charset::Latin1,
            10,
            Comparison::NotEquals,
        )
        .unwrap();
        assert!(check(&m, b"xxxxxxxxxx"));
        assert!(!check(&m, b"abc"));
    }

    #[test]
    fn test_decodes_before_matching() {
        let m = RegexpMatcher::with_options(
            0,
            "é",
            RegexpFlags::default(),
            Charset::Utf16Be,
            DEFAULT_RANGE,
            Comparison::Equals,
        )
        .unwrap();
        assert!(check(&m, &[0x00, 0x63, 0x00, 0x61, 0x00, 0x66, 0x00, 0xE9]));
    }

    #[test]
    fn test_rejected_configurations() {
        assert!(
            RegexpMatcher::with_options(
                0,
                "a",
                RegexpFlags::default(),
                Charset::Latin1,
                10,
                Comparison::Greater,
            )
            .is_err()
        );
        assert!(RegexpMatcher::new(0, "(unclosed").is_err());

        let mut flags = RegexpFlags::default();
        flags.set("CASE_INSENSITIVE").unwrap();
        flags.set("canonical_eq").unwrap();
        assert!(flags.case_insensitive && flags.canonical_eq);
        assert!(flags.set("sticky").is_err());
    }
}
