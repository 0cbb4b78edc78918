//! Plain-text heuristics.

use super::{Matcher, read_window};
use crate::comparison::Comparison;
use crate::context::Context;
use crate::location::{AbsoluteOffset, Location};
use oximagic_core::error::{OxiMagicError, Result};

/// Window size of [`AsciiTextMatcher`] when a rule gives none.
pub const DEFAULT_TEXT_RANGE: usize = 512;

/// Accepts when every byte in a bounded window is printable ASCII or common
/// whitespace.
///
/// An empty window is accepted, so an empty stream counts as text.
#[derive(Debug)]
pub struct AsciiTextMatcher {
    location: Box<dyn Location>,
    range: usize,
}

impl AsciiTextMatcher {
    /// Check `range` bytes starting at `offset`.
    pub fn new(offset: u64, range: usize) -> Self {
        Self {
            location: Box::new(AbsoluteOffset(offset)),
            range,
        }
    }

    fn is_text(byte: u8) -> bool {
        matches!(byte, 0x20..=0x7E | b'\t' | b'\n' | b'\r' | 0x0C | 0x1B)
    }
}

impl Default for AsciiTextMatcher {
    fn default() -> Self {
        Self::new(0, DEFAULT_TEXT_RANGE)
    }
}

impl Matcher for AsciiTextMatcher {
    fn matches(&self, ctx: &mut Context<'_>) -> Result<bool> {
        let stream = ctx.stream();
        self.location.locate(stream)?;
        let window = read_window(stream, self.range)?;
        Ok(window.iter().all(|&b| Self::is_text(b)))
    }
}

/// Compares the stated extension hint with a list of extensions.
///
/// With `==` the matcher accepts when the hint is one of the extensions;
/// with `!=` when it is not (or there is no hint).
#[derive(Debug, Clone)]
pub struct ExtensionMatcher {
    extensions: Vec<String>,
    comparison: Comparison,
}

impl ExtensionMatcher {
    /// Accept any of `extensions`, compared case-insensitively.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            comparison: Comparison::Equals,
        }
    }

    /// Set the comparison operator.
    ///
    /// # Errors
    ///
    /// Returns [`OxiMagicError::InvalidRule`] for anything but `==` and `!=`.
    pub fn with_comparison(mut self, comparison: Comparison) -> Result<Self> {
        if !comparison.is_equality() {
            return Err(OxiMagicError::invalid_rule(format!(
                "extension matcher only supports == and !=, got {comparison}"
            )));
        }
        self.comparison = comparison;
        Ok(self)
    }
}

impl Matcher for ExtensionMatcher {
    fn matches(&self, ctx: &mut Context<'_>) -> Result<bool> {
        let listed = ctx
            .stated_extension()
            .is_some_and(|hint| self.extensions.iter().any(|e| e == hint));
        Ok(self.comparison.evaluate_unordered(&listed, &true))
    }
}
