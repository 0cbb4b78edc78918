//! Predicates evaluated by rule nodes.
//!
//! A matcher positions the stream through its [`Location`](crate::location::Location),
//! reads what it needs and answers yes or no. I/O failures are returned as
//! errors; [`RuleNode`](crate::node::RuleNode) turns the non-contract ones into
//! a non-match.
//!
//! Builtin matchers:
//!
//! | Matcher               | Reads                                           |
//! |-----------------------|-------------------------------------------------|
//! | [`NumericMatcher`]    | 1, 2 or 4 byte integer, masked, signed or not   |
//! | [`StringMatcher`]     | Fixed byte pattern                              |
//! | [`RegexpMatcher`]     | Bounded window decoded and matched by a regex   |
//! | [`AsciiTextMatcher`]  | Bounded window checked for printable ASCII      |
//! | [`ExtensionMatcher`]  | Nothing; compares the stated extension hint     |

mod escape;
mod numeric;
mod regexp;
mod string;
mod text;

pub use escape::unescape;
pub use numeric::{NumericMatcher, Width, parse_literal};
pub use regexp::{DEFAULT_RANGE, RegexpFlags, RegexpMatcher};
pub use string::StringMatcher;
pub use text::{AsciiTextMatcher, DEFAULT_TEXT_RANGE, ExtensionMatcher};

use crate::context::Context;
use oximagic_core::error::Result;
use oximagic_core::stream::SeekableStream;
use std::fmt;

/// A predicate over an analysis [`Context`].
///
/// Implementations may seek and read the stream but should not write to the
/// result.
pub trait Matcher: fmt::Debug + Send + Sync {
    /// Evaluate against `ctx`.
    fn matches(&self, ctx: &mut Context<'_>) -> Result<bool>;
}

/// Bytes requested from the stream per read while filling a window.
const WINDOW_CHUNK: usize = 4096;

/// Read up to `range` bytes, stopping early at end of stream.
///
/// The window grows with the data actually read, so a rule's `range` is a
/// limit rather than an allocation size.
pub(crate) fn read_window(stream: &mut dyn SeekableStream, range: usize) -> Result<Vec<u8>> {
    let remaining = stream
        .length()
        .map(|length| length.saturating_sub(stream.position()));
    let capacity = match remaining {
        Some(remaining) => usize::try_from(remaining).map_or(range, |r| r.min(range)),
        None => range.min(WINDOW_CHUNK),
    };

    let mut window = Vec::with_capacity(capacity);
    let mut chunk = [0u8; WINDOW_CHUNK];
    while window.len() < range {
        let want = (range - window.len()).min(WINDOW_CHUNK);
        let n = stream.read(&mut chunk[..want])?;
        if n == 0 {
            break;
        }
        window.extend_from_slice(&chunk[..n]);
    }
    Ok(window)
}
