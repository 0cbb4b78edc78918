//! Error types for OxiMagic operations.
//!
//! This module provides a single error type that covers stream I/O, stream
//! contract violations, and rule construction failures. The distinction
//! matters to the rule engine: contract violations are programming errors
//! and always propagate, while everything else raised while a matcher probes
//! speculative content is treated as "no match".

use std::io;
use thiserror::Error;

/// The main error type for OxiMagic operations.
#[derive(Debug, Error)]
pub enum OxiMagicError {
    /// I/O error from the underlying source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unexpected end of data.
    #[error("Unexpected end of data: expected {expected} more bytes")]
    UnexpectedEof {
        /// Number of bytes that were expected but not available.
        expected: usize,
    },

    /// Attempt to seek below the flush watermark.
    #[error("Cannot seek to {position}: data before {flushed} has been flushed")]
    SeekBeforeFlushed {
        /// Requested position.
        position: u64,
        /// Current flush watermark.
        flushed: u64,
    },

    /// Flush position outside `[flushed, current]`.
    #[error("Invalid flush position {position}: must lie within [{flushed}, {current}]")]
    InvalidFlushPosition {
        /// Requested flush position.
        position: u64,
        /// Current flush watermark.
        flushed: u64,
        /// Current stream position.
        current: u64,
    },

    /// Bit count outside `[0, 64]`, or bit offset outside `[0, 7]`.
    #[error("Invalid bit count {count}: must be within [0, {max}]")]
    InvalidBitCount {
        /// Requested bit count.
        count: u32,
        /// Largest permitted value.
        max: u32,
    },

    /// Integer width outside the supported range.
    #[error("Invalid integer width {width}: must be within [1, 4]")]
    InvalidWidth {
        /// Requested width in bytes.
        width: usize,
    },

    /// Buffer range does not fit the destination.
    #[error("Buffer range {offset}+{length} exceeds capacity {capacity}")]
    OutOfBounds {
        /// Start offset.
        offset: usize,
        /// Requested length.
        length: usize,
        /// Capacity of the buffer.
        capacity: usize,
    },

    /// Cache block size below the permitted minimum.
    #[error("Block size {size} is below the minimum of {minimum} bytes")]
    InvalidBlockSize {
        /// Requested block size.
        size: usize,
        /// Minimum block size.
        minimum: usize,
    },

    /// Operation on a closed stream.
    #[error("Stream is closed")]
    Closed,

    /// Malformed modified UTF-8 data.
    #[error("Malformed UTF data at offset {offset}: {message}")]
    MalformedUtf {
        /// Stream offset where the malformed data starts.
        offset: u64,
        /// Description of the problem.
        message: String,
    },

    /// Malformed rule definition.
    #[error("Invalid rule: {message}")]
    InvalidRule {
        /// Description of the rule error.
        message: String,
    },

    /// Matcher type tag with no registered factory.
    #[error("Unknown matcher type: {tag}")]
    UnknownMatcher {
        /// The unresolved type tag.
        tag: String,
    },

    /// Rule database could not be parsed.
    #[error("Rule database error: {message}")]
    RuleDatabase {
        /// Description of the parse failure.
        message: String,
    },

    /// Encoding error (unknown charset, unmappable character).
    #[error("Encoding error: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },
}

/// Result type alias for OxiMagic operations.
pub type Result<T> = std::result::Result<T, OxiMagicError>;

impl OxiMagicError {
    /// Create an unexpected end-of-data error.
    pub fn unexpected_eof(expected: usize) -> Self {
        Self::UnexpectedEof { expected }
    }

    /// Create a seek-before-flushed error.
    pub fn seek_before_flushed(position: u64, flushed: u64) -> Self {
        Self::SeekBeforeFlushed { position, flushed }
    }

    /// Create an invalid flush position error.
    pub fn invalid_flush_position(position: u64, flushed: u64, current: u64) -> Self {
        Self::InvalidFlushPosition {
            position,
            flushed,
            current,
        }
    }

    /// Create an invalid bit count error.
    pub fn invalid_bit_count(count: u32, max: u32) -> Self {
        Self::InvalidBitCount { count, max }
    }

    /// Create an invalid width error.
    pub fn invalid_width(width: usize) -> Self {
        Self::InvalidWidth { width }
    }

    /// Create an out-of-bounds error.
    pub fn out_of_bounds(offset: usize, length: usize, capacity: usize) -> Self {
        Self::OutOfBounds {
            offset,
            length,
            capacity,
        }
    }

    /// Create an invalid block size error.
    pub fn invalid_block_size(size: usize, minimum: usize) -> Self {
        Self::InvalidBlockSize { size, minimum }
    }

    /// Create a malformed UTF error.
    pub fn malformed_utf(offset: u64, message: impl Into<String>) -> Self {
        Self::MalformedUtf {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid rule error.
    pub fn invalid_rule(message: impl Into<String>) -> Self {
        Self::InvalidRule {
            message: message.into(),
        }
    }

    /// Create an unknown matcher error.
    pub fn unknown_matcher(tag: impl Into<String>) -> Self {
        Self::UnknownMatcher { tag: tag.into() }
    }

    /// Create a rule database error.
    pub fn rule_database(message: impl Into<String>) -> Self {
        Self::RuleDatabase {
            message: message.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Whether this error is a violation of the stream contract.
    ///
    /// Contract violations are caller bugs and must never be downgraded to a
    /// non-match by the rule engine.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::SeekBeforeFlushed { .. }
                | Self::InvalidFlushPosition { .. }
                | Self::InvalidBitCount { .. }
                | Self::InvalidWidth { .. }
                | Self::OutOfBounds { .. }
                | Self::Closed
        )
    }

    /// Whether this error was caused by running out of data.
    pub fn is_eof(&self) -> bool {
        match self {
            Self::UnexpectedEof { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
