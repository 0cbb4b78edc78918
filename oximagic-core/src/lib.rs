//! # OxiMagic Core
//!
//! Core components for the OxiMagic content identification engine.
//!
//! This crate provides the byte-level building blocks the rule engine reads
//! through:
//!
//! - [`stream`]: Random-access streams with bit cursor, mark/reset and flush watermark
//! - [`endian`]: Byte order and multi-width primitive decoding
//! - [`reaper`]: Background release of abandoned resources
//! - [`config`]: Stream tuning parameters
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! OxiMagic is designed as a layered stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Front end                                           │
//! │     CLI, Analyzer façade                               │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Rule engine                                         │
//! │     RuleNode tree, matchers, actions, registry         │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Streams (this crate)                                │
//! │     SeekableStream, caching adapters, ResourceReaper   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oximagic_core::stream::{MemoryCachingStream, SeekableStream};
//! use std::io::Cursor;
//!
//! // A forward-only source becomes seekable.
//! let mut stream = MemoryCachingStream::new(Cursor::new(b"%PDF-1.4".to_vec()));
//! stream.seek(1).unwrap();
//! let mut magic = [0u8; 3];
//! stream.read_fully(&mut magic).unwrap();
//! assert_eq!(&magic, b"PDF");
//!
//! // Backward seeks are served from the cache.
//! stream.seek(0).unwrap();
//! assert_eq!(stream.read_u8().unwrap(), b'%');
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod endian;
pub mod error;
pub mod reaper;
pub mod stream;

// Re-exports for convenience
pub use config::StreamConfig;
pub use endian::{ByteOrder, Primitive};
pub use error::{OxiMagicError, Result};
pub use reaper::{NoopReaper, Reaper, Reclaimable, Registration, ResourceReaper};
pub use stream::{
    FileCachingStream, MemoryCachingStream, RandomAccessFileStream, SeekableStream, StreamState,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::endian::ByteOrder;
    pub use crate::error::{OxiMagicError, Result};
    pub use crate::reaper::{Reaper, ResourceReaper};
    pub use crate::stream::{
        FileCachingStream, MemoryCachingStream, RandomAccessFileStream, SeekableStream,
    };
}
