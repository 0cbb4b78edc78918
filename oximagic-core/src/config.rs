//! Stream configuration.

/// Tuning parameters for the stream implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Block size of [`MemoryCachingStream`](crate::stream::MemoryCachingStream)
    /// and [`FileCachingStream`](crate::stream::FileCachingStream).
    pub block_size: usize,
    /// Read-ahead window of
    /// [`RandomAccessFileStream`](crate::stream::RandomAccessFileStream).
    pub read_ahead: usize,
}

impl StreamConfig {
    /// Smallest block size accepted by the public constructors.
    pub const MIN_BLOCK_SIZE: usize = 1024;

    /// Default cache block size (8 KB).
    pub const DEFAULT_BLOCK_SIZE: usize = 8192;

    /// Default read-ahead window (32 bytes).
    pub const DEFAULT_READ_AHEAD: usize = 32;

    /// Default configuration.
    pub const DEFAULT: Self = Self {
        block_size: Self::DEFAULT_BLOCK_SIZE,
        read_ahead: Self::DEFAULT_READ_AHEAD,
    };

    /// Create a configuration with explicit values.
    pub fn new(block_size: usize, read_ahead: usize) -> Self {
        Self {
            block_size,
            read_ahead,
        }
    }

    /// Replace the cache block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Replace the read-ahead window.
    pub fn with_read_ahead(mut self, read_ahead: usize) -> Self {
        self.read_ahead = read_ahead;
        self
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
