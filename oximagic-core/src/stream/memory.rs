//! Memory-cached stream over a forward-only source.
//!
//! Data is pulled from the source on demand and kept in a list of
//! fixed-size blocks, so earlier positions can be revisited without touching
//! the source again. Blocks lying wholly below the flush watermark are
//! released.

use super::{SeekableStream, StreamState};
use crate::config::StreamConfig;
use crate::error::{OxiMagicError, Result};
use std::collections::VecDeque;
use std::io::{self, Read};

/// A [`SeekableStream`] caching a forward-only [`Read`] source in memory.
#[derive(Debug)]
pub struct MemoryCachingStream<R: Read> {
    state: StreamState,
    /// Remaining source; `None` once exhausted or closed.
    source: Option<R>,
    /// Cached blocks; `blocks[0]` holds block number `first_block`.
    blocks: VecDeque<Box<[u8]>>,
    /// Block number of the first retained block.
    first_block: u64,
    block_size: usize,
    /// Number of bytes pulled from the source so far.
    cached: u64,
    /// Total length, known once the source is exhausted.
    length: Option<u64>,
}

impl<R: Read> MemoryCachingStream<R> {
    /// Wrap `source` with the default block size.
    pub fn new(source: R) -> Self {
        Self::with_block_size_unchecked(source, StreamConfig::DEFAULT_BLOCK_SIZE)
    }

    /// Wrap `source` with a configured block size.
    pub fn with_config(source: R, config: &StreamConfig) -> Result<Self> {
        Self::with_block_size(source, config.block_size)
    }

    /// Wrap `source` caching in blocks of `block_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`OxiMagicError::InvalidBlockSize`] below
    /// [`StreamConfig::MIN_BLOCK_SIZE`].
    pub fn with_block_size(source: R, block_size: usize) -> Result<Self> {
        if block_size < StreamConfig::MIN_BLOCK_SIZE {
            return Err(OxiMagicError::invalid_block_size(
                block_size,
                StreamConfig::MIN_BLOCK_SIZE,
            ));
        }
        Ok(Self::with_block_size_unchecked(source, block_size))
    }

    pub(crate) fn with_block_size_unchecked(source: R, block_size: usize) -> Self {
        debug_assert!(block_size > 0);
        Self {
            state: StreamState::new(),
            source: Some(source),
            blocks: VecDeque::new(),
            first_block: 0,
            block_size,
            cached: 0,
            length: None,
        }
    }

    /// Size of each cache block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks currently held in memory.
    pub fn cached_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Pull more data from the source into the cache.
    ///
    /// Tops up the last block, or allocates a new one when it is full.
    /// Returns `false` once the source is exhausted.
    fn fill(&mut self) -> Result<bool> {
        let Some(source) = self.source.as_mut() else {
            return Ok(false);
        };

        let in_block = (self.cached % self.block_size as u64) as usize;
        let block_number = self.cached / self.block_size as u64;
        if in_block == 0 {
            self.blocks
                .push_back(vec![0u8; self.block_size].into_boxed_slice());
        }
        let index = (block_number - self.first_block) as usize;
        let block = &mut self.blocks[index];

        let n = loop {
            match source.read(&mut block[in_block..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };

        if n == 0 {
            if in_block == 0 {
                self.blocks.pop_back();
            }
            self.source = None;
            self.length = Some(self.cached);
            return Ok(false);
        }
        self.cached += n as u64;
        Ok(true)
    }

    /// Fill until `target` bytes are cached or the source runs dry.
    ///
    /// Returns the number of bytes available, capped at `target`.
    fn load_through(&mut self, target: u64) -> Result<u64> {
        while self.cached < target {
            if !self.fill()? {
                break;
            }
        }
        Ok(self.cached.min(target))
    }

    fn locate(&self, position: u64) -> (usize, usize) {
        let block = position / self.block_size as u64;
        let index = (block - self.first_block) as usize;
        (index, (position % self.block_size as u64) as usize)
    }
}

impl MemoryCachingStream<io::Empty> {
    /// Wrap an in-memory buffer as a single, fully populated block.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let length = data.len() as u64;
        let mut blocks = VecDeque::new();
        let block_size = data.len().max(1);
        if !data.is_empty() {
            blocks.push_back(data.into_boxed_slice());
        }
        Self {
            state: StreamState::new(),
            source: None,
            blocks,
            first_block: 0,
            block_size,
            cached: length,
            length: Some(length),
        }
    }
}

impl<R: Read> SeekableStream for MemoryCachingStream<R> {
    fn state(&self) -> &StreamState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        self.state.ensure_open()?;
        self.state.realign();
        let position = self.state.position();
        if self.load_through(position.saturating_add(1))? <= position {
            return Ok(None);
        }
        let (index, offset) = self.locate(position);
        let byte = self.blocks[index][offset];
        self.state.advance(1);
        Ok(Some(byte))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.state.ensure_open()?;
        self.state.realign();
        if buf.is_empty() {
            return Ok(0);
        }
        let position = self.state.position();
        let available = self.load_through(position.saturating_add(buf.len() as u64))?;
        if available <= position {
            return Ok(0);
        }

        let total = (available - position) as usize;
        let mut copied = 0;
        while copied < total {
            let (index, offset) = self.locate(position + copied as u64);
            let block = &self.blocks[index];
            let n = (block.len() - offset).min(total - copied);
            buf[copied..copied + n].copy_from_slice(&block[offset..offset + n]);
            copied += n;
        }
        self.state.advance(copied as u64);
        Ok(copied)
    }

    fn length(&self) -> Option<u64> {
        self.length
    }

    fn flush_before(&mut self, position: u64) -> Result<()> {
        self.state.flush_before(position)?;
        // A partially filled last block is still being written by `fill`.
        let full_blocks = self.cached / self.block_size as u64;
        let keep_from = (position / self.block_size as u64).min(full_blocks);
        while self.first_block < keep_from && !self.blocks.is_empty() {
            self.blocks.pop_front();
            self.first_block += 1;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.blocks.clear();
        self.source = None;
        self.state.close();
        Ok(())
    }

    fn is_cached(&self) -> bool {
        true
    }

    fn is_cached_memory(&self) -> bool {
        true
    }

    fn is_cached_file(&self) -> bool {
        false
    }
}
