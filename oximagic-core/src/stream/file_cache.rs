//! File-cached stream over a forward-only source.

use super::file::read_retrying;
use super::{SeekableStream, StreamState};
use crate::config::StreamConfig;
use crate::error::{OxiMagicError, Result};
use crate::reaper::{Reaper, Reclaimable, Registration};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use tempfile::TempPath;

/// A [`SeekableStream`] spooling a forward-only [`Read`] source into a
/// temporary file.
///
/// Suited to large sources where a memory cache would grow without bound.
/// The temporary file is removed on [`close`](SeekableStream::close), or by
/// the [`Reaper`] if the stream is dropped without closing.
#[derive(Debug)]
pub struct FileCachingStream<R: Read> {
    state: StreamState,
    source: Option<R>,
    cache: Reclaimable<(File, TempPath)>,
    registration: Option<Registration>,
    chunk: Box<[u8]>,
    /// Bytes spooled to the cache file.
    cached: u64,
    length: Option<u64>,
}

impl<R: Read> FileCachingStream<R> {
    /// Wrap `source` with the default configuration.
    pub fn new(source: R, reaper: Arc<dyn Reaper>) -> Result<Self> {
        Self::with_config(source, reaper, &StreamConfig::DEFAULT)
    }

    /// Wrap `source`, pulling `config.block_size` bytes at a time.
    pub fn with_config(source: R, reaper: Arc<dyn Reaper>, config: &StreamConfig) -> Result<Self> {
        if config.block_size < StreamConfig::MIN_BLOCK_SIZE {
            return Err(OxiMagicError::invalid_block_size(
                config.block_size,
                StreamConfig::MIN_BLOCK_SIZE,
            ));
        }
        let (file, path) = tempfile::Builder::new()
            .prefix("oximagic-")
            .tempfile()?
            .into_parts();
        tracing::debug!(path = %path.display(), "spooling stream to cache file");

        let cache = Reclaimable::new((file, path));
        let registration = Registration::new(
            reaper,
            cache.cleanup(|(file, path)| {
                drop(file);
                path.close()
            }),
        );
        Ok(Self {
            state: StreamState::new(),
            source: Some(source),
            cache,
            registration: Some(registration),
            chunk: vec![0u8; config.block_size].into_boxed_slice(),
            cached: 0,
            length: None,
        })
    }

    /// Spool from the source until `target` bytes are cached or it runs dry.
    fn load_through(&mut self, target: u64) -> Result<u64> {
        while self.cached < target {
            let Some(source) = self.source.as_mut() else {
                break;
            };
            let n = read_retrying(source, &mut self.chunk)?;
            if n == 0 {
                self.source = None;
                self.length = Some(self.cached);
                break;
            }
            let (offset, chunk) = (self.cached, &self.chunk[..n]);
            self.cache.with(|(file, _)| {
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(chunk)
            })??;
            self.cached += n as u64;
        }
        Ok(self.cached.min(target))
    }
}

impl<R: Read> SeekableStream for FileCachingStream<R> {
    fn state(&self) -> &StreamState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
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
        let wanted = (available - position) as usize;
        let n = self.cache.with(|(file, _)| {
            file.seek(SeekFrom::Start(position))?;
            read_retrying(file, &mut buf[..wanted])
        })??;
        self.state.advance(n as u64);
        Ok(n)
    }

    fn length(&self) -> Option<u64> {
        self.length
    }

    fn close(&mut self) -> Result<()> {
        if let Some(cleanup) = self.registration.take().and_then(Registration::cancel) {
            if let Err(e) = cleanup() {
                tracing::warn!(error = %e, "failed to remove stream cache file");
            }
        }
        self.source = None;
        self.state.close();
        Ok(())
    }

    fn is_cached(&self) -> bool {
        true
    }

    fn is_cached_memory(&self) -> bool {
        false
    }

    fn is_cached_file(&self) -> bool {
        true
    }
}
