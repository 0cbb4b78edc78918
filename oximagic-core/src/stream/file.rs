//! Stream over a local random-access file.

use super::{SeekableStream, StreamState};
use crate::config::StreamConfig;
use crate::error::Result;
use crate::reaper::{Reaper, Reclaimable, Registration};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Read into `buf`, retrying on interruption.
pub(super) fn read_retrying<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Run `f` against the shared file handle.
fn file_io<T>(
    file: &Reclaimable<File>,
    f: impl FnOnce(&mut File) -> io::Result<T>,
) -> Result<T> {
    Ok(file.with(f)??)
}

/// A [`SeekableStream`] reading a local file through a small read-ahead
/// window.
///
/// Small reads are served from the window; a miss repositions the file
/// handle (only when its cursor disagrees with the logical position) and
/// refills the window. Reads at least as large as the window bypass it.
///
/// The handle is registered with a [`Reaper`] so it is released even if the
/// stream is dropped without [`close`](SeekableStream::close). There is no
/// internal locking: share a stream across threads only with external
/// synchronization.
#[derive(Debug)]
pub struct RandomAccessFileStream {
    state: StreamState,
    file: Reclaimable<File>,
    registration: Option<Registration>,
    /// Where the operating system cursor currently is, once known.
    file_position: Option<u64>,
    window: Box<[u8]>,
    window_start: u64,
    window_len: usize,
}

impl RandomAccessFileStream {
    /// Open `path` with the default read-ahead window.
    pub fn open<P: AsRef<Path>>(path: P, reaper: Arc<dyn Reaper>) -> Result<Self> {
        Self::open_with_config(path, reaper, &StreamConfig::DEFAULT)
    }

    /// Open `path` with a configured read-ahead window.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        reaper: Arc<dyn Reaper>,
        config: &StreamConfig,
    ) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::from_file(file, reaper, config.read_ahead))
    }

    /// Wrap an already open file positioned anywhere; reading starts at 0.
    pub fn from_file(file: File, reaper: Arc<dyn Reaper>, read_ahead: usize) -> Self {
        let file = Reclaimable::new(file);
        let registration = Registration::new(
            reaper,
            file.cleanup(|file| {
                drop(file);
                Ok(())
            }),
        );
        Self {
            state: StreamState::new(),
            file,
            registration: Some(registration),
            file_position: None,
            window: vec![0u8; read_ahead].into_boxed_slice(),
            window_start: 0,
            window_len: 0,
        }
    }

    /// Size of the read-ahead window.
    pub fn read_ahead(&self) -> usize {
        self.window.len()
    }

    fn reposition(&mut self, position: u64) -> Result<()> {
        if self.file_position != Some(position) {
            file_io(&self.file, |f| f.seek(SeekFrom::Start(position)))?;
            self.file_position = Some(position);
        }
        Ok(())
    }

    /// Whether `position` lies at or beyond the current end of file.
    ///
    /// Positions past the end never reach the operating system, which
    /// rejects offsets above `i64::MAX`.
    fn is_past_end(&self, position: u64) -> bool {
        self.length().is_some_and(|length| position >= length)
    }

    /// Copy whatever the window holds at `position` into `buf`.
    fn from_window(&self, position: u64, buf: &mut [u8]) -> usize {
        let window_end = self.window_start.saturating_add(self.window_len as u64);
        if position < self.window_start || position >= window_end {
            return 0;
        }
        let offset = (position - self.window_start) as usize;
        let n = (self.window_len - offset).min(buf.len());
        buf[..n].copy_from_slice(&self.window[offset..offset + n]);
        n
    }

    /// Refill the window starting at `position`. Returns the bytes loaded.
    fn refill(&mut self, position: u64) -> Result<usize> {
        self.reposition(position)?;
        let n = file_io(&self.file, |f| read_retrying(f, &mut self.window))?;
        self.file_position = Some(position + n as u64);
        self.window_start = position;
        self.window_len = n;
        Ok(n)
    }
}

impl SeekableStream for RandomAccessFileStream {
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
        let mut copied = self.from_window(position, buf);

        let next = position.saturating_add(copied as u64);
        if copied < buf.len() && !self.is_past_end(next) {
            let rest = &mut buf[copied..];
            if rest.len() >= self.window.len() {
                self.reposition(next)?;
                let n = file_io(&self.file, |f| read_retrying(f, rest))?;
                self.file_position = Some(next + n as u64);
                copied += n;
            } else if self.refill(next)? > 0 {
                copied += self.from_window(next, rest);
            }
        }

        self.state.advance(copied as u64);
        Ok(copied)
    }

    fn length(&self) -> Option<u64> {
        file_io(&self.file, |f| f.metadata().map(|m| m.len())).ok()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(cleanup) = self.registration.take().and_then(Registration::cancel) {
            if let Err(e) = cleanup() {
                tracing::warn!(error = %e, "failed to close file stream");
            }
        }
        drop(self.file.take());
        self.window_len = 0;
        self.state.close();
        Ok(())
    }
}
