//! Random-access byte streams with a bit-level cursor.
//!
//! A [`SeekableStream`] presents any byte source as if it were fully
//! seekable. Implementations only supply raw byte reads over their backing
//! store and hand out their [`StreamState`]; everything else (bit reads,
//! byte-order aware numeric reads, mark/reset, the flush watermark, line and
//! modified UTF-8 reads) is provided by the trait.
//!
//! Three implementations are available:
//!
//! - [`MemoryCachingStream`]: forward-only source, lazily cached in memory blocks
//! - [`FileCachingStream`]: forward-only source, spooled to a temporary file
//! - [`RandomAccessFileStream`]: local file with a small read-ahead window
//!
//! # Bit Ordering
//!
//! Bit reads are MSB-first: the first bit returned by
//! [`read_bit`](SeekableStream::read_bit) is the most significant bit of the
//! byte at the current position.
//!
//! # Example
//!
//! ```
//! use oximagic_core::endian::ByteOrder;
//! use oximagic_core::stream::{MemoryCachingStream, SeekableStream};
//!
//! let mut stream = MemoryCachingStream::from_bytes(vec![0xB4, 0x12, 0x34]);
//! assert_eq!(stream.read_bits(3).unwrap(), 0b101);
//! assert_eq!(stream.read_bits(5).unwrap(), 0b10100);
//!
//! stream.set_byte_order(ByteOrder::LittleEndian);
//! assert_eq!(stream.read_u16().unwrap(), 0x3412);
//! ```

mod file;
mod file_cache;
mod memory;

pub use file::RandomAccessFileStream;
pub use file_cache::FileCachingStream;
pub use memory::MemoryCachingStream;

use crate::endian::{self, ByteOrder, Primitive};
use crate::error::{OxiMagicError, Result};
use std::io;

/// Cursor, watermark and mark stack shared by every stream implementation.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Absolute byte position.
    position: u64,
    /// Bit offset within the current byte (0-7).
    bit_offset: u8,
    /// Earliest position that may still be sought to.
    flushed: u64,
    /// Saved `(position, bit_offset)` pairs.
    marks: Vec<(u64, u8)>,
    /// Order used by multi-byte reads.
    byte_order: ByteOrder,
    /// Whether the stream has been closed.
    closed: bool,
}

impl StreamState {
    /// Create a state positioned at the start of the stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current byte position.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Current bit offset within the byte at [`position`](Self::position).
    #[inline]
    pub fn bit_offset(&self) -> u8 {
        self.bit_offset
    }

    /// Current flush watermark.
    #[inline]
    pub fn flushed_position(&self) -> u64 {
        self.flushed
    }

    /// Byte order used by multi-byte reads.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Set the byte order used by multi-byte reads.
    #[inline]
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.byte_order = order;
    }

    /// Whether the stream has been closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Fail with [`OxiMagicError::Closed`] once the stream is closed.
    #[inline]
    pub fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(OxiMagicError::Closed)
        } else {
            Ok(())
        }
    }

    /// Record a byte-level read of `count` bytes.
    ///
    /// Byte-level reads always realign the bit cursor.
    #[inline]
    pub fn advance(&mut self, count: u64) {
        self.position += count;
        self.bit_offset = 0;
    }

    /// Drop any partial-byte progress without moving.
    ///
    /// Called at the start of every byte-level read, including ones that
    /// return no data.
    #[inline]
    pub fn realign(&mut self) {
        self.bit_offset = 0;
    }

    /// Reposition to `position`, resetting the bit offset.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.ensure_open()?;
        if position < self.flushed {
            return Err(OxiMagicError::seek_before_flushed(position, self.flushed));
        }
        self.position = position;
        self.bit_offset = 0;
        Ok(())
    }

    /// Set the bit offset within the current byte.
    pub fn set_bit_offset(&mut self, bit_offset: u8) -> Result<()> {
        self.ensure_open()?;
        if bit_offset > 7 {
            return Err(OxiMagicError::invalid_bit_count(bit_offset as u32, 7));
        }
        self.bit_offset = bit_offset;
        Ok(())
    }

    /// Push the current `(position, bit_offset)` onto the mark stack.
    pub fn push_mark(&mut self) {
        self.marks.push((self.position, self.bit_offset));
    }

    /// Pop the most recent mark.
    pub fn pop_mark(&mut self) -> Option<(u64, u8)> {
        self.marks.pop()
    }

    /// Raise the flush watermark to `position`.
    ///
    /// The watermark never moves backwards and never passes the current
    /// position.
    pub fn flush_before(&mut self, position: u64) -> Result<()> {
        self.ensure_open()?;
        if position < self.flushed || position > self.position {
            return Err(OxiMagicError::invalid_flush_position(
                position,
                self.flushed,
                self.position,
            ));
        }
        self.flushed = position;
        Ok(())
    }

    /// Mark the stream closed and drop any saved marks.
    pub fn close(&mut self) {
        self.closed = true;
        self.marks.clear();
    }
}

/// A random-access byte source with a bit cursor, byte order, mark stack and
/// flush watermark.
///
/// Implementors provide [`read_byte`](Self::read_byte) and
/// [`read`](Self::read) over their backing store; both read at
/// [`position`](Self::position) and must call [`StreamState::advance`] with
/// the number of bytes actually consumed.
///
/// A stream is not synchronized. Independent analyses must use independent
/// stream instances.
pub trait SeekableStream {
    /// Shared cursor state.
    fn state(&self) -> &StreamState;

    /// Mutable shared cursor state.
    fn state_mut(&mut self) -> &mut StreamState;

    /// Read one byte, or `None` at end of data.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns the number of bytes read; `0` for a non-empty buffer means end
    /// of data.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Total length in bytes, if known.
    fn length(&self) -> Option<u64> {
        None
    }

    /// Reposition the stream.
    ///
    /// Seeking past the end is allowed; only a later read reports end of data.
    fn seek(&mut self, position: u64) -> Result<()> {
        self.state_mut().seek(position)
    }

    /// Raise the flush watermark to `position`.
    fn flush_before(&mut self, position: u64) -> Result<()> {
        self.state_mut().flush_before(position)
    }

    /// Release the backing resource.
    fn close(&mut self) -> Result<()> {
        self.state_mut().close();
        Ok(())
    }

    /// Whether data is cached so that backward seeks are cheap.
    fn is_cached(&self) -> bool {
        false
    }

    /// Whether the cache lives in main memory.
    fn is_cached_memory(&self) -> bool {
        false
    }

    /// Whether the cache lives in a temporary file.
    fn is_cached_file(&self) -> bool {
        false
    }

    /// Current byte position.
    fn position(&self) -> u64 {
        self.state().position()
    }

    /// Current bit offset (0-7).
    fn bit_offset(&self) -> u8 {
        self.state().bit_offset()
    }

    /// Set the bit offset (0-7) within the current byte.
    fn set_bit_offset(&mut self, bit_offset: u8) -> Result<()> {
        self.state_mut().set_bit_offset(bit_offset)
    }

    /// Current flush watermark.
    fn flushed_position(&self) -> u64 {
        self.state().flushed_position()
    }

    /// Byte order used by multi-byte reads.
    fn byte_order(&self) -> ByteOrder {
        self.state().byte_order()
    }

    /// Set the byte order used by multi-byte reads.
    fn set_byte_order(&mut self, order: ByteOrder) {
        self.state_mut().set_byte_order(order);
    }

    /// Raise the flush watermark to the current position.
    fn flush(&mut self) -> Result<()> {
        let position = self.position();
        self.flush_before(position)
    }

    /// Save the current position and bit offset.
    fn mark(&mut self) {
        self.state_mut().push_mark();
    }

    /// Restore the most recent mark. A no-op when no mark is saved.
    fn reset(&mut self) -> Result<()> {
        let Some((position, bit_offset)) = self.state_mut().pop_mark() else {
            return Ok(());
        };
        if position < self.flushed_position() {
            return Err(OxiMagicError::seek_before_flushed(
                position,
                self.flushed_position(),
            ));
        }
        self.seek(position)?;
        self.state_mut().set_bit_offset(bit_offset)
    }

    /// Read up to `length` bytes into `buf[offset..offset + length]`.
    fn read_into(&mut self, buf: &mut [u8], offset: usize, length: usize) -> Result<usize> {
        let end = check_range(buf.len(), offset, length)?;
        if length == 0 {
            return Ok(0);
        }
        self.read(&mut buf[offset..end])
    }

    /// Fill `buf` completely or fail with end of data.
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(OxiMagicError::unexpected_eof(buf.len() - filled));
            }
            filled += n;
        }
        Ok(())
    }

    /// Fill `buf[offset..offset + length]` completely or fail with end of data.
    fn read_fully_into(&mut self, buf: &mut [u8], offset: usize, length: usize) -> Result<()> {
        let end = check_range(buf.len(), offset, length)?;
        self.read_fully(&mut buf[offset..end])
    }

    /// Read a single bit.
    fn read_bit(&mut self) -> Result<u8> {
        let new_bit_offset = (self.bit_offset() + 1) & 7;
        let mut value = self
            .read_byte()?
            .ok_or_else(|| OxiMagicError::unexpected_eof(1))?;
        if new_bit_offset != 0 {
            // Stay on this byte until all eight bits are consumed.
            let position = self.position();
            self.seek(position - 1)?;
            value >>= 8 - new_bit_offset;
        }
        self.state_mut().set_bit_offset(new_bit_offset)?;
        Ok(value & 1)
    }

    /// Read `count` bits (0-64), first bit in the most significant position.
    fn read_bits(&mut self, count: u32) -> Result<u64> {
        if count > 64 {
            return Err(OxiMagicError::invalid_bit_count(count, 64));
        }
        if count == 0 {
            return Ok(0);
        }

        let bit_offset = self.bit_offset() as i32;
        let mut bits_to_read = count as i32 + bit_offset;
        let new_bit_offset = ((bit_offset + count as i32) & 7) as u8;

        // Up to 71 bits are touched when a 64-bit read starts mid-byte.
        let mut accum: u128 = 0;
        while bits_to_read > 0 {
            let byte = self
                .read_byte()?
                .ok_or_else(|| OxiMagicError::unexpected_eof(1))?;
            accum = (accum << 8) | byte as u128;
            bits_to_read -= 8;
        }

        if new_bit_offset != 0 {
            let position = self.position();
            self.seek(position - 1)?;
        }
        self.state_mut().set_bit_offset(new_bit_offset)?;

        accum >>= (-bits_to_read) as u32;
        let mask = if count == 64 {
            u64::MAX
        } else {
            (1u64 << count) - 1
        };
        Ok(accum as u64 & mask)
    }

    /// Read one byte as a boolean (non-zero is `true`).
    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read an unsigned byte.
    fn read_u8(&mut self) -> Result<u8> {
        self.read_byte()?
            .ok_or_else(|| OxiMagicError::unexpected_eof(1))
    }

    /// Read a signed byte.
    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read an unsigned 16-bit value (also used for UTF-16 code units).
    fn read_u16(&mut self) -> Result<u16> {
        read_primitive(self)
    }

    /// Read a signed 16-bit value.
    fn read_i16(&mut self) -> Result<i16> {
        read_primitive(self)
    }

    /// Read an unsigned 32-bit value.
    fn read_u32(&mut self) -> Result<u32> {
        read_primitive(self)
    }

    /// Read a signed 32-bit value.
    fn read_i32(&mut self) -> Result<i32> {
        read_primitive(self)
    }

    /// Read an unsigned 64-bit value.
    fn read_u64(&mut self) -> Result<u64> {
        read_primitive(self)
    }

    /// Read a signed 64-bit value.
    fn read_i64(&mut self) -> Result<i64> {
        read_primitive(self)
    }

    /// Read an IEEE 754 single precision value.
    fn read_f32(&mut self) -> Result<f32> {
        read_primitive(self)
    }

    /// Read an IEEE 754 double precision value.
    fn read_f64(&mut self) -> Result<f64> {
        read_primitive(self)
    }

    /// Read a `width`-byte (1-4) unsigned integer.
    fn read_unsigned(&mut self, width: usize) -> Result<u32> {
        if width == 0 || width > 4 {
            return Err(OxiMagicError::invalid_width(width));
        }
        let mut raw = [0u8; 4];
        self.read_fully(&mut raw[..width])?;
        endian::assemble_unsigned(&raw[..width], self.byte_order())
    }

    /// Read a `width`-byte (1-4) two's complement integer.
    fn read_signed(&mut self, width: usize) -> Result<i32> {
        let raw = self.read_unsigned(width)?;
        Ok(endian::sign_extend(raw, width))
    }

    /// Fill `dst` with UTF-16 code units.
    fn read_fully_u16(&mut self, dst: &mut [u16]) -> Result<()> {
        read_elements(self, dst)
    }

    /// Fill `dst` with signed 16-bit values.
    fn read_fully_i16(&mut self, dst: &mut [i16]) -> Result<()> {
        read_elements(self, dst)
    }

    /// Fill `dst` with signed 32-bit values.
    fn read_fully_i32(&mut self, dst: &mut [i32]) -> Result<()> {
        read_elements(self, dst)
    }

    /// Fill `dst` with signed 64-bit values.
    fn read_fully_i64(&mut self, dst: &mut [i64]) -> Result<()> {
        read_elements(self, dst)
    }

    /// Fill `dst` with single precision values.
    fn read_fully_f32(&mut self, dst: &mut [f32]) -> Result<()> {
        read_elements(self, dst)
    }

    /// Fill `dst` with double precision values.
    fn read_fully_f64(&mut self, dst: &mut [f64]) -> Result<()> {
        read_elements(self, dst)
    }

    /// Read a line of Latin-1 text.
    ///
    /// CR, LF and CRLF all terminate a line and are not returned. Returns
    /// `None` only when end of data is reached before any character.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let mut hit_eof = false;
        loop {
            match self.read_byte()? {
                None => {
                    hit_eof = true;
                    break;
                }
                Some(b'\n') => break,
                Some(b'\r') => {
                    let after_cr = self.position();
                    if self.read_byte()? != Some(b'\n') {
                        self.seek(after_cr)?;
                    }
                    break;
                }
                Some(byte) => line.push(char::from(byte)),
            }
        }
        if hit_eof && line.is_empty() {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Read a length-prefixed modified UTF-8 string.
    ///
    /// The length prefix is always big-endian; the configured byte order is
    /// restored afterwards, also on failure. Malformed byte sequences are an
    /// error. Unpaired UTF-16 surrogates are well-formed in this encoding but
    /// cannot be held by a `String`, so each one decodes to U+FFFD.
    fn read_utf(&mut self) -> Result<String> {
        let saved = self.byte_order();
        self.set_byte_order(ByteOrder::BigEndian);
        let result = read_modified_utf8(self);
        self.set_byte_order(saved);
        result
    }

    /// Move forward (or backward) by `count` bytes, returning the actual delta.
    fn skip_bytes(&mut self, count: i64) -> Result<i64> {
        let start = self.position();
        let target = start.checked_add_signed(count).ok_or_else(|| {
            OxiMagicError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot skip {count} bytes from position {start}"),
            ))
        })?;
        self.seek(target)?;
        Ok(signed_delta(start, self.position()))
    }
}

/// `end - start` as an `i64`, saturating at the type's bounds.
fn signed_delta(start: u64, end: u64) -> i64 {
    if end >= start {
        i64::try_from(end - start).unwrap_or(i64::MAX)
    } else {
        i64::try_from(start - end).map_or(i64::MIN, |delta| -delta)
    }
}

/// Validate `offset..offset + length` against a buffer of `capacity` bytes.
fn check_range(capacity: usize, offset: usize, length: usize) -> Result<usize> {
    match offset.checked_add(length) {
        Some(end) if end <= capacity => Ok(end),
        _ => Err(OxiMagicError::out_of_bounds(offset, length, capacity)),
    }
}

fn read_primitive<S, T>(stream: &mut S) -> Result<T>
where
    S: SeekableStream + ?Sized,
    T: Primitive,
{
    let mut raw = [0u8; 8];
    stream.read_fully(&mut raw[..T::SIZE])?;
    Ok(T::decode(&raw[..T::SIZE], stream.byte_order()))
}

/// Bytes staged per chunk by the array reads.
const ELEMENT_CHUNK: usize = 4096;

fn read_elements<S, T>(stream: &mut S, dst: &mut [T]) -> Result<()>
where
    S: SeekableStream + ?Sized,
    T: Primitive,
{
    let order = stream.byte_order();
    let mut raw = [0u8; ELEMENT_CHUNK];
    for chunk in dst.chunks_mut(ELEMENT_CHUNK / T::SIZE) {
        let bytes = &mut raw[..chunk.len() * T::SIZE];
        stream.read_fully(bytes)?;
        for (value, encoded) in chunk.iter_mut().zip(bytes.chunks_exact(T::SIZE)) {
            *value = T::decode(encoded, order);
        }
    }
    Ok(())
}

fn read_modified_utf8<S: SeekableStream + ?Sized>(stream: &mut S) -> Result<String> {
    let length = stream.read_u16()? as usize;
    let start = stream.position();
    let mut bytes = vec![0u8; length];
    stream.read_fully(&mut bytes)?;

    let malformed = |index: usize, message: &str| {
        OxiMagicError::malformed_utf(start + index as u64, message.to_string())
    };
    let continuation = |index: usize| -> Result<u16> {
        match bytes.get(index) {
            Some(&b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
            Some(_) => Err(malformed(index, "bad continuation byte")),
            None => Err(malformed(index, "truncated multi-byte sequence")),
        }
    };

    let mut units = Vec::with_capacity(length);
    let mut i = 0;
    while i < length {
        let lead = bytes[i];
        match lead >> 4 {
            0..=7 => {
                units.push(lead as u16);
                i += 1;
            }
            12 | 13 => {
                let unit = ((lead & 0x1F) as u16) << 6 | continuation(i + 1)?;
                units.push(unit);
                i += 2;
            }
            14 => {
                let unit = ((lead & 0x0F) as u16) << 12
                    | continuation(i + 1)? << 6
                    | continuation(i + 2)?;
                units.push(unit);
                i += 3;
            }
            _ => return Err(malformed(i, "invalid lead byte")),
        }
    }

    Ok(String::from_utf16_lossy(&units))
}
