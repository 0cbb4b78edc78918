//! Stream positioning strategies.

use oximagic_core::error::Result;
use oximagic_core::stream::SeekableStream;
use std::fmt;

/// Positions the stream before a matcher reads.
pub trait Location: fmt::Debug + Send + Sync {
    /// Seek `stream` to where the matcher should start reading.
    fn locate(&self, stream: &mut dyn SeekableStream) -> Result<()>;
}

/// Fixed offset from the start of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbsoluteOffset(pub u64);

impl AbsoluteOffset {
    /// The offset.
    pub fn offset(self) -> u64 {
        self.0
    }
}

impl Location for AbsoluteOffset {
    fn locate(&self, stream: &mut dyn SeekableStream) -> Result<()> {
        stream.seek(self.0)
    }
}

impl fmt::Display for AbsoluteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oximagic_core::stream::MemoryCachingStream;

    #[test]
    fn test_absolute_offset() {
        let mut stream = MemoryCachingStream::from_bytes(b"0123456789".to_vec());
        stream.seek(7).unwrap();
        AbsoluteOffset(2).locate(&mut stream).unwrap();
        assert_eq!(stream.read_u8().unwrap(), b'2');
    }

    #[test]
    fn test_offset_below_watermark_is_contract_violation() {
        let mut stream = MemoryCachingStream::from_bytes(b"0123456789".to_vec());
        stream.seek(5).unwrap();
        stream.flush().unwrap();
        let err = AbsoluteOffset(0).locate(&mut stream).unwrap_err();
        assert!(err.is_contract_violation());
    }
}
