//! Probe command implementation.

use oximagic_core::endian::ByteOrder;
use oximagic_core::error::Result;
use oximagic_core::reaper::ResourceReaper;
use oximagic_core::stream::{RandomAccessFileStream, SeekableStream};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Value type read by `oximagic probe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// `bits:N`, 1 to 64 bits from the current bit offset.
    Bits(u32),
    /// Length-prefixed modified UTF-8.
    Utf,
    /// One line of 8-bit text.
    Line,
}

impl FromStr for ProbeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if let Some(count) = lower.strip_prefix("bits:") {
            let count: u32 = count
                .parse()
                .map_err(|_| format!("invalid bit count in '{s}'"))?;
            if !(1..=64).contains(&count) {
                return Err(format!("bit count must be between 1 and 64, got {count}"));
            }
            return Ok(Self::Bits(count));
        }
        Ok(match lower.as_str() {
            "u8" => Self::U8,
            "i8" => Self::I8,
            "u16" => Self::U16,
            "i16" => Self::I16,
            "u32" => Self::U32,
            "i32" => Self::I32,
            "u64" => Self::U64,
            "i64" => Self::I64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "utf" => Self::Utf,
            "line" => Self::Line,
            _ => return Err(format!("unknown value type '{s}'")),
        })
    }
}

impl fmt::Display for ProbeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "u8"),
            Self::I8 => write!(f, "i8"),
            Self::U16 => write!(f, "u16"),
            Self::I16 => write!(f, "i16"),
            Self::U32 => write!(f, "u32"),
            Self::I32 => write!(f, "i32"),
            Self::U64 => write!(f, "u64"),
            Self::I64 => write!(f, "i64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::Bits(n) => write!(f, "bits:{n}"),
            Self::Utf => write!(f, "utf"),
            Self::Line => write!(f, "line"),
        }
    }
}

pub fn cmd_probe(
    file: &Path,
    offset: u64,
    kind: ProbeType,
    order: ByteOrder,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let reaper = ResourceReaper::spawn()?;
    let mut stream = RandomAccessFileStream::open(file, reaper.clone())?;

    let value = probe(&mut stream, offset, kind, order);
    stream.close()?;
    reaper.shutdown();

    println!("{}", value?);
    Ok(())
}

/// Read one `kind` value at `offset` and render it as text.
pub fn probe(
    stream: &mut dyn SeekableStream,
    offset: u64,
    kind: ProbeType,
    order: ByteOrder,
) -> Result<String> {
    stream.set_byte_order(order);
    stream.seek(offset)?;

    Ok(match kind {
        ProbeType::U8 => render_int(stream.read_u8()?),
        ProbeType::I8 => stream.read_i8()?.to_string(),
        ProbeType::U16 => render_int(stream.read_u16()?),
        ProbeType::I16 => stream.read_i16()?.to_string(),
        ProbeType::U32 => render_int(stream.read_u32()?),
        ProbeType::I32 => stream.read_i32()?.to_string(),
        ProbeType::U64 => render_int(stream.read_u64()?),
        ProbeType::I64 => stream.read_i64()?.to_string(),
        ProbeType::F32 => stream.read_f32()?.to_string(),
        ProbeType::F64 => stream.read_f64()?.to_string(),
        ProbeType::Bits(count) => {
            let bits = stream.read_bits(count)?;
            format!("{bits} ({bits:0width$b})", width = count as usize)
        }
        ProbeType::Utf => format!("{:?}", stream.read_utf()?),
        ProbeType::Line => match stream.read_line()? {
            Some(line) => format!("{line:?}"),
            None => "<end of stream>".to_string(),
        },
    })
}

fn render_int<T: fmt::Display + fmt::UpperHex>(value: T) -> String {
    format!("{value} (0x{value:X})")
}
