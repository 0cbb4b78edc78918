//! Character encodings for string and regexp matchers.
//!
//! `encoding_rs` follows the WHATWG Encoding Standard, which maps the
//! `ISO-8859-1` label to windows-1252 and has no UTF-16 encoder. Rule
//! patterns expect byte-exact Latin-1 and UTF-16, so those are handled here
//! and everything else is delegated.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use oximagic_core::error::{OxiMagicError, Result};
use std::fmt;

/// A character encoding.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// 7-bit ASCII.
    Ascii,
    /// ISO-8859-1: code points U+0000..=U+00FF map to single bytes.
    #[default]
    Latin1,
    /// UTF-16, big-endian, no BOM.
    Utf16Be,
    /// UTF-16, little-endian, no BOM.
    Utf16Le,
    /// Any other WHATWG encoding.
    Other(&'static Encoding),
}

impl Charset {
    /// Look up a charset by label.
    pub fn for_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        let charset = match normalized.as_str() {
            "ascii" | "us-ascii" | "iso646-us" => Self::Ascii,
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" | "latin1" | "latin-1" | "l1" => Self::Latin1,
            _ => match Encoding::for_label(normalized.as_bytes()) {
                Some(encoding) if encoding == UTF_16BE => Self::Utf16Be,
                Some(encoding) if encoding == UTF_16LE => Self::Utf16Le,
                Some(encoding) => Self::Other(encoding),
                None => {
                    return Err(OxiMagicError::encoding_error(format!(
                        "unknown charset '{label}'"
                    )));
                }
            },
        };
        Ok(charset)
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ascii => "US-ASCII",
            Self::Latin1 => "ISO-8859-1",
            Self::Utf16Be => "UTF-16BE",
            Self::Utf16Le => "UTF-16LE",
            Self::Other(encoding) => encoding.name(),
        }
    }

    /// Encode `text`, failing on characters the charset cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Self::Ascii => self.encode_narrow(text, 0x7F),
            Self::Latin1 => self.encode_narrow(text, 0xFF),
            Self::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Self::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Self::Other(encoding) => {
                let (bytes, used, unmappable) = encoding.encode(text);
                if unmappable || used != *encoding {
                    return Err(OxiMagicError::encoding_error(format!(
                        "'{text}' is not representable in {}",
                        encoding.name()
                    )));
                }
                Ok(bytes.into_owned())
            }
        }
    }

    fn encode_narrow(&self, text: &str, max: u32) -> Result<Vec<u8>> {
        text.chars()
            .map(|c| {
                let code = c as u32;
                if code <= max {
                    Ok(code as u8)
                } else {
                    Err(OxiMagicError::encoding_error(format!(
                        "character U+{code:04X} is not representable in {}",
                        self.name()
                    )))
                }
            })
            .collect()
    }

    /// Decode `bytes`, substituting U+FFFD for malformed input.
    ///
    /// Byte order marks are not interpreted.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b < 0x80 { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Self::Utf16Be => UTF_16BE.decode_without_bom_handling(bytes).0.into_owned(),
            Self::Utf16Le => UTF_16LE.decode_without_bom_handling(bytes).0.into_owned(),
            Self::Other(encoding) => encoding.decode_without_bom_handling(bytes).0.into_owned(),
        }
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
