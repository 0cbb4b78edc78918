//! C-style escape decoding for string patterns.

use oximagic_core::error::{OxiMagicError, Result};

/// Decode the escapes in a human-authored pattern.
///
/// Supported: `\n \r \t \b \f \\ \xHH \oOO \uHHHH`. `\o` takes one to three
/// octal digits, `\x` exactly two hex digits and `\u` exactly four. Any other
/// escape, or a trailing backslash, is an error.
pub fn unescape(pattern: &str) -> Result<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escape = chars
            .next()
            .ok_or_else(|| invalid(pattern, "trailing backslash"))?;
        let decoded = match escape {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '\\' => '\\',
            'x' => {
                let digits: String = chars.by_ref().take(2).collect();
                code_point(pattern, &digits, 16, 2)?
            }
            'u' => {
                let digits: String = chars.by_ref().take(4).collect();
                code_point(pattern, &digits, 16, 4)?
            }
            'o' => {
                let mut digits = String::new();
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if digits.is_empty() {
                    return Err(invalid(pattern, "\\o needs octal digits"));
                }
                code_point(pattern, &digits, 8, digits.len())?
            }
            other => return Err(invalid(pattern, &format!("unknown escape '\\{other}'"))),
        };
        out.push(decoded);
    }

    Ok(out)
}

fn code_point(pattern: &str, digits: &str, radix: u32, expected: usize) -> Result<char> {
    if digits.chars().count() != expected {
        return Err(invalid(pattern, &format!("expected {expected} digits after escape")));
    }
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| invalid(pattern, &format!("invalid escape digits '{digits}'")))
}

fn invalid(pattern: &str, reason: &str) -> OxiMagicError {
    OxiMagicError::invalid_rule(format!("pattern '{pattern}': {reason}"))
}
