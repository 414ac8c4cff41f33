//! Orbitfall Codec -- compact base-64 alphabet integer and array encoding.
//!
//! Replay logs and token seeds travel between client, verifier and storage as
//! short ASCII strings. Each non-negative integer is written in a fixed
//! 64-symbol alphabet, most-significant digit first, with no leading zero
//! digits. An array is the comma-joined sequence of its encoded elements.
//!
//! | digit value | symbols     |
//! |-------------|-------------|
//! | 0..=9       | `0`..=`9`   |
//! | 10..=35     | `A`..=`Z`   |
//! | 36..=61     | `a`..=`z`   |
//! | 62, 63      | `+`, `/`    |
//!
//! This is the literal on-wire and on-disk representation, so every
//! implementation must produce the same bytes for the same values.
//!
//! # Quick Start
//!
//! ```
//! use orbitfall_codec::{decode_int, decode_int_array, encode_int, encode_int_array};
//!
//! assert_eq!(encode_int(0), "0");
//! assert_eq!(encode_int(64), "10");
//! assert_eq!(decode_int("/").unwrap(), 63);
//!
//! let wire = encode_int_array(&[1, 4096, 7]);
//! assert_eq!(wire, "1,100,7");
//! assert_eq!(decode_int_array(&wire).unwrap(), vec![1, 4096, 7]);
//! ```

#![deny(unsafe_code)]

// ---------------------------------------------------------------------------
// Alphabet
// ---------------------------------------------------------------------------

/// The 64 digit symbols, indexed by digit value.
pub const ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz+/";

/// Separator between encoded array elements.
pub const SEPARATOR: char = ',';

/// Largest integer an `f64` input may carry without losing precision.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

const RADIX: u64 = 64;

/// Digit value of a symbol, or `None` if it is outside the alphabet.
fn digit_value(symbol: u8) -> Option<u64> {
    let value = match symbol {
        b'0'..=b'9' => symbol - b'0',
        b'A'..=b'Z' => symbol - b'A' + 10,
        b'a'..=b'z' => symbol - b'a' + 36,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(u64::from(value))
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the codec. Every variant is an invalid-input error:
/// the caller supplied something that is not a canonical encoding (or not an
/// encodable value) and must handle it, never silently correct it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// An empty string was given where a scalar was expected.
    #[error("invalid input: empty scalar at element {index}")]
    Empty { index: usize },

    /// A symbol outside the 64-symbol alphabet was found.
    #[error("invalid input: symbol {symbol:?} at offset {offset} is not in the alphabet")]
    InvalidSymbol { symbol: char, offset: usize },

    /// A multi-digit scalar started with the zero digit.
    #[error("invalid input: scalar {text:?} has a leading zero digit")]
    LeadingZero { text: String },

    /// The decoded value does not fit in a `u64`.
    #[error("invalid input: scalar {text:?} overflows 64 bits")]
    Overflow { text: String },

    /// A negative value was given to an encoder.
    #[error("invalid input: cannot encode negative value {0}")]
    Negative(i64),

    /// A non-integral, non-finite or out-of-range number was given to an encoder.
    #[error("invalid input: {0} is not a non-negative safe integer")]
    NotAnInteger(f64),
}

pub type Result<T> = std::result::Result<T, CodecError>;

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Encode a non-negative integer.
///
/// Digits are produced least-significant first by repeated division and
/// prepended, so the result reads most-significant first. Zero encodes as a
/// single `0` digit.
pub fn encode_int(mut value: u64) -> String {
    let mut digits = Vec::with_capacity(11);
    loop {
        digits.push(ALPHABET[(value % RADIX) as usize]);
        value /= RADIX;
        if value == 0 {
            break;
        }
    }
    digits.reverse();
    // Every byte comes from ALPHABET, which is ASCII.
    digits.into_iter().map(char::from).collect()
}

/// Encode a signed integer, rejecting negatives.
pub fn encode_i64(value: i64) -> Result<String> {
    u64::try_from(value)
        .map(encode_int)
        .map_err(|_| CodecError::Negative(value))
}

/// Encode a floating-point number that must hold a non-negative integer.
///
/// Rejects negative values, fractions, NaN/infinity and integers above
/// [`MAX_SAFE_INTEGER`].
pub fn encode_number(value: f64) -> Result<String> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > MAX_SAFE_INTEGER {
        return Err(CodecError::NotAnInteger(value));
    }
    Ok(encode_int(value as u64))
}

/// Decode a single scalar.
///
/// Reads most-significant first, accumulating `result * 64 + digit`. The
/// empty string, foreign symbols, leading zeros and 64-bit overflow are all
/// rejected.
pub fn decode_int(text: &str) -> Result<u64> {
    decode_element(text, 0, 0)
}

fn decode_element(text: &str, index: usize, base_offset: usize) -> Result<u64> {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return Err(CodecError::Empty { index });
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return Err(CodecError::LeadingZero {
            text: text.to_owned(),
        });
    }

    let mut result: u64 = 0;
    for (offset, ch) in text.char_indices() {
        let digit = u8::try_from(ch)
            .ok()
            .and_then(digit_value)
            .ok_or(CodecError::InvalidSymbol {
                symbol: ch,
                offset: base_offset + offset,
            })?;
        result = result
            .checked_mul(RADIX)
            .and_then(|r| r.checked_add(digit))
            .ok_or_else(|| CodecError::Overflow {
                text: text.to_owned(),
            })?;
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

/// Encode a sequence as comma-joined scalars. The empty slice encodes as the
/// empty string.
pub fn encode_int_array(values: &[u64]) -> String {
    values
        .iter()
        .map(|&v| encode_int(v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a comma-joined sequence, preserving order.
///
/// The empty string decodes to an empty array; an empty element anywhere
/// else (`"1,,2"`, `"1,"`) is an error.
pub fn decode_int_array(text: &str) -> Result<Vec<u64>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let mut offset = 0;
    let mut values = Vec::new();
    for (index, part) in text.split(SEPARATOR).enumerate() {
        values.push(decode_element(part, index, offset)?);
        offset += part.len() + SEPARATOR.len_utf8();
    }
    Ok(values)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_covers_all_digit_values() {
        for (value, &symbol) in ALPHABET.iter().enumerate() {
            assert_eq!(digit_value(symbol), Some(value as u64));
        }
    }

    #[test]
    fn encodes_known_values() {
        assert_eq!(encode_int(0), "0");
        assert_eq!(encode_int(9), "9");
        assert_eq!(encode_int(10), "A");
        assert_eq!(encode_int(36), "a");
        assert_eq!(encode_int(63), "/");
        assert_eq!(encode_int(64), "10");
        assert_eq!(encode_int(64 * 64 - 1), "//");
        assert_eq!(encode_int(u64::MAX), "F//////////");
    }

    #[test]
    fn decodes_known_values() {
        assert_eq!(decode_int("0").unwrap(), 0);
        assert_eq!(decode_int("+").unwrap(), 62);
        assert_eq!(decode_int("10").unwrap(), 64);
        assert_eq!(decode_int("F//////////").unwrap(), u64::MAX);
    }

    #[test]
    fn rejects_empty_scalar() {
        assert_eq!(decode_int(""), Err(CodecError::Empty { index: 0 }));
    }

    #[test]
    fn rejects_foreign_symbols() {
        assert_eq!(
            decode_int("1-2"),
            Err(CodecError::InvalidSymbol {
                symbol: '-',
                offset: 1
            })
        );
        assert!(matches!(
            decode_int("é"),
            Err(CodecError::InvalidSymbol { symbol: 'é', .. })
        ));
        assert!(decode_int(" 1").is_err());
    }

    #[test]
    fn rejects_leading_zero() {
        assert!(matches!(
            decode_int("01"),
            Err(CodecError::LeadingZero { .. })
        ));
    }

    #[test]
    fn rejects_overflow() {
        // One past u64::MAX.
        assert!(matches!(
            decode_int("G0000000000"),
            Err(CodecError::Overflow { .. })
        ));
    }

    #[test]
    fn encode_number_rejects_negative_and_fractional() {
        assert_eq!(encode_number(-1.0), Err(CodecError::NotAnInteger(-1.0)));
        assert_eq!(encode_number(1.5), Err(CodecError::NotAnInteger(1.5)));
        assert!(encode_number(f64::NAN).is_err());
        assert!(encode_number(f64::INFINITY).is_err());
        assert!(encode_number(MAX_SAFE_INTEGER + 2.0).is_err());
        assert_eq!(encode_number(4096.0).unwrap(), "100");
    }

    #[test]
    fn encode_i64_rejects_negative() {
        assert_eq!(encode_i64(-1), Err(CodecError::Negative(-1)));
        assert_eq!(encode_i64(65).unwrap(), "11");
    }

    #[test]
    fn empty_array_is_empty_string() {
        assert_eq!(encode_int_array(&[]), "");
        assert_eq!(decode_int_array("").unwrap(), Vec::<u64>::new());
    }

    #[test]
    fn array_errors_report_element_position() {
        assert_eq!(decode_int_array("1,,2"), Err(CodecError::Empty { index: 1 }));
        assert_eq!(decode_int_array("1,"), Err(CodecError::Empty { index: 1 }));
        assert_eq!(
            decode_int_array("A,B*"),
            Err(CodecError::InvalidSymbol {
                symbol: '*',
                offset: 3
            })
        );
    }
}
