use crate::value::CodecError;
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

///
/// Number
///
/// A decimal number carried verbatim as its wire string. Keeping the text
/// form end to end avoids float drift on round trips; two numbers compare
/// equal when their wire strings are identical.
///
/// Grammar: `[+-]? digits [ '.' digits ] [ ('e'|'E') [+-]? digits ]` with at
/// least one digit before any exponent.
///

#[derive(Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct Number(String);

impl Number {
    /// Validate and wrap a decimal string.
    pub fn parse(text: impl Into<String>) -> Result<Self, CodecError> {
        let text = text.into();
        if is_valid_decimal(&text) {
            Ok(Self(text))
        } else {
            Err(CodecError::InvalidNumber { text })
        }
    }

    /// Convert a binary float, rejecting NaN and infinities which have no
    /// decimal representation.
    pub fn try_from_f64(v: f64) -> Result<Self, CodecError> {
        if v.is_finite() {
            Ok(Self(format_f64(v)))
        } else {
            Err(CodecError::UnsupportedValueType {
                reason: format!("non-finite number {v}"),
            })
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl FromStr for Number {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Re-check the decimal grammar on the way in; a persisted cursor or
        // fixture must not smuggle an invalid number past the constructor.
        let text = String::deserialize(deserializer)?;
        Self::parse(text).map_err(serde::de::Error::custom)
    }
}

macro_rules! number_from_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Number {
                fn from(v: $ty) -> Self {
                    Self(v.to_string())
                }
            }
        )*
    };
}

number_from_int!(i8, i16, i32, i64, u8, u16, u32, u64);

/// `f64` renders shortest-round-trip via the standard formatter, which never
/// produces exponents for the magnitudes the engine deals in; fall back to
/// plain formatting otherwise.
fn format_f64(v: f64) -> String {
    let s = v.to_string();
    debug_assert!(is_valid_decimal(&s));
    s
}

fn is_valid_decimal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let mantissa_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - mantissa_start;

    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        frac_digits = i - start;
    }

    if int_digits + frac_digits == 0 {
        return false;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return false;
        }
    }

    i == bytes.len()
}
