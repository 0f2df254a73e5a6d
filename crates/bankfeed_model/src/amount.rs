//! Fixed-point monetary amounts.
//!
//! The aggregator transmits amounts and balances as decimal strings
//! (`"42.00"`, `"-1.00"`). Amounts are stored exactly as signed minor units
//! plus a decimal scale; arithmetic beyond comparison is not needed by the
//! sync pipeline.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum accepted number of fractional digits.
const MAX_SCALE: u32 = 12;

/// A fixed-point decimal amount.
#[derive(Debug, Clone, Copy)]
pub struct Amount {
    /// Signed value in minor units (`10^-scale` of the major unit).
    minor_units: i64,
    /// Number of fractional digits.
    scale: u32,
}

/// Errors from parsing a decimal amount string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    /// The string is empty or not a decimal number.
    #[error("malformed amount")]
    Malformed,
    /// More fractional digits than supported.
    #[error("too many fractional digits (max {MAX_SCALE})")]
    ScaleTooLarge,
    /// The value does not fit in the underlying representation.
    #[error("amount out of range")]
    OutOfRange,
}

impl Amount {
    /// Creates an amount from minor units and a scale.
    pub fn new(minor_units: i64, scale: u32) -> Self {
        Self { minor_units, scale }
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Returns the signed value in minor units.
    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    /// Returns the number of fractional digits.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Returns true for amounts below zero.
    pub fn is_negative(&self) -> bool {
        self.minor_units < 0
    }

    /// Widens to a common scale for numeric comparison.
    fn to_scaled(self, scale: u32) -> i128 {
        debug_assert!(scale >= self.scale, "target scale must not lose digits");
        i128::from(self.minor_units) * 10_i128.pow(scale - self.scale)
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let (int_part, frac_part) = match rest.split_once('.') {
            Some((int, frac)) => (int, frac),
            None => (rest, ""),
        };

        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseAmountError::Malformed);
        }
        if rest.contains('.') && (frac_part.is_empty() || !frac_part.bytes().all(|b| b.is_ascii_digit())) {
            return Err(ParseAmountError::Malformed);
        }

        let scale = frac_part.len() as u32;
        if scale > MAX_SCALE {
            return Err(ParseAmountError::ScaleTooLarge);
        }

        let mut minor: i64 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            minor = minor
                .checked_mul(10)
                .and_then(|m| m.checked_add(i64::from(b - b'0')))
                .ok_or(ParseAmountError::OutOfRange)?;
        }
        if negative {
            minor = -minor;
        }

        Ok(Self::new(minor, scale))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.minor_units);
        }
        let divisor = 10_i64.pow(self.scale);
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.unsigned_abs();
        let int = abs / divisor.unsigned_abs();
        let frac = abs % divisor.unsigned_abs();
        write!(f, "{sign}{int}.{frac:0width$}", width = self.scale as usize)
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        let scale = self.scale.max(other.scale);
        self.to_scaled(scale) == other.to_scaled(scale)
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.to_scaled(scale).cmp(&other.to_scaled(scale))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
