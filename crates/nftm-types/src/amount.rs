use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Largest supported number of decimals (`10^38` still fits in `u128`).
const MAX_DECIMALS: u32 = 38;

/// A native-currency amount in the smallest indivisible unit (wei).
///
/// Amounts are integers end to end; decimal text such as `"0.3"` is only an
/// input/output format. `Amount::parse_native("0.3")` is exactly
/// `300_000_000_000_000_000` wei.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(u128);

impl Amount {
    /// Decimals of the native currency (1 unit = 10^18 wei).
    pub const NATIVE_DECIMALS: u32 = 18;

    pub const ZERO: Amount = Amount(0);

    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    pub const fn wei(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Parse a decimal amount of whole native units, e.g. `"0.3"`.
    pub fn parse_native(s: &str) -> Result<Self, TypeError> {
        Self::parse_units(s, Self::NATIVE_DECIMALS)
    }

    /// Parse a decimal string scaled by `10^decimals`.
    pub fn parse_units(s: &str, decimals: u32) -> Result<Self, TypeError> {
        let text = s.trim();
        if text.starts_with('-') {
            return Err(TypeError::NegativeAmount(text.to_string()));
        }
        if decimals > MAX_DECIMALS {
            return Err(TypeError::Overflow);
        }

        let (whole, frac) = match text.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (text, ""),
        };
        let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
            return Err(TypeError::InvalidAmount(text.to_string()));
        }
        if frac.len() > decimals as usize {
            return Err(TypeError::TooManyDecimals {
                value: text.to_string(),
                decimals,
            });
        }

        let scale = 10u128.pow(decimals);
        let whole_value = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| TypeError::Overflow)?
        };
        let frac_value = if frac.is_empty() {
            0
        } else {
            let padding = 10u128.pow(decimals - frac.len() as u32);
            frac.parse::<u128>().map_err(|_| TypeError::Overflow)? * padding
        };

        whole_value
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_value))
            .map(Self)
            .ok_or(TypeError::Overflow)
    }

    /// Render as whole native units with trailing zeros trimmed.
    pub fn format_native(self) -> String {
        self.format_units(Self::NATIVE_DECIMALS)
    }

    /// Render scaled down by `10^decimals`.
    pub fn format_units(self, decimals: u32) -> String {
        let decimals = decimals.min(MAX_DECIMALS);
        let scale = 10u128.pow(decimals);
        let whole = self.0 / scale;
        let frac = self.0 % scale;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{frac:0width$}", width = decimals as usize);
        format!("{whole}.{}", frac.trim_end_matches('0'))
    }

    pub fn checked_add(self, other: Self) -> Result<Self, TypeError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(TypeError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, TypeError> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(TypeError::Overflow)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({} wei)", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses raw wei digits, e.g. `"300000000000000000"`.
impl FromStr for Amount {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_units(s, 0)
    }
}

impl From<u128> for Amount {
    fn from(wei: u128) -> Self {
        Self(wei)
    }
}

// JSON carries amounts as decimal strings so 18-decimal values survive
// consumers without 128-bit integers.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.0.to_string())
        } else {
            serializer.serialize_u128(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            u128::deserialize(deserializer).map(Self)
        }
    }
}
