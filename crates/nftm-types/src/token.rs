use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of a minted token.
///
/// Token ids are assigned sequentially starting at [`TokenId::FIRST`] and are
/// never reused, so the set of minted ids is always `1..=supply`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(u64);

impl TokenId {
    /// The id assigned by the first successful mint.
    pub const FIRST: TokenId = TokenId(1);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id following this one.
    pub fn next(self) -> Result<Self, TypeError> {
        self.0.checked_add(1).map(Self).ok_or(TypeError::Overflow)
    }

    /// Zero-based position in mint order. `None` for the invalid id 0.
    pub fn index(self) -> Option<usize> {
        self.0.checked_sub(1).and_then(|i| usize::try_from(i).ok())
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self.0)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for TokenId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl FromStr for TokenId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('#');
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|e| TypeError::Serialization(format!("invalid token id {s:?}: {e}")))
    }
}
