use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Number of bytes in an account address.
pub const ACCOUNT_LEN: usize = 20;

/// Address of a marketplace participant.
///
/// An `AccountId` is an opaque 20-byte address, rendered as `0x` followed by
/// 40 lowercase hex characters. The ledger never interprets the bytes; it
/// only compares them, so any external identity scheme can map onto it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId([u8; ACCOUNT_LEN]);

impl AccountId {
    /// Derive an address deterministically from arbitrary seed bytes.
    ///
    /// The address is the first 20 bytes of a domain-separated BLAKE3 hash,
    /// so the same seed always yields the same account.
    pub fn derive(seed: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"nftm-account-v1:");
        hasher.update(seed);
        let hash = hasher.finalize();
        let mut bytes = [0u8; ACCOUNT_LEN];
        bytes.copy_from_slice(&hash.as_bytes()[..ACCOUNT_LEN]);
        Self(bytes)
    }

    /// The deterministic development account at `index`.
    ///
    /// Mirrors the pre-funded `accounts[i]` list of a local test network:
    /// every process computes the same list.
    pub fn dev(index: u32) -> Self {
        let mut seed = b"dev:".to_vec();
        seed.extend_from_slice(&index.to_le_bytes());
        Self::derive(&seed)
    }

    /// Create a random address for tests and demos.
    pub fn random() -> Self {
        let mut bytes = [0u8; ACCOUNT_LEN];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; ACCOUNT_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ACCOUNT_LEN] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex string.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Abbreviated form for log lines, e.g. `0x1a2b…9f0e`.
    pub fn short_id(&self) -> String {
        format!(
            "0x{}…{}",
            hex::encode(&self.0[..2]),
            hex::encode(&self.0[ACCOUNT_LEN - 2..])
        )
    }

    /// Parse from a hex string, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != ACCOUNT_LEN {
            return Err(TypeError::InvalidLength {
                expected: ACCOUNT_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; ACCOUNT_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.short_id())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for AccountId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; ACCOUNT_LEN]>::deserialize(deserializer).map(Self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(AccountId::derive(b"alice"), AccountId::derive(b"alice"));
        assert_ne!(AccountId::derive(b"alice"), AccountId::derive(b"bob"));
    }

    #[test]
    fn dev_accounts_are_stable_and_distinct() {
        assert_eq!(AccountId::dev(0), AccountId::dev(0));
        assert_ne!(AccountId::dev(0), AccountId::dev(1));
    }

    #[test]
    fn random_accounts_are_unique() {
        assert_ne!(AccountId::random(), AccountId::random());
    }

    #[test]
    fn hex_format() {
        let id = AccountId::from_bytes([0xab; ACCOUNT_LEN]);
        let hex = id.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 42);
        assert_eq!(id.short_id(), "0xabab…abab");
    }

    #[test]
    fn parse_accepts_prefix_and_mixed_case() {
        let id = AccountId::dev(3);
        let upper = id.to_hex().trim_start_matches("0x").to_uppercase();
        assert_eq!(AccountId::from_hex(&upper).unwrap(), id);
        assert_eq!(id.to_hex().parse::<AccountId>().unwrap(), id);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = AccountId::from_hex("0x0102").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: ACCOUNT_LEN,
                actual: 2
            }
        );
        assert!(matches!(
            AccountId::from_hex("0xzz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn json_uses_hex_string() {
        let id = AccountId::dev(0);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let parsed: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
