use std::path::Path;

use nftm_types::Amount;
use serde::{Deserialize, Serialize};

use crate::error::MarketError;

/// Policy applied to incoming operations.
///
/// Config only gates new calls; replaying an already-committed journal is
/// never rejected because the policy changed since.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Lowest price accepted by mint and relist, in wei.
    pub min_price: Amount,
    /// Longest accepted token URI, in bytes.
    pub max_uri_len: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            min_price: Amount::ZERO,
            max_uri_len: 2048,
        }
    }
}

impl MarketConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, MarketError> {
        toml::from_str(s).map_err(|e| MarketError::Config(e.to_string()))
    }

    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, MarketError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MarketError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub(crate) fn check_price(&self, price: Amount) -> Result<(), MarketError> {
        if price < self.min_price {
            return Err(MarketError::InvalidPrice {
                price,
                min: self.min_price,
            });
        }
        Ok(())
    }

    pub(crate) fn check_uri(&self, token_uri: &str) -> Result<(), MarketError> {
        if token_uri.len() > self.max_uri_len {
            return Err(MarketError::InvalidTokenUri(format!(
                "length {} exceeds {}",
                token_uri.len(),
                self.max_uri_len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = MarketConfig::default();
        assert_eq!(c.min_price, Amount::ZERO);
        assert_eq!(c.max_uri_len, 2048);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = MarketConfig::from_toml_str("min_price = \"1000\"").unwrap();
        assert_eq!(c.min_price, Amount::from_wei(1000));
        assert_eq!(c.max_uri_len, 2048);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.toml");
        std::fs::write(&path, "max_uri_len = 16\n").unwrap();
        let c = MarketConfig::load(&path).unwrap();
        assert_eq!(c.max_uri_len, 16);

        let missing = MarketConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, MarketError::Config(_)));
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = MarketConfig::from_toml_str("min_price = [").unwrap_err();
        assert!(matches!(err, MarketError::Config(_)));
    }

    #[test]
    fn price_and_uri_checks() {
        let c = MarketConfig {
            min_price: Amount::from_wei(10),
            max_uri_len: 4,
        };
        assert!(c.check_price(Amount::from_wei(10)).is_ok());
        assert_eq!(
            c.check_price(Amount::from_wei(9)),
            Err(MarketError::InvalidPrice {
                price: Amount::from_wei(9),
                min: Amount::from_wei(10)
            })
        );
        assert!(c.check_uri("abcd").is_ok());
        assert!(matches!(
            c.check_uri("abcde"),
            Err(MarketError::InvalidTokenUri(_))
        ));
    }
}
