use std::collections::BTreeSet;
use std::fmt;

use nftm_types::{AccountId, Amount};
use serde::{Deserialize, Serialize};

use crate::error::MarketError;
use crate::records::NftItem;
use crate::traits::MarketReader;

/// Named item queries served to front-end layers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKey {
    AllItems,
    Listed,
    OwnedBy(AccountId),
    CreatedBy(AccountId),
}

impl QueryKey {
    /// Stable string key for request caches.
    pub fn cache_key(&self) -> String {
        match self {
            Self::AllItems => "market/items".into(),
            Self::Listed => "market/listed".into(),
            Self::OwnedBy(account) => format!("market/owned/{}", account.to_hex()),
            Self::CreatedBy(account) => format!("market/created/{}", account.to_hex()),
        }
    }

    pub fn matches(&self, item: &NftItem) -> bool {
        match self {
            Self::AllItems => true,
            Self::Listed => item.is_listed,
            Self::OwnedBy(account) => item.owner == *account,
            Self::CreatedBy(account) => item.creator == *account,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

/// Aggregate market figures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub total_supply: u64,
    pub listed: u64,
    pub delisted: u64,
    pub distinct_owners: u64,
    pub listed_value: Amount,
}

/// Read-side projections over a [`MarketReader`].
pub struct ProjectionBuilder;

impl ProjectionBuilder {
    /// Items matching `key`, in mint order.
    pub fn query<R: MarketReader + ?Sized>(
        reader: &R,
        key: &QueryKey,
    ) -> Result<Vec<NftItem>, MarketError> {
        let items = reader.all_items()?;
        Ok(items.into_iter().filter(|item| key.matches(item)).collect())
    }

    pub fn summary<R: MarketReader + ?Sized>(reader: &R) -> Result<MarketSummary, MarketError> {
        let snapshot = reader.snapshot()?;
        let owners: BTreeSet<_> = snapshot.items.iter().map(|item| item.owner).collect();
        let listed_value = snapshot
            .items
            .iter()
            .filter(|item| item.is_listed)
            .try_fold(Amount::ZERO, |sum, item| sum.checked_add(item.price))?;

        let total_supply = snapshot.items.len() as u64;
        Ok(MarketSummary {
            total_supply,
            listed: snapshot.listed_items_count,
            delisted: total_supply.saturating_sub(snapshot.listed_items_count),
            distinct_owners: owners.len() as u64,
            listed_value,
        })
    }
}
