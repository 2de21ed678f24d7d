use std::collections::BTreeSet;
use std::fmt;

use nftm_types::{AccountId, Amount, TokenId};
use serde::{Deserialize, Serialize};

/// One minted token and its current market position.
///
/// `creator` and `token_uri` never change after mint; `owner`, `price` and
/// `is_listed` evolve through sales, delistings and relistings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftItem {
    pub token_id: TokenId,
    pub creator: AccountId,
    pub owner: AccountId,
    pub price: Amount,
    #[serde(rename = "tokenURI")]
    pub token_uri: String,
    pub is_listed: bool,
}

impl NftItem {
    pub fn listing_state(&self) -> ListingState {
        if self.is_listed {
            ListingState::Listed
        } else {
            ListingState::Delisted
        }
    }
}

/// Post-mint states of a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingState {
    Listed,
    Delisted,
}

/// Receipt of a completed purchase.
///
/// Settlement of `price` from buyer to seller happens outside the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub token_id: TokenId,
    pub seller: AccountId,
    pub buyer: AccountId,
    pub price: Amount,
}

/// A state transition of the marketplace.
///
/// Every committed mutation is exactly one event, and re-applying the
/// events in order rebuilds the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketEvent {
    TokenMinted {
        token_id: TokenId,
        creator: AccountId,
        price: Amount,
        token_uri: String,
    },
    TokenListed {
        token_id: TokenId,
        owner: AccountId,
        price: Amount,
    },
    TokenDelisted {
        token_id: TokenId,
        owner: AccountId,
    },
    TokenSold {
        token_id: TokenId,
        seller: AccountId,
        buyer: AccountId,
        price: Amount,
    },
}

impl MarketEvent {
    pub fn kind(&self) -> MarketEventKind {
        match self {
            Self::TokenMinted { .. } => MarketEventKind::TokenMinted,
            Self::TokenListed { .. } => MarketEventKind::TokenListed,
            Self::TokenDelisted { .. } => MarketEventKind::TokenDelisted,
            Self::TokenSold { .. } => MarketEventKind::TokenSold,
        }
    }

    pub fn token_id(&self) -> TokenId {
        match self {
            Self::TokenMinted { token_id, .. }
            | Self::TokenListed { token_id, .. }
            | Self::TokenDelisted { token_id, .. }
            | Self::TokenSold { token_id, .. } => *token_id,
        }
    }

    /// Accounts that took part in the transition.
    pub fn accounts(&self) -> Vec<AccountId> {
        match self {
            Self::TokenMinted { creator, .. } => vec![*creator],
            Self::TokenListed { owner, .. } | Self::TokenDelisted { owner, .. } => vec![*owner],
            Self::TokenSold { seller, buyer, .. } => vec![*seller, *buyer],
        }
    }
}

/// Classification of [`MarketEvent`]s, used for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketEventKind {
    TokenMinted,
    TokenListed,
    TokenDelisted,
    TokenSold,
}

impl fmt::Display for MarketEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TokenMinted => "TokenMinted",
            Self::TokenListed => "TokenListed",
            Self::TokenDelisted => "TokenDelisted",
            Self::TokenSold => "TokenSold",
        };
        write!(f, "{s}")
    }
}

/// A committed event and its position in the journal.
///
/// `seq` starts at 1 and has no gaps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub seq: u64,
    pub event: MarketEvent,
}

/// Point-in-time copy of the whole ledger, taken under a single read lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub items: Vec<NftItem>,
    pub used_uris: BTreeSet<String>,
    pub listed_items_count: u64,
    pub next_token_id: TokenId,
    pub last_seq: u64,
}
