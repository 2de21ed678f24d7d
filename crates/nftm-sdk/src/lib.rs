//! Front-end SDK for nftm.
//!
//! Sits strictly outside the ledger: a [`MarketContext`] carries the
//! connections explicitly, a [`QueryCache`] deduplicates and caches reads,
//! and [`MarketHooks`] expose the data queries a UI polls.

pub mod cache;
pub mod context;
pub mod error;
pub mod hooks;

pub use cache::QueryCache;
pub use context::MarketContext;
pub use error::{SdkError, SdkResult};
pub use hooks::{spawn_invalidator, HookResponse, MarketHooks};

// Re-export key types
pub use nftm_ledger::{NftItem, QueryKey};
pub use nftm_types::{AccountId, Amount, TokenId};
