//! Marketplace ledger for nftm.
//!
//! This crate is the heart of nftm. It provides:
//! - `NftItem` records and the `MarketEvent` stream they evolve through
//! - `MarketWriter` / `MarketReader` trait boundaries and the `EventSink` seam
//! - `InMemoryMarket`, an atomic, lock-guarded implementation
//! - Invariant validation over a consistent snapshot
//! - Query projections (listed, owned, created items and market summary)
//! - Deterministic replay of a committed event journal

pub mod config;
pub mod error;
pub mod memory;
pub mod projection;
pub mod records;
pub mod replay;
pub mod traits;
pub mod validation;

pub use config::MarketConfig;
pub use error::MarketError;
pub use memory::InMemoryMarket;
pub use projection::{MarketSummary, ProjectionBuilder, QueryKey};
pub use records::{
    LedgerEvent, ListingState, MarketEvent, MarketEventKind, MarketSnapshot, NftItem, SaleReceipt,
};
pub use replay::{ReplayEngine, ReplayResult};
pub use traits::{CallbackSink, EventSink, MarketReader, MarketWriter};
pub use validation::{InvariantValidator, ValidationReport, Violation, ViolationKind};
