//! Foundation types for the nftm marketplace.
//!
//! This crate provides the identity, amount, and metadata types shared by
//! every other nftm crate.
//!
//! # Key Types
//!
//! - [`AccountId`]: 20-byte account address (`0x…`)
//! - [`TokenId`]: sequential, 1-based token identifier
//! - [`Amount`]: native currency amount in the smallest unit (wei)
//! - [`NftMeta`]: off-chain metadata a token URI points to

pub mod account;
pub mod amount;
pub mod error;
pub mod metadata;
pub mod token;

pub use account::AccountId;
pub use amount::Amount;
pub use error::TypeError;
pub use metadata::{NftAttribute, NftMeta, TraitKind};
pub use token::TokenId;
