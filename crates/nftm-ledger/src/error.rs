use nftm_types::{AccountId, Amount, TokenId, TypeError};

/// Errors produced by marketplace operations.
///
/// Every variant is reported before any state changes: a failed operation
/// leaves the ledger exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("token URI already used: {0}")]
    DuplicateTokenUri(String),

    #[error("token {0} not found")]
    TokenNotFound(TokenId),

    #[error("invalid price {price}: minimum is {min}")]
    InvalidPrice { price: Amount, min: Amount },

    #[error("invalid token URI: {0}")]
    InvalidTokenUri(String),

    #[error("account {caller} does not own token {token_id}")]
    NotOwner { token_id: TokenId, caller: AccountId },

    #[error("token {0} is not listed")]
    NotListed(TokenId),

    #[error("token {0} is already listed")]
    AlreadyListed(TokenId),

    #[error("owner cannot buy their own token {0}")]
    BuyerIsOwner(TokenId),

    #[error("payment {offered} does not match price {expected}")]
    PaymentMismatch { expected: Amount, offered: Amount },

    #[error("integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Type(#[from] TypeError),
}

pub type MarketResult<T> = Result<T, MarketError>;
