use thiserror::Error;

/// Errors produced by type operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount must not be negative: {0}")]
    NegativeAmount(String),

    #[error("amount {value} has more than {decimals} fractional digits")]
    TooManyDecimals { value: String, decimals: u32 },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("serialization error: {0}")]
    Serialization(String),
}
