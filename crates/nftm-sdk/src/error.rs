use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("no market connected")]
    NotConnected,

    #[error("ledger error: {0}")]
    Market(#[from] nftm_ledger::MarketError),
}

pub type SdkResult<T> = Result<T, SdkError>;
