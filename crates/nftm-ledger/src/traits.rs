use nftm_types::{AccountId, Amount, TokenId};

use crate::error::MarketError;
use crate::records::{LedgerEvent, MarketSnapshot, NftItem, SaleReceipt};

/// Write boundary for marketplace mutations.
///
/// Each call either commits completely or returns an error with no effect.
pub trait MarketWriter: Send + Sync {
    fn mint_token(
        &self,
        token_uri: &str,
        price: Amount,
        caller: &AccountId,
    ) -> Result<TokenId, MarketError>;

    fn buy_item(
        &self,
        token_id: TokenId,
        buyer: &AccountId,
        payment: Amount,
    ) -> Result<SaleReceipt, MarketError>;

    fn delist_item(&self, token_id: TokenId, caller: &AccountId) -> Result<(), MarketError>;

    fn relist_item(
        &self,
        token_id: TokenId,
        price: Amount,
        caller: &AccountId,
    ) -> Result<(), MarketError>;
}

/// Read boundary for marketplace queries.
pub trait MarketReader: Send + Sync {
    fn owner_of(&self, token_id: TokenId) -> Result<AccountId, MarketError>;

    fn token_uri(&self, token_id: TokenId) -> Result<String, MarketError>;

    fn get_nft_item(&self, token_id: TokenId) -> Result<NftItem, MarketError>;

    /// Maintained counter; never a scan.
    fn listed_items_count(&self) -> Result<u64, MarketError>;

    fn total_supply(&self) -> Result<u64, MarketError>;

    fn next_token_id(&self) -> Result<TokenId, MarketError>;

    fn is_uri_used(&self, token_uri: &str) -> Result<bool, MarketError>;

    /// All items in mint order.
    fn all_items(&self) -> Result<Vec<NftItem>, MarketError>;

    /// Sequence of the last committed event, 0 when nothing was committed.
    fn last_seq(&self) -> Result<u64, MarketError>;

    fn snapshot(&self) -> Result<MarketSnapshot, MarketError>;
}

/// Observer of committed events.
///
/// `publish` is called after the mutation has committed, in sequence order,
/// while the ledger still holds its write lock: implementations must not
/// block and must not call back into the ledger.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &LedgerEvent);
}

type Callback = Box<dyn Fn(&LedgerEvent) + Send + Sync>;

/// Sink that forwards every event to a list of callbacks.
#[derive(Default)]
pub struct CallbackSink {
    callbacks: Vec<Callback>,
}

impl CallbackSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LedgerEvent) + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl EventSink for CallbackSink {
    fn publish(&self, event: &LedgerEvent) {
        for callback in &self.callbacks {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::records::MarketEvent;

    #[test]
    fn callback_sink_calls_every_callback() {
        let hits = Arc::new(AtomicU64::new(0));
        let a = Arc::clone(&hits);
        let b = Arc::clone(&hits);
        let sink = CallbackSink::new()
            .with_callback(move |e| {
                a.fetch_add(e.seq, Ordering::SeqCst);
            })
            .with_callback(move |e| {
                b.fetch_add(e.seq, Ordering::SeqCst);
            });
        assert_eq!(sink.len(), 2);

        sink.publish(&LedgerEvent {
            seq: 5,
            event: MarketEvent::TokenDelisted {
                token_id: TokenId::FIRST,
                owner: AccountId::dev(0),
            },
        });
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn empty_sink_is_a_noop() {
        let sink = CallbackSink::new();
        assert!(sink.is_empty());
        sink.publish(&LedgerEvent {
            seq: 1,
            event: MarketEvent::TokenDelisted {
                token_id: TokenId::FIRST,
                owner: AccountId::dev(0),
            },
        });
    }
}
