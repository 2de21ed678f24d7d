use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nftm_types::{AccountId, Amount, TokenId};
use tracing::debug;

use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::records::{LedgerEvent, MarketEvent, MarketSnapshot, NftItem, SaleReceipt};
use crate::traits::{EventSink, MarketReader, MarketWriter};

/// In-memory marketplace ledger.
///
/// All state sits behind one `RwLock`: mutations hold the write lock from
/// validation through commit and event publication, readers share the read
/// lock, so no reader ever observes a half-applied operation.
pub struct InMemoryMarket {
    config: MarketConfig,
    inner: RwLock<MarketState>,
    sink: Option<Arc<dyn EventSink>>,
}

pub(crate) struct MarketState {
    items: Vec<NftItem>,
    used_uris: HashSet<String>,
    listed_count: u64,
    next_token_id: TokenId,
    last_seq: u64,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            used_uris: HashSet::new(),
            listed_count: 0,
            next_token_id: TokenId::FIRST,
            last_seq: 0,
        }
    }
}

impl MarketState {
    pub(crate) fn last_seq(&self) -> u64 {
        self.last_seq
    }

    fn position(&self, token_id: TokenId) -> Result<usize, MarketError> {
        token_id
            .index()
            .filter(|&index| index < self.items.len())
            .ok_or(MarketError::TokenNotFound(token_id))
    }

    fn item(&self, token_id: TokenId) -> Result<&NftItem, MarketError> {
        self.position(token_id).map(|index| &self.items[index])
    }

    /// Validate `event` against the current state and apply it.
    ///
    /// All checks run before the first write, so an `Err` leaves the state
    /// untouched. Live operations and journal replay both go through here.
    pub(crate) fn apply(&mut self, event: MarketEvent) -> Result<LedgerEvent, MarketError> {
        let seq = self
            .last_seq
            .checked_add(1)
            .ok_or(MarketError::Type(nftm_types::TypeError::Overflow))?;

        match &event {
            MarketEvent::TokenMinted {
                token_id,
                creator,
                price,
                token_uri,
            } => {
                if *token_id != self.next_token_id {
                    return Err(MarketError::IntegrityViolation {
                        seq,
                        reason: format!(
                            "expected token id {}, found {token_id}",
                            self.next_token_id
                        ),
                    });
                }
                if token_uri.trim().is_empty() {
                    return Err(MarketError::InvalidTokenUri(
                        "token URI must not be empty".into(),
                    ));
                }
                if self.used_uris.contains(token_uri) {
                    return Err(MarketError::DuplicateTokenUri(token_uri.clone()));
                }
                let next = token_id.next()?;

                self.items.push(NftItem {
                    token_id: *token_id,
                    creator: *creator,
                    owner: *creator,
                    price: *price,
                    token_uri: token_uri.clone(),
                    is_listed: true,
                });
                self.used_uris.insert(token_uri.clone());
                self.listed_count += 1;
                self.next_token_id = next;
            }
            MarketEvent::TokenListed {
                token_id,
                owner,
                price,
            } => {
                let index = self.position(*token_id)?;
                let item = &self.items[index];
                if item.owner != *owner {
                    return Err(MarketError::NotOwner {
                        token_id: *token_id,
                        caller: *owner,
                    });
                }
                if item.is_listed {
                    return Err(MarketError::AlreadyListed(*token_id));
                }

                let item = &mut self.items[index];
                item.price = *price;
                item.is_listed = true;
                self.listed_count += 1;
            }
            MarketEvent::TokenDelisted { token_id, owner } => {
                let index = self.position(*token_id)?;
                let item = &self.items[index];
                if item.owner != *owner {
                    return Err(MarketError::NotOwner {
                        token_id: *token_id,
                        caller: *owner,
                    });
                }
                if !item.is_listed {
                    return Err(MarketError::NotListed(*token_id));
                }

                self.items[index].is_listed = false;
                self.listed_count -= 1;
            }
            MarketEvent::TokenSold {
                token_id,
                seller,
                buyer,
                price,
            } => {
                let index = self.position(*token_id)?;
                let item = &self.items[index];
                if !item.is_listed {
                    return Err(MarketError::NotListed(*token_id));
                }
                if item.owner != *seller {
                    return Err(MarketError::NotOwner {
                        token_id: *token_id,
                        caller: *seller,
                    });
                }
                if item.owner == *buyer {
                    return Err(MarketError::BuyerIsOwner(*token_id));
                }
                if item.price != *price {
                    return Err(MarketError::PaymentMismatch {
                        expected: item.price,
                        offered: *price,
                    });
                }

                let item = &mut self.items[index];
                item.owner = *buyer;
                item.is_listed = false;
                self.listed_count -= 1;
            }
        }

        self.last_seq = seq;
        Ok(LedgerEvent { seq, event })
    }

    fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            items: self.items.clone(),
            used_uris: self.used_uris.iter().cloned().collect(),
            listed_items_count: self.listed_count,
            next_token_id: self.next_token_id,
            last_seq: self.last_seq,
        }
    }
}

impl InMemoryMarket {
    pub fn new(config: MarketConfig) -> Self {
        Self::from_state(config, MarketState::default())
    }

    pub(crate) fn from_state(config: MarketConfig, state: MarketState) -> Self {
        Self {
            config,
            inner: RwLock::new(state),
            sink: None,
        }
    }

    /// Attach an observer for committed events.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, MarketState>, MarketError> {
        self.inner.read().map_err(|_| MarketError::LockPoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, MarketState>, MarketError> {
        self.inner.write().map_err(|_| MarketError::LockPoisoned)
    }

    fn commit(
        &self,
        state: &mut MarketState,
        event: MarketEvent,
    ) -> Result<LedgerEvent, MarketError> {
        let committed = state.apply(event)?;
        if let Some(sink) = &self.sink {
            sink.publish(&committed);
        }
        Ok(committed)
    }
}

impl Default for InMemoryMarket {
    fn default() -> Self {
        Self::new(MarketConfig::default())
    }
}

impl MarketWriter for InMemoryMarket {
    fn mint_token(
        &self,
        token_uri: &str,
        price: Amount,
        caller: &AccountId,
    ) -> Result<TokenId, MarketError> {
        self.config.check_uri(token_uri)?;
        self.config.check_price(price)?;

        let mut state = self.write_state()?;
        let token_id = state.next_token_id;
        let committed = self
            .commit(
                &mut state,
                MarketEvent::TokenMinted {
                    token_id,
                    creator: *caller,
                    price,
                    token_uri: token_uri.to_string(),
                },
            )
            .inspect_err(|e| debug!(error = %e, uri = token_uri, "mint rejected"))?;

        debug!(
            seq = committed.seq,
            token_id = %token_id,
            creator = %caller.short_id(),
            price = %price,
            "token minted"
        );
        Ok(token_id)
    }

    fn buy_item(
        &self,
        token_id: TokenId,
        buyer: &AccountId,
        payment: Amount,
    ) -> Result<SaleReceipt, MarketError> {
        let mut state = self.write_state()?;
        let seller = state.item(token_id)?.owner;
        let committed = self
            .commit(
                &mut state,
                MarketEvent::TokenSold {
                    token_id,
                    seller,
                    buyer: *buyer,
                    price: payment,
                },
            )
            .inspect_err(|e| debug!(error = %e, token_id = %token_id, "purchase rejected"))?;

        debug!(
            seq = committed.seq,
            token_id = %token_id,
            seller = %seller.short_id(),
            buyer = %buyer.short_id(),
            "token sold"
        );
        Ok(SaleReceipt {
            token_id,
            seller,
            buyer: *buyer,
            price: payment,
        })
    }

    fn delist_item(&self, token_id: TokenId, caller: &AccountId) -> Result<(), MarketError> {
        let mut state = self.write_state()?;
        let committed = self
            .commit(
                &mut state,
                MarketEvent::TokenDelisted {
                    token_id,
                    owner: *caller,
                },
            )
            .inspect_err(|e| debug!(error = %e, token_id = %token_id, "delist rejected"))?;

        debug!(seq = committed.seq, token_id = %token_id, "token delisted");
        Ok(())
    }

    fn relist_item(
        &self,
        token_id: TokenId,
        price: Amount,
        caller: &AccountId,
    ) -> Result<(), MarketError> {
        self.config.check_price(price)?;

        let mut state = self.write_state()?;
        let committed = self
            .commit(
                &mut state,
                MarketEvent::TokenListed {
                    token_id,
                    owner: *caller,
                    price,
                },
            )
            .inspect_err(|e| debug!(error = %e, token_id = %token_id, "relist rejected"))?;

        debug!(seq = committed.seq, token_id = %token_id, price = %price, "token relisted");
        Ok(())
    }
}

impl MarketReader for InMemoryMarket {
    fn owner_of(&self, token_id: TokenId) -> Result<AccountId, MarketError> {
        Ok(self.read_state()?.item(token_id)?.owner)
    }

    fn token_uri(&self, token_id: TokenId) -> Result<String, MarketError> {
        Ok(self.read_state()?.item(token_id)?.token_uri.clone())
    }

    fn get_nft_item(&self, token_id: TokenId) -> Result<NftItem, MarketError> {
        self.read_state()?.item(token_id).cloned()
    }

    fn listed_items_count(&self) -> Result<u64, MarketError> {
        Ok(self.read_state()?.listed_count)
    }

    fn total_supply(&self) -> Result<u64, MarketError> {
        Ok(self.read_state()?.items.len() as u64)
    }

    fn next_token_id(&self) -> Result<TokenId, MarketError> {
        Ok(self.read_state()?.next_token_id)
    }

    fn is_uri_used(&self, token_uri: &str) -> Result<bool, MarketError> {
        Ok(self.read_state()?.used_uris.contains(token_uri))
    }

    fn all_items(&self) -> Result<Vec<NftItem>, MarketError> {
        Ok(self.read_state()?.items.clone())
    }

    fn last_seq(&self) -> Result<u64, MarketError> {
        Ok(self.read_state()?.last_seq)
    }

    fn snapshot(&self) -> Result<MarketSnapshot, MarketError> {
        Ok(self.read_state()?.snapshot())
    }
}
