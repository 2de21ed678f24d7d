use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use nftm_fabric::EventFilter;
use nftm_ledger::{LedgerEvent, NftItem, ProjectionBuilder, QueryKey};
use nftm_types::{AccountId, TokenId};

use crate::cache::QueryCache;
use crate::context::MarketContext;
use crate::error::SdkError;

/// What a hook hands back to the UI.
///
/// `key` is the cache key the data was served under, `None` when no market
/// is connected. A failed read still carries usable `data` (empty).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookResponse<T> {
    pub key: Option<String>,
    pub data: T,
    pub error: Option<SdkError>,
}

impl<T> HookResponse<T> {
    fn idle(data: T) -> Self {
        Self {
            key: None,
            data,
            error: None,
        }
    }

    fn served(key: String, result: Result<T, SdkError>, fallback: T) -> Self {
        match result {
            Ok(data) => Self {
                key: Some(key),
                data,
                error: None,
            },
            Err(error) => Self {
                key: Some(key),
                data: fallback,
                error: Some(error),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Cached market queries for a front-end.
///
/// Results are copies; callers never see ledger internals and a stale entry
/// is dropped as soon as a committed event touches it.
pub struct MarketHooks {
    ctx: MarketContext,
    items: QueryCache<QueryKey, Vec<NftItem>>,
    nfts: QueryCache<TokenId, NftItem>,
}

fn nft_key(token_id: TokenId) -> String {
    format!("market/nft/{}", token_id.get())
}

impl MarketHooks {
    pub fn new(ctx: MarketContext) -> Self {
        Self {
            ctx,
            items: QueryCache::new(),
            nfts: QueryCache::new(),
        }
    }

    pub fn context(&self) -> &MarketContext {
        &self.ctx
    }

    /// Items currently for sale.
    pub async fn listed_nfts(&self) -> HookResponse<Vec<NftItem>> {
        self.items_for(QueryKey::Listed).await
    }

    /// Items owned by `account`.
    pub async fn owned_nfts(&self, account: AccountId) -> HookResponse<Vec<NftItem>> {
        self.items_for(QueryKey::OwnedBy(account)).await
    }

    /// Items minted by `account`.
    pub async fn created_nfts(&self, account: AccountId) -> HookResponse<Vec<NftItem>> {
        self.items_for(QueryKey::CreatedBy(account)).await
    }

    pub async fn all_nfts(&self) -> HookResponse<Vec<NftItem>> {
        self.items_for(QueryKey::AllItems).await
    }

    async fn items_for(&self, key: QueryKey) -> HookResponse<Vec<NftItem>> {
        let Some(reader) = self.ctx.reader() else {
            return HookResponse::idle(Vec::new());
        };
        let reader = Arc::clone(reader);
        let query = key.clone();
        let result = self
            .items
            .get_or_fetch(&key, || async move {
                ProjectionBuilder::query(&*reader, &query).map_err(SdkError::from)
            })
            .await;
        HookResponse::served(key.cache_key(), result, Vec::new())
    }

    /// A single item. Unknown ids come back as `None` with the lookup error.
    pub async fn nft(&self, token_id: TokenId) -> HookResponse<Option<NftItem>> {
        let Some(reader) = self.ctx.reader() else {
            return HookResponse::idle(None);
        };
        let reader = Arc::clone(reader);
        let result = self
            .nfts
            .get_or_fetch(&token_id, || async move {
                reader.get_nft_item(token_id).map_err(SdkError::from)
            })
            .await
            .map(Some);
        HookResponse::served(nft_key(token_id), result, None)
    }

    /// Whether `key` currently has a cached result.
    pub fn is_cached(&self, key: &QueryKey) -> bool {
        self.items.peek(key).is_some()
    }

    /// Drop every cached result the event could have changed.
    pub fn invalidate_for(&self, record: &LedgerEvent) {
        let token_id = record.event.token_id();
        let accounts = record.event.accounts();

        let dropped = self.items.invalidate_where(|key, cached| match key {
            QueryKey::AllItems | QueryKey::Listed => true,
            QueryKey::OwnedBy(account) | QueryKey::CreatedBy(account)
                if accounts.contains(account) =>
            {
                true
            }
            _ => cached.map_or(true, |items| items.iter().any(|i| i.token_id == token_id)),
        });
        self.nfts.invalidate(&token_id);

        debug!(seq = record.seq, token = %token_id, dropped, "hook cache invalidated");
    }

    pub fn invalidate_all(&self) {
        self.items.invalidate_all();
        self.nfts.invalidate_all();
    }
}

/// Keep `hooks` fresh by invalidating on every event routed by the fabric
/// in their context.
///
/// Returns `None` when the context carries no fabric. The task holds the
/// hooks weakly: it ends once they are dropped or the fabric closes. If it
/// falls behind the channel it drops the whole cache rather than guess what
/// it missed.
pub fn spawn_invalidator(hooks: &Arc<MarketHooks>) -> Option<JoinHandle<()>> {
    let mut stream = hooks.context().fabric()?.subscribe(EventFilter::default());
    let hooks = Arc::downgrade(hooks);
    Some(tokio::spawn(async move {
        loop {
            let received = stream.recv().await;
            let Some(hooks) = hooks.upgrade() else {
                break;
            };
            match received {
                Ok(event) => hooks.invalidate_for(&event.record),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "invalidator lagged; clearing hook caches");
                    hooks.invalidate_all();
                }
                Err(RecvError::Closed) => break,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nftm_fabric::{EventFabric, FabricConfig};
    use nftm_ledger::{InMemoryMarket, MarketError, MarketEvent, MarketWriter};
    use nftm_types::Amount;

    use super::*;

    fn price() -> Amount {
        Amount::parse_native("0.3").unwrap()
    }

    fn connected() -> (Arc<InMemoryMarket>, MarketHooks) {
        let market = Arc::new(InMemoryMarket::default());
        let hooks = MarketHooks::new(MarketContext::connect(market.clone()));
        (market, hooks)
    }

    #[tokio::test]
    async fn disconnected_hooks_return_empty_data() {
        let hooks = MarketHooks::new(MarketContext::disconnected());

        let listed = hooks.listed_nfts().await;
        assert_eq!(listed, HookResponse::idle(Vec::new()));

        let nft = hooks.nft(TokenId::FIRST).await;
        assert!(nft.key.is_none());
        assert!(nft.data.is_none());
    }

    #[tokio::test]
    async fn listed_nfts_serves_from_cache() {
        let (market, hooks) = connected();
        let alice = AccountId::dev(0);
        market.mint_token("ipfs://a", price(), &alice).unwrap();

        let first = hooks.listed_nfts().await;
        assert_eq!(first.key.as_deref(), Some("market/listed"));
        assert_eq!(first.data.len(), 1);

        // Without invalidation the cached copy is served.
        market.mint_token("ipfs://b", price(), &alice).unwrap();
        assert_eq!(hooks.listed_nfts().await.data.len(), 1);
        assert_eq!(hooks.items.fetch_count(), 1);
    }

    #[tokio::test]
    async fn unknown_nft_reports_error() {
        let (_, hooks) = connected();
        let response = hooks.nft(TokenId::new(9)).await;
        assert_eq!(response.key.as_deref(), Some("market/nft/9"));
        assert_eq!(response.data, None);
        assert_eq!(
            response.error,
            Some(SdkError::Market(MarketError::TokenNotFound(TokenId::new(9))))
        );
        assert!(!response.is_ok());
    }

    #[tokio::test]
    async fn sale_invalidates_affected_queries_only() {
        let (market, hooks) = connected();
        let alice = AccountId::dev(0);
        let bob = AccountId::dev(1);
        let carol = AccountId::dev(2);
        let id = market.mint_token("ipfs://a", price(), &alice).unwrap();
        market.mint_token("ipfs://c", price(), &carol).unwrap();

        hooks.listed_nfts().await;
        hooks.owned_nfts(bob).await;
        hooks.owned_nfts(carol).await;
        hooks.created_nfts(alice).await;
        hooks.nft(id).await;

        let receipt = market.buy_item(id, &bob, price()).unwrap();
        hooks.invalidate_for(&LedgerEvent {
            seq: 3,
            event: MarketEvent::TokenSold {
                token_id: id,
                seller: receipt.seller,
                buyer: bob,
                price: receipt.price,
            },
        });

        assert!(!hooks.is_cached(&QueryKey::Listed));
        assert!(!hooks.is_cached(&QueryKey::OwnedBy(bob)));
        assert!(!hooks.is_cached(&QueryKey::CreatedBy(alice)));
        assert!(hooks.is_cached(&QueryKey::OwnedBy(carol)));
        assert!(hooks.nfts.peek(&id).is_none());

        let owned = hooks.owned_nfts(bob).await;
        assert_eq!(owned.data.len(), 1);
        assert_eq!(owned.data[0].owner, bob);
    }

    #[tokio::test]
    async fn invalidator_follows_fabric_events() {
        let fabric = Arc::new(EventFabric::in_memory(FabricConfig::default()));
        let market = Arc::new(InMemoryMarket::default().with_sink(fabric.clone()));
        let hooks = Arc::new(MarketHooks::new(
            MarketContext::connect(market.clone()).with_fabric(fabric.clone()),
        ));
        let _task = spawn_invalidator(&hooks).unwrap();
        let alice = AccountId::dev(0);

        assert!(hooks.listed_nfts().await.data.is_empty());
        assert!(hooks.is_cached(&QueryKey::Listed));

        market.mint_token("ipfs://a", price(), &alice).unwrap();

        let mut fresh = false;
        for _ in 0..100 {
            if !hooks.is_cached(&QueryKey::Listed) {
                fresh = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(fresh);
        assert_eq!(hooks.listed_nfts().await.data.len(), 1);
    }

    #[tokio::test]
    async fn invalidator_needs_a_fabric() {
        let hooks = Arc::new(MarketHooks::new(MarketContext::connect(Arc::new(
            InMemoryMarket::default(),
        ))));
        assert!(spawn_invalidator(&hooks).is_none());
    }

    #[tokio::test]
    async fn invalidator_ends_with_its_hooks() {
        let fabric = Arc::new(EventFabric::in_memory(FabricConfig::default()));
        let hooks = Arc::new(MarketHooks::new(
            MarketContext::disconnected().with_fabric(fabric.clone()),
        ));
        let task = spawn_invalidator(&hooks).unwrap();

        drop(hooks);
        drop(fabric);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
