use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;

/// Request-keyed cache with in-flight deduplication.
///
/// Concurrent `get_or_fetch` calls for the same key share one fetch; the
/// result is kept until the key is invalidated. Failed fetches are not
/// cached. Values are owned copies, so the cache never aliases ledger state.
pub struct QueryCache<K, V> {
    entries: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
    fetches: AtomicU64,
}

impl<K, V> Default for QueryCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fetches: AtomicU64::new(0),
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<K, Arc<OnceCell<V>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value for `key`, running `fetch` if there is none.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut entries = self.entries();
            Arc::clone(
                entries
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let value = cell
            .get_or_try_init(|| async {
                self.fetches.fetch_add(1, Ordering::Relaxed);
                fetch().await
            })
            .await?;
        Ok(value.clone())
    }

    /// The cached value, without fetching.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.entries().get(key).and_then(|cell| cell.get().cloned())
    }

    /// Drop the cached value for `key`. Returns whether an entry existed.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries().remove(key).is_some()
    }

    /// Drop every entry for which `stale` returns true. Pending fetches are
    /// passed `None`. Returns the number of entries dropped.
    pub fn invalidate_where<F>(&self, mut stale: F) -> usize
    where
        F: FnMut(&K, Option<&V>) -> bool,
    {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, cell| !stale(key, cell.get()));
        before - entries.len()
    }

    pub fn invalidate_all(&self) {
        self.entries().clear();
    }

    /// Number of keys with a cached or pending value.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total fetches started since creation.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}
