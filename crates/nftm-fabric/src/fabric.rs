use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use nftm_ledger::{EventSink, LedgerEvent, MarketEventKind};
use nftm_types::{AccountId, TokenId};

use crate::error::{FabricError, Result};
use crate::event::FabricEvent;
use crate::wal::{SyncMode, WalEntry, WriteAheadLog};

/// Filter for subscribing to a subset of fabric events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<MarketEventKind>>,
    /// If set, only events about these tokens are delivered.
    pub tokens: Option<Vec<TokenId>>,
    /// If set, only events involving one of these accounts are delivered.
    pub accounts: Option<Vec<AccountId>>,
}

impl EventFilter {
    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &FabricEvent) -> bool {
        let market_event = &event.record.event;
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&market_event.kind()) {
                return false;
            }
        }
        if let Some(ref tokens) = self.tokens {
            if !tokens.contains(&market_event.token_id()) {
                return false;
            }
        }
        if let Some(ref accounts) = self.accounts {
            if !market_event
                .accounts()
                .iter()
                .any(|account| accounts.contains(account))
            {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for fabric events.
pub type EventStream = broadcast::Receiver<FabricEvent>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<FabricEvent>,
}

/// Fan-out router that delivers events to matching subscribers.
struct EventRouter {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventRouter {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn subscribe(&self, filter: EventFilter, capacity: usize) -> EventStream {
        let (tx, rx) = broadcast::channel(capacity);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Route an event to all matching subscribers, pruning closed ones.
    fn route(&self, event: &FabricEvent) {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|sub| {
            if sub.filter.matches(event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Configuration for the [`EventFabric`].
#[derive(Clone, Debug)]
pub struct FabricConfig {
    /// Capacity of per-subscriber broadcast channels.
    pub channel_capacity: usize,
    /// Journal sync strategy.
    pub sync_mode: SyncMode,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            sync_mode: SyncMode::default(),
        }
    }
}

/// Event bus for committed ledger events.
///
/// Optionally journals every event before routing it, so a restarted process
/// can replay the ledger from [`EventFabric::recover`].
pub struct EventFabric {
    journal: Option<WriteAheadLog>,
    router: EventRouter,
    config: FabricConfig,
    journal_failures: AtomicU64,
}

impl EventFabric {
    /// A fabric that only fans out; nothing is persisted.
    pub fn in_memory(config: FabricConfig) -> Self {
        Self {
            journal: None,
            router: EventRouter::new(),
            config,
            journal_failures: AtomicU64::new(0),
        }
    }

    /// A fabric journaling to the file at `journal_path`.
    ///
    /// The fabric is the journal's only writer while it lives: a second
    /// `open` of the same file fails with `JournalLocked`.
    pub fn open(journal_path: &Path, config: FabricConfig) -> Result<Self> {
        let journal = WriteAheadLog::open_exclusive(journal_path, config.sync_mode)?;
        info!(journal = %journal_path.display(), "fabric journal opened");
        Ok(Self {
            journal: Some(journal),
            router: EventRouter::new(),
            config,
            journal_failures: AtomicU64::new(0),
        })
    }

    /// Seal, journal, and route one committed event.
    pub fn emit(&self, record: LedgerEvent) -> Result<FabricEvent> {
        let event = FabricEvent::new(record);

        if let Some(journal) = &self.journal {
            journal.append(&WalEntry {
                event: event.clone(),
            })?;
        }

        self.router.route(&event);

        debug!(id = %event.id, seq = event.seq(), kind = %event.kind(), "event emitted");
        Ok(event)
    }

    /// Subscribe to events matching the given filter.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.router.subscribe(filter, self.config.channel_capacity)
    }

    /// Recover the journaled ledger events in commit order.
    ///
    /// Returns an empty list for an in-memory fabric.
    pub fn recover(&self) -> Result<Vec<LedgerEvent>> {
        let Some(journal) = &self.journal else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for entry in journal.recover()? {
            if !entry.event.verify_integrity() {
                return Err(FabricError::IntegrityMismatch {
                    seq: entry.event.seq(),
                });
            }
            records.push(entry.event.record);
        }

        info!(count = records.len(), "recovered events from journal");
        Ok(records)
    }

    pub fn subscriber_count(&self) -> usize {
        self.router.subscriber_count()
    }

    /// Number of events that could not be journaled.
    pub fn journal_failures(&self) -> u64 {
        self.journal_failures.load(Ordering::Relaxed)
    }

    pub fn journal_path(&self) -> Option<&Path> {
        self.journal.as_ref().map(WriteAheadLog::path)
    }
}

impl EventSink for EventFabric {
    fn publish(&self, event: &LedgerEvent) {
        if let Err(e) = self.emit(event.clone()) {
            self.journal_failures.fetch_add(1, Ordering::Relaxed);
            warn!(seq = event.seq, error = %e, "failed to journal ledger event");
        }
    }
}
