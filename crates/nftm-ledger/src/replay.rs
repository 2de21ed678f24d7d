use tracing::debug;

use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::memory::{InMemoryMarket, MarketState};
use crate::records::LedgerEvent;
use crate::traits::MarketReader;

/// A ledger rebuilt from its journal.
pub struct ReplayResult {
    pub market: InMemoryMarket,
    pub applied_events: u64,
}

/// Deterministic replay of committed ledger events.
pub struct ReplayEngine;

impl ReplayEngine {
    /// Rebuild a market by re-applying `events` in order.
    ///
    /// Events run through the same checks as live operations. The journal
    /// must start at seq 1 with no gaps; any event that would break an
    /// invariant aborts the replay with `IntegrityViolation`.
    pub fn replay(
        config: MarketConfig,
        events: &[LedgerEvent],
    ) -> Result<ReplayResult, MarketError> {
        let mut state = MarketState::default();

        for record in events {
            let expected = state.last_seq() + 1;
            if record.seq != expected {
                return Err(MarketError::IntegrityViolation {
                    seq: record.seq,
                    reason: format!("expected seq {expected}"),
                });
            }
            state
                .apply(record.event.clone())
                .map_err(|e| match e {
                    MarketError::IntegrityViolation { .. } => e,
                    other => MarketError::IntegrityViolation {
                        seq: record.seq,
                        reason: other.to_string(),
                    },
                })?;
        }

        debug!(applied = events.len(), "journal replayed");
        Ok(ReplayResult {
            market: InMemoryMarket::from_state(config, state),
            applied_events: events.len() as u64,
        })
    }

    /// Check that replaying `events` reproduces the reader's current state.
    pub fn verify_convergence<R: MarketReader + ?Sized>(
        reader: &R,
        events: &[LedgerEvent],
    ) -> Result<bool, MarketError> {
        let replayed = Self::replay(MarketConfig::default(), events)?;
        Ok(replayed.market.snapshot()? == reader.snapshot()?)
    }
}
