//! Event fabric for nftm.
//!
//! Carries committed ledger events to observers: each event is sealed with
//! an integrity hash, written to a crash-recoverable journal, and fanned
//! out to filtered subscribers. The fabric plugs into the ledger as an
//! `EventSink`, so the ledger never depends on anyone listening.

pub mod error;
pub mod event;
pub mod fabric;
pub mod wal;

pub use error::FabricError;
pub use event::{EventId, FabricEvent};
pub use fabric::{EventFabric, EventFilter, EventStream, FabricConfig};
pub use wal::{SyncMode, WalEntry, WriteAheadLog};
