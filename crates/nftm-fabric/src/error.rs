use std::io;
use std::path::PathBuf;

/// Errors produced by the event fabric subsystem.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// I/O error during journal or file operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Journal entry has an invalid length field.
    #[error("invalid journal entry length {length} at offset {offset}")]
    InvalidEntryLength { offset: u64, length: u32 },

    /// A complete journal frame failed its checksum or could not be decoded.
    #[error("corrupt journal entry at offset {offset}")]
    CorruptEntry { offset: u64 },

    /// Another process holds the journal.
    #[error("journal {} is locked by another process", path.display())]
    JournalLocked { path: PathBuf },

    /// The journal grew behind this writer's back.
    #[error("journal length is {found}, expected {expected}: another writer appended")]
    ForeignWrite { expected: u64, found: u64 },

    /// A failed append could not be rolled back; the journal refuses writes.
    #[error("journal is unusable after a failed append")]
    JournalFailed,

    /// A recovered event does not match its integrity hash.
    #[error("integrity check failed for event seq {seq}")]
    IntegrityMismatch { seq: u64 },
}

/// Convenience alias used throughout the fabric crate.
pub type Result<T> = std::result::Result<T, FabricError>;
