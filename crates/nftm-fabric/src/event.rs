use serde::{Deserialize, Serialize};

use nftm_ledger::{LedgerEvent, MarketEventKind};

/// Unique identifier for a fabric event: the event's integrity hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub hash: [u8; 32],
}

impl EventId {
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Short hex representation (first 8 hex chars).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt:{}", self.short_hex())
    }
}

/// A committed ledger event sealed for transport and storage.
///
/// The integrity hash is BLAKE3 over the bincode encoding of the record, so
/// a journal entry altered on disk is detected on recovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricEvent {
    pub id: EventId,
    pub record: LedgerEvent,
    pub integrity_hash: [u8; 32],
}

impl FabricEvent {
    pub fn new(record: LedgerEvent) -> Self {
        let integrity_hash = Self::compute_integrity(&record);
        Self {
            id: EventId::from_hash(integrity_hash),
            record,
            integrity_hash,
        }
    }

    pub fn seq(&self) -> u64 {
        self.record.seq
    }

    pub fn kind(&self) -> MarketEventKind {
        self.record.event.kind()
    }

    /// Verify the integrity hash matches the record.
    pub fn verify_integrity(&self) -> bool {
        self.integrity_hash == Self::compute_integrity(&self.record)
            && self.id.hash == self.integrity_hash
    }

    fn compute_integrity(record: &LedgerEvent) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"nftm-fabric-event-v1:");
        hasher.update(&record.seq.to_le_bytes());
        if let Ok(bytes) = bincode::serialize(&record.event) {
            hasher.update(&bytes);
        }
        *hasher.finalize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use nftm_ledger::MarketEvent;
    use nftm_types::{AccountId, Amount, TokenId};

    use super::*;

    fn minted(seq: u64, uri: &str) -> LedgerEvent {
        LedgerEvent {
            seq,
            event: MarketEvent::TokenMinted {
                token_id: TokenId::new(seq),
                creator: AccountId::dev(0),
                price: Amount::parse_native("0.3").unwrap(),
                token_uri: uri.into(),
            },
        }
    }

    #[test]
    fn integrity_holds_for_fresh_events() {
        let event = FabricEvent::new(minted(1, "ipfs://a"));
        assert!(event.verify_integrity());
        assert_eq!(event.seq(), 1);
        assert_eq!(event.kind(), MarketEventKind::TokenMinted);
    }

    #[test]
    fn tampering_is_detected() {
        let mut event = FabricEvent::new(minted(1, "ipfs://a"));
        if let MarketEvent::TokenMinted { price, .. } = &mut event.record.event {
            *price = Amount::ZERO;
        }
        assert!(!event.verify_integrity());
    }

    #[test]
    fn id_depends_on_seq_and_content() {
        let a = FabricEvent::new(minted(1, "ipfs://a"));
        assert_eq!(a.id, FabricEvent::new(minted(1, "ipfs://a")).id);
        assert_ne!(a.id, FabricEvent::new(minted(2, "ipfs://a")).id);
        assert_ne!(a.id, FabricEvent::new(minted(1, "ipfs://b")).id);
    }

    #[test]
    fn event_id_display() {
        let id = EventId::from_hash([0xab; 32]);
        assert_eq!(format!("{id}"), "evt:abababab");
    }

    #[test]
    fn bincode_roundtrip_keeps_integrity() {
        let event = FabricEvent::new(minted(3, "ipfs://c"));
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: FabricEvent = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
        assert!(decoded.verify_integrity());
    }
}
