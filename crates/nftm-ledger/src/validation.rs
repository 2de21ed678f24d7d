use std::collections::HashSet;

use nftm_types::TokenId;

use crate::error::MarketError;
use crate::traits::MarketReader;

/// Result of an invariant audit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub total_supply: u64,
    pub listed_items_count: u64,
    pub last_seq: u64,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific invariant breach detected during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub token_id: Option<TokenId>,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    TokenIdGap,
    CounterMismatch,
    DuplicateUri,
    UnregisteredUri,
    OrphanUri,
    ListedCountMismatch,
}

/// Ledger invariant auditor.
///
/// Recomputes by full scan what the ledger maintains incrementally. This is
/// for audits and tests only; nothing on the operation path calls it.
pub struct InvariantValidator;

impl InvariantValidator {
    pub fn validate<R: MarketReader + ?Sized>(reader: &R) -> Result<ValidationReport, MarketError> {
        let snapshot = reader.snapshot()?;
        let mut violations = Vec::new();
        let mut seen_uris = HashSet::new();
        let mut listed = 0u64;

        for (index, item) in snapshot.items.iter().enumerate() {
            let expected = TokenId::new(index as u64 + 1);
            if item.token_id != expected {
                violations.push(Violation {
                    token_id: Some(item.token_id),
                    kind: ViolationKind::TokenIdGap,
                    description: format!("expected token id {expected}, found {}", item.token_id),
                });
            }

            if !seen_uris.insert(item.token_uri.as_str()) {
                violations.push(Violation {
                    token_id: Some(item.token_id),
                    kind: ViolationKind::DuplicateUri,
                    description: format!("token URI {:?} minted more than once", item.token_uri),
                });
            }

            if !snapshot.used_uris.contains(&item.token_uri) {
                violations.push(Violation {
                    token_id: Some(item.token_id),
                    kind: ViolationKind::UnregisteredUri,
                    description: "token URI missing from the used-URI set".into(),
                });
            }

            if item.is_listed {
                listed += 1;
            }
        }

        for uri in &snapshot.used_uris {
            if !seen_uris.contains(uri.as_str()) {
                violations.push(Violation {
                    token_id: None,
                    kind: ViolationKind::OrphanUri,
                    description: format!("used URI {uri:?} has no minted item"),
                });
            }
        }

        let supply = snapshot.items.len() as u64;
        if snapshot.next_token_id.get() != supply + 1 {
            violations.push(Violation {
                token_id: Some(snapshot.next_token_id),
                kind: ViolationKind::CounterMismatch,
                description: format!(
                    "next token id {} does not follow supply {supply}",
                    snapshot.next_token_id
                ),
            });
        }

        if snapshot.listed_items_count != listed {
            violations.push(Violation {
                token_id: None,
                kind: ViolationKind::ListedCountMismatch,
                description: format!(
                    "listed counter is {}, scan found {listed}",
                    snapshot.listed_items_count
                ),
            });
        }

        Ok(ValidationReport {
            total_supply: supply,
            listed_items_count: snapshot.listed_items_count,
            last_seq: snapshot.last_seq,
            violations,
        })
    }
}
