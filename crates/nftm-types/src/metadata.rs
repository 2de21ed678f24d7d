use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Attribute categories an NFT can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraitKind {
    Attack,
    Health,
    Speed,
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Attack => "attack",
            Self::Health => "health",
            Self::Speed => "speed",
        };
        write!(f, "{s}")
    }
}

/// A single `trait_type`/`value` pair of the metadata document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftAttribute {
    pub trait_type: TraitKind,
    pub value: String,
}

/// Off-chain metadata document a token URI resolves to.
///
/// The ledger stores only the URI; this type exists for the layers that
/// fetch and render the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMeta {
    pub name: String,
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<NftAttribute>,
}

impl NftMeta {
    pub fn from_json(json: &str) -> Result<Self, TypeError> {
        serde_json::from_str(json).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, TypeError> {
        serde_json::to_string_pretty(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Value of the first attribute of the given kind, if any.
    pub fn attribute(&self, kind: TraitKind) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.trait_type == kind)
            .map(|a| a.value.as_str())
    }
}
