//! Core domain types: candidates and the reference-id metadata caches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The candidate store: entity id to record, iterated in sorted key order.
pub type CandidateMap = BTreeMap<String, CandidateRecord>;

/// Fungible-token metadata keyed by contract id.
pub type FtMetaMap = BTreeMap<String, FungibleMetadata>;

/// Non-fungible-token metadata keyed by contract id.
pub type NftMetaMap = BTreeMap<String, NonFungibleMetadata>;

// ---------------------------------------------------------------------------
// CandidateRecord
// ---------------------------------------------------------------------------

/// A nominated candidate and everything enrichment has learned about it.
///
/// Only `nominee`, `house` and `timestamp` are known after seeding; every
/// other field stays `None` until the matching enrichment step succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    /// Account id of the candidate (the store key).
    pub nominee: String,
    /// House the candidate was nominated for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house: Option<String>,
    /// Nomination timestamp as reported by the listing API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Accounts that voted for this candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voters: Option<Vec<String>>,
    /// Native balance in yocto units, kept as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Block timestamp of account creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_count: Option<u64>,
    /// Fungible holdings, native currency excluded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fts: Option<Vec<FtHolding>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfts: Option<Vec<NftHolding>>,
    /// Probable associated Ethereum addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_addresses: Option<Vec<String>>,
}

impl CandidateRecord {
    /// Create a seed-time stub.
    pub fn stub(
        nominee: impl Into<String>,
        house: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            nominee: nominee.into(),
            house: Some(house.into()),
            timestamp: Some(timestamp.into()),
            ..Self::default()
        }
    }

    /// Whether every enrichment field has been populated at least once.
    pub fn is_enriched(&self) -> bool {
        self.voters.is_some()
            && self.amount.is_some()
            && self.created.is_some()
            && self.tx_count.is_some()
            && self.fts.is_some()
            && self.nfts.is_some()
            && self.eth_addresses.is_some()
    }
}

/// A fungible-token position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtHolding {
    pub contract_id: String,
    /// Raw amount in the token's smallest unit.
    pub amount: String,
}

/// A non-fungible-token position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftHolding {
    pub contract_id: String,
    pub quantity: u64,
}

// ---------------------------------------------------------------------------
// Reference metadata
// ---------------------------------------------------------------------------

/// Metadata for a fungible-token contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FungibleMetadata {
    pub contract_id: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Price from the price sheet, if it was known when the entry was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Metadata for a non-fungible-token contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonFungibleMetadata {
    pub contract_id: String,
    pub name: String,
    pub symbol: String,
}
