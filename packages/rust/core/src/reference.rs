//! Reference-id keyed metadata shared by all candidates.
//!
//! Fungible metadata is created once and never refreshed. Non-fungible
//! metadata is overwritten every time a holding is observed.

use std::collections::HashMap;

use ndc_fetch::{FtMetadataPayload, NftCount};
use ndc_shared::{FtMetaMap, FungibleMetadata, NftMetaMap, NonFungibleMetadata};

/// The fungible and non-fungible metadata caches.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCaches {
    pub ft: FtMetaMap,
    pub nft: NftMetaMap,
}

impl ReferenceCaches {
    pub fn new(ft: FtMetaMap, nft: NftMetaMap) -> Self {
        Self { ft, nft }
    }

    /// Whether fungible metadata already exists for `contract_id`.
    pub fn knows_ft(&self, contract_id: &str) -> bool {
        self.ft.contains_key(contract_id)
    }

    /// Create fungible metadata for `contract_id` unless it already exists.
    ///
    /// `price` is whatever the price sheet holds right now; it is never
    /// revisited for this entry afterwards.
    pub fn create_ft(
        &mut self,
        contract_id: &str,
        payload: FtMetadataPayload,
        price: Option<f64>,
    ) -> &FungibleMetadata {
        self.ft
            .entry(contract_id.to_string())
            .or_insert_with(|| FungibleMetadata {
                contract_id: contract_id.to_string(),
                name: payload.name,
                symbol: payload.symbol,
                decimals: payload.decimals,
                price,
            })
    }

    /// Insert or overwrite the metadata carried inline with an NFT position.
    pub fn upsert_nft(&mut self, holding: &NftCount) {
        self.nft.insert(
            holding.contract_account_id.clone(),
            NonFungibleMetadata {
                contract_id: holding.contract_account_id.clone(),
                name: holding.contract_metadata.name.clone(),
                symbol: holding.contract_metadata.symbol.clone(),
            },
        );
    }

    /// Attach freshly loaded prices to existing fungible entries.
    /// Returns how many entries received a price.
    pub fn attach_prices(&mut self, prices: &HashMap<String, f64>) -> usize {
        let mut attached = 0;
        for (contract_id, price) in prices {
            if let Some(meta) = self.ft.get_mut(contract_id) {
                meta.price = Some(*price);
                attached += 1;
            }
        }
        attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndc_fetch::schema::NftContractMetadata;

    fn payload(name: &str) -> FtMetadataPayload {
        FtMetadataPayload {
            name: name.into(),
            symbol: name.to_uppercase(),
            decimals: 18,
        }
    }

    fn nft(contract: &str, name: &str) -> NftCount {
        NftCount {
            contract_account_id: contract.into(),
            nft_count: 1,
            contract_metadata: NftContractMetadata {
                name: name.into(),
                symbol: "SYM".into(),
            },
        }
    }

    #[test]
    fn ft_entry_is_created_once() {
        let mut caches = ReferenceCaches::default();
        caches.create_ft("t.near", payload("first"), Some(2.0));
        let meta = caches.create_ft("t.near", payload("second"), None);
        assert_eq!(meta.name, "first");
        assert_eq!(meta.price, Some(2.0));
        assert!(caches.knows_ft("t.near"));
    }

    #[test]
    fn nft_entry_is_overwritten() {
        let mut caches = ReferenceCaches::default();
        caches.upsert_nft(&nft("n.near", "Old"));
        caches.upsert_nft(&nft("n.near", "New"));
        assert_eq!(caches.nft.len(), 1);
        assert_eq!(caches.nft["n.near"].name, "New");
    }

    #[test]
    fn prices_attach_only_to_existing_entries() {
        let mut caches = ReferenceCaches::default();
        caches.create_ft("a.near", payload("a"), None);

        let prices = HashMap::from([("a.near".to_string(), 1.5), ("b.near".to_string(), 9.0)]);
        assert_eq!(caches.attach_prices(&prices), 1);
        assert_eq!(caches.ft["a.near"].price, Some(1.5));
        assert!(!caches.knows_ft("b.near"));
    }
}
