//! Read-only snapshot of a persisted store, for inspection without an engine.

use ndc_shared::{CandidateRecord, FungibleMetadata, NdcError, NonFungibleMetadata, Result};
use ndc_storage::{PersistedState, Storage};

/// The persisted state as last written by the engine. Never touches the
/// network and never writes.
#[derive(Debug, Clone)]
pub struct StoreView {
    state: PersistedState,
}

impl StoreView {
    pub async fn load(storage: &Storage) -> Result<Self> {
        Ok(Self {
            state: storage.load_state().await?,
        })
    }

    /// Every candidate record, in key order. Fails until the first seed.
    pub fn candidates(&self) -> Result<Vec<CandidateRecord>> {
        self.state
            .candidates
            .as_ref()
            .map(|c| c.values().cloned().collect())
            .ok_or(NdcError::NotSeeded)
    }

    pub fn ft_metas(&self) -> Vec<FungibleMetadata> {
        self.state.ft_metas.values().cloned().collect()
    }

    pub fn nft_metas(&self) -> Vec<NonFungibleMetadata> {
        self.state.nft_metas.values().cloned().collect()
    }
}
