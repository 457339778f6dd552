//! The engine state machine: one instance per store.
//!
//! [`Engine`] owns the persisted state once loaded and serves triggers and
//! reads against it. It is not shared; [`crate::EngineHandle`] serializes
//! access from any number of callers.

use tracing::{error, info, instrument, warn};

use ndc_fetch::Upstream;
use ndc_shared::{
    CandidateMap, CandidateRecord, Credentials, CycleConfig, FungibleMetadata, NdcError,
    NonFungibleMetadata, Result,
};
use ndc_storage::{KEY_CANDIDATES, KEY_FT_METAS, KEY_INDEX, KEY_NFT_METAS, Storage};

use crate::budget::CallBudget;
use crate::cycle::{CycleContext, CycleFailure, run_round_robin};
use crate::price_sheet::PriceSheet;
use crate::reference::ReferenceCaches;
use crate::seeder;

/// Lifecycle of the candidate store.
#[derive(Debug, Clone, Default)]
pub enum StoreState {
    /// No seed has been committed. Reads fail; a trigger seeds first.
    #[default]
    Uninitialized,
    /// A seed is in flight.
    Seeding,
    /// The store exists and can be enriched and read.
    Ready(CandidateMap),
}

impl StoreState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Summary of one completed trigger.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// This invocation committed the initial seed.
    pub seeded: bool,
    /// Candidates fully enriched in this cycle.
    pub advanced: usize,
    /// Cursor after the cycle.
    pub cursor: usize,
    /// Size of the candidate universe.
    pub candidates: usize,
    /// Outbound calls made, including the price sheet and seed pages.
    pub calls: u32,
    pub stopped_on_budget: bool,
    /// The enrichment step that ended the loop early, if any.
    pub failure: Option<CycleFailure>,
    /// Whether every state entry was written back.
    pub persisted: bool,
}

impl CycleReport {
    /// A completed cycle answers with no body, whatever happened inside it.
    pub fn status_code(&self) -> u16 {
        204
    }
}

/// The single writer over a candidate store.
pub struct Engine {
    storage: Storage,
    upstream: Upstream,
    config: CycleConfig,
    state: StoreState,
    cursor: usize,
    caches: ReferenceCaches,
    prices: PriceSheet,
    budget: CallBudget,
}

impl Engine {
    /// Load persisted state. Nothing is served before this returns.
    pub async fn load(storage: Storage, upstream: Upstream, config: CycleConfig) -> Result<Self> {
        let persisted = storage.load_state().await?;
        let state = match persisted.candidates {
            Some(candidates) => StoreState::Ready(candidates),
            None => StoreState::Uninitialized,
        };

        Ok(Self {
            storage,
            upstream,
            budget: CallBudget::new(config.call_budget),
            config,
            state,
            cursor: persisted.cursor,
            caches: ReferenceCaches::new(persisted.ft_metas, persisted.nft_metas),
            prices: PriceSheet::default(),
        })
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    /// Run one invocation: price sheet, seed if needed, one enrichment cycle,
    /// then write everything back.
    ///
    /// Only a failed price sheet or a failed seed return an error. Enrichment
    /// failures are reported in the [`CycleReport`].
    #[instrument(skip_all, fields(max_entities = self.config.max_entities, call_budget = self.config.call_budget))]
    pub async fn trigger(&mut self, creds: &Credentials) -> Result<CycleReport> {
        self.budget.reset();

        if let Err(e) = self
            .prices
            .ensure_loaded(&self.upstream, &mut self.budget, &mut self.caches)
            .await
        {
            error!(error = %e, "price sheet unavailable, aborting invocation");
            return Err(e);
        }

        let seeded = !self.state.is_ready();
        if seeded {
            self.seed(creds).await?;
        }

        let StoreState::Ready(candidates) = &mut self.state else {
            return Err(NdcError::NotSeeded);
        };
        let total = candidates.len();
        let mut ctx = CycleContext {
            upstream: &self.upstream,
            creds,
            budget: &mut self.budget,
            caches: &mut self.caches,
            prices: &self.prices,
        };
        let outcome =
            run_round_robin(candidates, self.cursor, self.config.max_entities, &mut ctx).await;
        self.cursor = outcome.cursor;

        let persisted = self.persist().await;

        Ok(CycleReport {
            seeded,
            advanced: outcome.advanced,
            cursor: outcome.cursor,
            candidates: total,
            calls: self.budget.used(),
            stopped_on_budget: outcome.stopped_on_budget,
            failure: outcome.failure,
            persisted,
        })
    }

    /// Discover and commit the candidate universe. On any failure, including
    /// the commit, the store stays absent and the next trigger starts over.
    async fn seed(&mut self, creds: &Credentials) -> Result<()> {
        self.state = StoreState::Seeding;

        let result = match seeder::seed(
            &self.upstream,
            creds,
            self.config.page_size,
            &mut self.budget,
        )
        .await
        {
            Ok(candidates) => self
                .storage
                .save_candidates(&candidates)
                .await
                .map(|()| candidates),
            Err(e) => Err(e),
        };

        match result {
            Ok(candidates) => {
                info!(candidates = candidates.len(), "candidate store seeded");
                self.state = StoreState::Ready(candidates);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "seeding failed, store left absent");
                self.state = StoreState::Uninitialized;
                Err(NdcError::SeedFailed(e.to_string()))
            }
        }
    }

    /// Write all four entries, each independently. Failures are logged only.
    async fn persist(&self) -> bool {
        let StoreState::Ready(candidates) = &self.state else {
            return false;
        };

        let results = [
            (KEY_INDEX, self.storage.save_cursor(self.cursor).await),
            (KEY_CANDIDATES, self.storage.save_candidates(candidates).await),
            (KEY_FT_METAS, self.storage.save_ft_metas(&self.caches.ft).await),
            (KEY_NFT_METAS, self.storage.save_nft_metas(&self.caches.nft).await),
        ];

        let mut persisted = true;
        for (key, result) in results {
            if let Err(e) = result {
                warn!(key, error = %e, "failed to persist state entry");
                persisted = false;
            }
        }
        persisted
    }

    // -- reads ---------------------------------------------------------------

    /// Every candidate record, in key order.
    pub fn candidates(&self) -> Result<Vec<CandidateRecord>> {
        match &self.state {
            StoreState::Ready(candidates) => Ok(candidates.values().cloned().collect()),
            _ => Err(NdcError::NotSeeded),
        }
    }

    pub fn ft_metas(&self) -> Vec<FungibleMetadata> {
        self.caches.ft.values().cloned().collect()
    }

    pub fn nft_metas(&self) -> Vec<NonFungibleMetadata> {
        self.caches.nft.values().cloned().collect()
    }
}
