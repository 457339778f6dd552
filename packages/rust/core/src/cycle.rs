//! Round-robin enrichment over the candidate store.
//!
//! Each candidate is enriched by an ordered list of [`EnrichmentStep`]s. A
//! step writes its field as soon as its call returns, so a failure part way
//! through leaves earlier fields updated and later ones untouched. The cursor
//! only moves past a candidate once all steps succeeded.

use tracing::{debug, error, info};

use ndc_fetch::Upstream;
use ndc_shared::{CandidateMap, CandidateRecord, Credentials, FtHolding, NdcError, NftHolding};

use crate::budget::CallBudget;
use crate::price_sheet::PriceSheet;
use crate::reference::ReferenceCaches;

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One field-update step of a candidate's enrichment, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentStep {
    Voters,
    Account,
    NftHoldings,
    TxCount,
    Balances,
    EthAddresses,
}

impl EnrichmentStep {
    /// All steps in the order they run.
    pub const ALL: [EnrichmentStep; 6] = [
        Self::Voters,
        Self::Account,
        Self::NftHoldings,
        Self::TxCount,
        Self::Balances,
        Self::EthAddresses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voters => "voters",
            Self::Account => "account",
            Self::NftHoldings => "nft_holdings",
            Self::TxCount => "tx_count",
            Self::Balances => "balances",
            Self::EthAddresses => "eth_addresses",
        }
    }
}

impl std::fmt::Display for EnrichmentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step that stopped a cycle, and why.
#[derive(Debug, Clone)]
pub struct CycleFailure {
    pub candidate: String,
    pub step: EnrichmentStep,
    pub error: String,
    /// The step failed on an external source rather than locally.
    pub upstream: bool,
}

/// What one pass of the round-robin loop did.
#[derive(Debug, Clone)]
pub struct RoundRobinOutcome {
    /// Cursor to persist.
    pub cursor: usize,
    /// Candidates fully enriched.
    pub advanced: usize,
    /// The loop ended because the call budget was used up.
    pub stopped_on_budget: bool,
    pub failure: Option<CycleFailure>,
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a cycle needs besides the candidate map.
pub struct CycleContext<'a> {
    pub upstream: &'a Upstream,
    pub creds: &'a Credentials,
    pub budget: &'a mut CallBudget,
    pub caches: &'a mut ReferenceCaches,
    pub prices: &'a PriceSheet,
}

impl CycleContext<'_> {
    /// Run every step for `record`, stopping at the first failure.
    pub async fn enrich(
        &mut self,
        record: &mut CandidateRecord,
    ) -> Result<(), (EnrichmentStep, NdcError)> {
        for step in EnrichmentStep::ALL {
            self.apply(step, record).await.map_err(|e| (step, e))?;
        }
        Ok(())
    }

    /// Run a single step and write its field.
    pub async fn apply(
        &mut self,
        step: EnrichmentStep,
        record: &mut CandidateRecord,
    ) -> ndc_shared::Result<()> {
        let id = record.nominee.clone();
        self.budget.charge();

        match step {
            EnrichmentStep::Voters => {
                record.voters = Some(self.upstream.voters(self.creds, &id).await?);
            }
            EnrichmentStep::Account => {
                let info = self.upstream.account(&id).await?;
                record.amount = Some(info.amount);
                record.created = Some(info.created);
            }
            EnrichmentStep::NftHoldings => {
                let nfts = self.upstream.nft_holdings(self.creds, &id).await?;
                for nft in &nfts {
                    self.caches.upsert_nft(nft);
                }
                record.nfts = Some(
                    nfts.into_iter()
                        .map(|n| NftHolding {
                            contract_id: n.contract_account_id,
                            quantity: n.nft_count,
                        })
                        .collect(),
                );
            }
            EnrichmentStep::TxCount => {
                record.tx_count = Some(self.upstream.tx_count(self.creds, &id).await?);
            }
            EnrichmentStep::Balances => {
                let rows = self.upstream.balances(self.creds, &id).await?;
                let native = self.upstream.native_sentinel();
                let holdings: Vec<FtHolding> = rows
                    .into_iter()
                    .filter(|row| row.contract != native)
                    .map(|row| FtHolding {
                        contract_id: row.contract,
                        amount: row.amount,
                    })
                    .collect();
                for holding in &holdings {
                    self.ensure_ft_metadata(&holding.contract_id).await;
                }
                record.fts = Some(holdings);
            }
            EnrichmentStep::EthAddresses => {
                record.eth_addresses = Some(self.upstream.eth_addresses(self.creds, &id).await?);
            }
        }
        Ok(())
    }

    /// Create fungible metadata for a contract seen for the first time.
    /// Failures leave the contract without metadata and are not reported.
    async fn ensure_ft_metadata(&mut self, contract_id: &str) {
        if self.caches.knows_ft(contract_id) {
            return;
        }
        self.budget.charge();
        match self.upstream.ft_metadata(contract_id).await {
            Some(payload) => {
                let meta = self
                    .caches
                    .create_ft(contract_id, payload, self.prices.price(contract_id));
                debug!(contract_id, symbol = %meta.symbol, price = ?meta.price, "ft metadata created");
            }
            None => debug!(contract_id, "no ft metadata, holding kept without it"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Enrich up to `max_entities` candidates starting at `cursor`.
///
/// Keys are taken in the map's sorted order. A new candidate is only started
/// while the budget allows it. Errors are logged and end the loop; they are
/// reported in the outcome, never returned.
pub async fn run_round_robin(
    candidates: &mut CandidateMap,
    cursor: usize,
    max_entities: usize,
    ctx: &mut CycleContext<'_>,
) -> RoundRobinOutcome {
    let keys: Vec<String> = candidates.keys().cloned().collect();
    let mut outcome = RoundRobinOutcome {
        cursor,
        advanced: 0,
        stopped_on_budget: false,
        failure: None,
    };

    if keys.is_empty() {
        info!("candidate store is empty, nothing to enrich");
        return outcome;
    }
    outcome.cursor %= keys.len();

    for _ in 0..max_entities {
        if !ctx.budget.allows_new_unit() {
            info!(
                used = ctx.budget.used(),
                limit = ctx.budget.limit(),
                "call budget reached"
            );
            outcome.stopped_on_budget = true;
            break;
        }

        let id = &keys[outcome.cursor];
        let Some(record) = candidates.get_mut(id) else {
            break;
        };
        info!(candidate = %id, "fetching information about candidate");

        match ctx.enrich(record).await {
            Ok(()) => {
                outcome.advanced += 1;
                outcome.cursor = (outcome.cursor + 1) % keys.len();
            }
            Err((step, e)) => {
                let upstream = e.is_upstream();
                error!(candidate = %id, %step, upstream, error = %e, "enrichment aborted");
                outcome.failure = Some(CycleFailure {
                    candidate: id.clone(),
                    step,
                    error: e.to_string(),
                    upstream,
                });
                break;
            }
        }
    }

    info!(
        cursor = outcome.cursor,
        total = keys.len(),
        advanced = outcome.advanced,
        "new index"
    );
    outcome
}
