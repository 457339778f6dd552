//! One-time discovery of the candidate universe.

use tracing::{info, instrument};

use ndc_fetch::Upstream;
use ndc_shared::{CandidateMap, CandidateRecord, Credentials, Result};

use crate::budget::CallBudget;

/// Page through the nominations listing until an empty page and return a
/// stub for every row.
///
/// Nothing is written here; any error discards the whole map.
#[instrument(skip(upstream, creds, budget))]
pub async fn seed(
    upstream: &Upstream,
    creds: &Credentials,
    page_size: usize,
    budget: &mut CallBudget,
) -> Result<CandidateMap> {
    let mut candidates = CandidateMap::new();
    let mut offset = 0;
    let mut pages = 0;

    loop {
        budget.charge();
        let rows = upstream.candidates_page(creds, offset).await?;
        if rows.is_empty() {
            break;
        }
        pages += 1;
        for row in rows {
            candidates.insert(
                row.nominee.clone(),
                CandidateRecord::stub(row.nominee, row.house, row.timestamp),
            );
        }
        offset += page_size;
    }

    info!(pages, candidates = candidates.len(), "candidate universe discovered");
    Ok(candidates)
}
