//! Process-lifetime token price sheet.

use std::collections::HashMap;

use tracing::info;

use ndc_fetch::Upstream;
use ndc_shared::Result;

use crate::budget::CallBudget;
use crate::reference::ReferenceCaches;

/// Token prices fetched once per engine process. Never persisted.
#[derive(Debug, Default)]
pub struct PriceSheet {
    prices: Option<HashMap<String, f64>>,
}

impl PriceSheet {
    pub fn is_loaded(&self) -> bool {
        self.prices.is_some()
    }

    /// Price for `contract_id`, if the sheet is loaded and lists it.
    pub fn price(&self, contract_id: &str) -> Option<f64> {
        self.prices.as_ref()?.get(contract_id).copied()
    }

    /// Fetch the sheet unless this process already has it, attaching prices
    /// to fungible metadata that already exists.
    ///
    /// A failed fetch leaves the sheet unloaded so the next invocation tries
    /// again.
    pub async fn ensure_loaded(
        &mut self,
        upstream: &Upstream,
        budget: &mut CallBudget,
        caches: &mut ReferenceCaches,
    ) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        budget.charge();
        let prices = upstream.price_sheet().await?;
        let attached = caches.attach_prices(&prices);
        info!(prices = prices.len(), attached, "price sheet loaded");
        self.prices = Some(prices);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn from_prices(prices: HashMap<String, f64>) -> Self {
        Self {
            prices: Some(prices),
        }
    }
}
