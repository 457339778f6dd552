//! Candidate enrichment engine.
//!
//! This crate ties the upstream clients and the state store together:
//! seeding the candidate universe, the round-robin enrichment cycle, the
//! reference caches and the price sheet, all behind a single owner task.

pub mod budget;
pub mod cycle;
pub mod engine;
pub mod handle;
pub mod price_sheet;
pub mod reference;
pub mod seeder;
pub mod view;

#[cfg(test)]
mod testutil;

pub use budget::CallBudget;
pub use cycle::{CycleFailure, EnrichmentStep};
pub use engine::{CycleReport, Engine, StoreState};
pub use handle::EngineHandle;
pub use price_sheet::PriceSheet;
pub use reference::ReferenceCaches;
pub use view::StoreView;
