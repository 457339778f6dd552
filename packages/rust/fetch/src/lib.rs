//! Outbound HTTP for the enrichment engine.
//!
//! This crate provides:
//! - [`ResilientClient`]: 429 backoff and typed JSON decoding
//! - [`Upstream`]: one method per external call the engine makes
//! - [`schema`]: the response shapes each call is validated against

pub mod client;
pub mod schema;
pub mod upstream;

pub use client::ResilientClient;
pub use schema::{AccountInfo, BalanceRow, CandidateRow, FtMetadataPayload, NftCount};
pub use upstream::Upstream;
