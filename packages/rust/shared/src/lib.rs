//! Shared types, error model, and configuration for the candidate engine.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`NdcError`]: the unified error type
//! - Domain types ([`CandidateRecord`], [`FungibleMetadata`], [`NonFungibleMetadata`])
//! - Configuration ([`AppConfig`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CredentialsConfig, Credentials, CycleConfig, RetryConfig, StorageConfig,
    UpstreamConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_config,
};
pub use error::{NdcError, Result};
pub use types::{
    CandidateMap, CandidateRecord, FtHolding, FtMetaMap, FungibleMetadata, NftHolding, NftMetaMap,
    NonFungibleMetadata,
};
