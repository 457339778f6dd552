//! Application configuration for the candidate enrichment engine.
//!
//! User config lives at `~/.ndc-candidates/ndc-candidates.toml`.
//! Missing sections and keys fall back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{NdcError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ndc-candidates.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ndc-candidates";

// ---------------------------------------------------------------------------
// Config structs (matching ndc-candidates.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where engine state is persisted.
    #[serde(default)]
    pub storage: StorageConfig,

    /// External data sources.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Per-invocation limits.
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Rate-limit retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Where provider keys are read from.
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL state database.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "var/ndc-candidates.db".into()
}

/// `[upstream]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Listing, voters, tx-count, balance and bridge API.
    #[serde(default = "default_pikespeak_url")]
    pub pikespeak_url: String,
    /// Account info API.
    #[serde(default = "default_nearblocks_url")]
    pub nearblocks_url: String,
    /// NFT holdings API.
    #[serde(default = "default_pagoda_url")]
    pub pagoda_url: String,
    /// JSON-RPC endpoint used for on-chain `ft_metadata` queries.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Public token price listing.
    #[serde(default = "default_prices_url")]
    pub prices_url: String,
    /// Contract the nominations are listed from.
    #[serde(default = "default_nominations_contract")]
    pub nominations_contract: String,
    /// Contract the votes are cast on.
    #[serde(default = "default_elections_contract")]
    pub elections_contract: String,
    /// Contract id the balance API uses for the native-currency row.
    #[serde(default = "default_native_sentinel")]
    pub native_sentinel: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            pikespeak_url: default_pikespeak_url(),
            nearblocks_url: default_nearblocks_url(),
            pagoda_url: default_pagoda_url(),
            rpc_url: default_rpc_url(),
            prices_url: default_prices_url(),
            nominations_contract: default_nominations_contract(),
            elections_contract: default_elections_contract(),
            native_sentinel: default_native_sentinel(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_pikespeak_url() -> String {
    "https://api.pikespeak.ai".into()
}
fn default_nearblocks_url() -> String {
    "https://api.nearblocks.io".into()
}
fn default_pagoda_url() -> String {
    "https://near-mainnet.api.pagoda.co".into()
}
fn default_rpc_url() -> String {
    "https://rpc.mainnet.near.org".into()
}
fn default_prices_url() -> String {
    "https://raw.githubusercontent.com/Tarnadas/token-prices/main/ref-prices.json".into()
}
fn default_nominations_contract() -> String {
    "nominations.ndc-gwg.near".into()
}
fn default_elections_contract() -> String {
    "elections.ndc-gwg.near".into()
}
fn default_native_sentinel() -> String {
    "Near".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[cycle]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Maximum candidates advanced per invocation.
    #[serde(default = "default_max_entities")]
    pub max_entities: usize,
    /// Outbound call count at which no further candidate is started.
    #[serde(default = "default_call_budget")]
    pub call_budget: u32,
    /// Offset step of the seed listing API.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_entities: default_max_entities(),
            call_budget: default_call_budget(),
            page_size: default_page_size(),
        }
    }
}

fn default_max_entities() -> usize {
    3
}
fn default_call_budget() -> u32 {
    40
}
fn default_page_size() -> usize {
    50
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first 429 response.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent one.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

fn default_max_retries() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    250
}

/// `[credentials]` section: env var names, never the keys themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_pikespeak_key_env")]
    pub pikespeak_key_env: String,
    #[serde(default = "default_pagoda_key_env")]
    pub pagoda_key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            pikespeak_key_env: default_pikespeak_key_env(),
            pagoda_key_env: default_pagoda_key_env(),
        }
    }
}

fn default_pikespeak_key_env() -> String {
    "PIKESPEAK_API_KEY".into()
}
fn default_pagoda_key_env() -> String {
    "PAGODA_API_KEY".into()
}

// ---------------------------------------------------------------------------
// Credentials (runtime, resolved from env)
// ---------------------------------------------------------------------------

/// Provider keys carried by a trigger and forwarded as request headers.
#[derive(Clone, Default)]
pub struct Credentials {
    pub pikespeak_api_key: String,
    pub pagoda_api_key: String,
}

impl Credentials {
    pub fn new(pikespeak_api_key: impl Into<String>, pagoda_api_key: impl Into<String>) -> Self {
        Self {
            pikespeak_api_key: pikespeak_api_key.into(),
            pagoda_api_key: pagoda_api_key.into(),
        }
    }

    /// Read both keys from the env vars named in the config. Missing vars
    /// resolve to empty keys, which upstreams reject on their own.
    pub fn from_env(config: &CredentialsConfig) -> Self {
        let read = |name: &str| std::env::var(name).unwrap_or_default();
        let creds = Self::new(read(&config.pikespeak_key_env), read(&config.pagoda_key_env));
        if creds.pikespeak_api_key.is_empty() {
            tracing::warn!(var = %config.pikespeak_key_env, "pikespeak API key not set");
        }
        if creds.pagoda_api_key.is_empty() {
            tracing::warn!(var = %config.pagoda_key_env, "pagoda API key not set");
        }
        creds
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("pikespeak_api_key", &"<redacted>")
            .field("pagoda_api_key", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ndc-candidates/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| NdcError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ndc-candidates/ndc-candidates.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NdcError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| NdcError::config(format!("failed to parse {}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NdcError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| NdcError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NdcError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configs the engine cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let upstream = &config.upstream;
    for (name, raw) in [
        ("pikespeak_url", &upstream.pikespeak_url),
        ("nearblocks_url", &upstream.nearblocks_url),
        ("pagoda_url", &upstream.pagoda_url),
        ("rpc_url", &upstream.rpc_url),
        ("prices_url", &upstream.prices_url),
    ] {
        Url::parse(raw)
            .map_err(|e| NdcError::config(format!("upstream.{name} '{raw}' is not a URL: {e}")))?;
    }
    if config.cycle.max_entities == 0 {
        return Err(NdcError::config("cycle.max_entities must be at least 1"));
    }
    if config.cycle.page_size == 0 {
        return Err(NdcError::config("cycle.page_size must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("db_path"));
        assert!(toml_str.contains("PIKESPEAK_API_KEY"));
        assert!(toml_str.contains("api.pikespeak.ai"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[cycle]
call_budget = 10

[upstream]
pikespeak_url = "http://127.0.0.1:9000"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.cycle.call_budget, 10);
        assert_eq!(config.cycle.max_entities, 3);
        assert_eq!(config.cycle.page_size, 50);
        assert_eq!(config.upstream.pikespeak_url, "http://127.0.0.1:9000");
        assert_eq!(config.upstream.native_sentinel, "Near");
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn retry_delay_doubles() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(0), Duration::from_millis(250));
        assert_eq!(retry.delay_for(1), Duration::from_millis(500));
        assert_eq!(retry.delay_for(4), Duration::from_millis(4000));
    }

    #[test]
    fn validation_rejects_bad_url() {
        let mut config = AppConfig::default();
        config.upstream.rpc_url = "not a url".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("upstream.rpc_url"));
    }

    #[test]
    fn validation_rejects_zero_entities() {
        let mut config = AppConfig::default();
        config.cycle.max_entities = 0;
        assert!(validate_config(&config).is_err());
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("secret-a", "secret-b");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret-a"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn credentials_from_unset_env_are_empty() {
        let config = CredentialsConfig {
            pikespeak_key_env: "NDC_TEST_NONEXISTENT_KEY_A".into(),
            pagoda_key_env: "NDC_TEST_NONEXISTENT_KEY_B".into(),
        };
        let creds = Credentials::from_env(&config);
        assert!(creds.pikespeak_api_key.is_empty());
        assert!(creds.pagoda_api_key.is_empty());
    }
}
