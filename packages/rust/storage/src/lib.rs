//! libSQL-backed durable state for the enrichment engine.
//!
//! The [`Storage`] struct wraps a local libSQL database holding four
//! independently addressable entries: the round-robin cursor, the compressed
//! candidate map, and the two reference-metadata caches.
//!
//! **Access rules:**
//! - The engine: read-write (sole writer) via [`Storage::open`]
//! - Inspection tools: read-only via [`Storage::open_readonly`]

pub mod codec;
mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use ndc_shared::{CandidateMap, FtMetaMap, NdcError, NftMetaMap, Result};

pub use codec::{decode_candidates, encode_candidates};

/// Key of the round-robin cursor entry.
pub const KEY_INDEX: &str = "index";
/// Key of the compressed candidate map entry.
pub const KEY_CANDIDATES: &str = "candidates";
/// Key of the fungible-token metadata entry.
pub const KEY_FT_METAS: &str = "ftMetas";
/// Key of the non-fungible-token metadata entry.
pub const KEY_NFT_METAS: &str = "nftMetas";

/// Everything the engine loads before serving its first request.
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    /// Cursor into the sorted candidate keys (0 when never written).
    pub cursor: usize,
    /// `None` until the first successful seed was committed.
    pub candidates: Option<CandidateMap>,
    pub ft_metas: FtMetaMap,
    pub nft_metas: NftMetaMap,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NdcError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| NdcError::Storage(e.to_string()))?;

        let conn = db.connect().map_err(|e| NdcError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NdcError::Storage(format!(
                "no state database at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| NdcError::Storage(e.to_string()))?;

        let conn = db.connect().map_err(|e| NdcError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    NdcError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(NdcError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Raw entries
    // -----------------------------------------------------------------------

    /// Read the raw bytes stored under `key`.
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM state WHERE key = ?1", params![key])
            .await
            .map_err(|e| NdcError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row.get::<Vec<u8>>(0)
                    .map_err(|e| NdcError::Storage(format!("read {key}: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(NdcError::Storage(e.to_string())),
        }
    }

    /// Replace the bytes stored under `key`.
    async fn put_raw(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at",
                params![key, value, now.as_str()],
            )
            .await
            .map_err(|e| NdcError::Storage(format!("write {key}: {e}")))?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| NdcError::Codec(format!("decode {key}: {e}"))),
            None => Ok(None),
        }
    }

    async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| NdcError::Codec(format!("encode {key}: {e}")))?;
        self.put_raw(key, bytes).await
    }

    // -----------------------------------------------------------------------
    // Typed entries
    // -----------------------------------------------------------------------

    /// Load the persisted cursor, defaulting to 0.
    pub async fn load_cursor(&self) -> Result<usize> {
        Ok(self.get_json::<usize>(KEY_INDEX).await?.unwrap_or(0))
    }

    pub async fn save_cursor(&self, cursor: usize) -> Result<()> {
        self.put_json(KEY_INDEX, &cursor).await
    }

    /// Load the candidate map; `None` means the store was never seeded.
    pub async fn load_candidates(&self) -> Result<Option<CandidateMap>> {
        match self.get_raw(KEY_CANDIDATES).await? {
            Some(blob) => Ok(Some(decode_candidates(&blob)?)),
            None => Ok(None),
        }
    }

    pub async fn save_candidates(&self, candidates: &CandidateMap) -> Result<()> {
        let blob = encode_candidates(candidates)?;
        tracing::debug!(
            candidates = candidates.len(),
            bytes = blob.len(),
            "writing candidate blob"
        );
        self.put_raw(KEY_CANDIDATES, blob).await
    }

    pub async fn load_ft_metas(&self) -> Result<FtMetaMap> {
        Ok(self.get_json(KEY_FT_METAS).await?.unwrap_or_default())
    }

    pub async fn save_ft_metas(&self, metas: &FtMetaMap) -> Result<()> {
        self.put_json(KEY_FT_METAS, metas).await
    }

    pub async fn load_nft_metas(&self) -> Result<NftMetaMap> {
        Ok(self.get_json(KEY_NFT_METAS).await?.unwrap_or_default())
    }

    pub async fn save_nft_metas(&self, metas: &NftMetaMap) -> Result<()> {
        self.put_json(KEY_NFT_METAS, metas).await
    }

    /// Load all four entries.
    pub async fn load_state(&self) -> Result<PersistedState> {
        let state = PersistedState {
            cursor: self.load_cursor().await?,
            candidates: self.load_candidates().await?,
            ft_metas: self.load_ft_metas().await?,
            nft_metas: self.load_nft_metas().await?,
        };
        tracing::info!(
            cursor = state.cursor,
            seeded = state.candidates.is_some(),
            candidates = state.candidates.as_ref().map_or(0, |c| c.len()),
            ft_metas = state.ft_metas.len(),
            nft_metas = state.nft_metas.len(),
            "loaded persisted state"
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndc_shared::{CandidateRecord, FungibleMetadata, NonFungibleMetadata};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("ndc_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ndc_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn fresh_store_is_unseeded() {
        let storage = test_storage().await;
        let state = storage.load_state().await.expect("load");
        assert_eq!(state.cursor, 0);
        assert!(state.candidates.is_none());
        assert!(state.ft_metas.is_empty());
        assert!(state.nft_metas.is_empty());
    }

    #[tokio::test]
    async fn cursor_overwrites() {
        let storage = test_storage().await;
        storage.save_cursor(7).await.expect("save");
        storage.save_cursor(2).await.expect("save again");
        assert_eq!(storage.load_cursor().await.expect("load"), 2);
    }

    #[tokio::test]
    async fn entries_are_independent() {
        let storage = test_storage().await;

        let mut candidates = CandidateMap::new();
        candidates.insert(
            "a.near".into(),
            CandidateRecord::stub("a.near", "HouseOfMerit", "1"),
        );
        storage.save_candidates(&candidates).await.expect("save candidates");

        let mut nfts = NftMetaMap::new();
        nfts.insert(
            "nft.near".into(),
            NonFungibleMetadata {
                contract_id: "nft.near".into(),
                name: "Example".into(),
                symbol: "EX".into(),
            },
        );
        storage.save_nft_metas(&nfts).await.expect("save nfts");

        let state = storage.load_state().await.expect("load");
        assert_eq!(state.candidates, Some(candidates));
        assert_eq!(state.nft_metas, nfts);
        assert!(state.ft_metas.is_empty());
        assert_eq!(state.cursor, 0);
    }

    #[tokio::test]
    async fn ft_metas_keep_price() {
        let storage = test_storage().await;
        let mut fts = FtMetaMap::new();
        fts.insert(
            "token.near".into(),
            FungibleMetadata {
                contract_id: "token.near".into(),
                name: "Token".into(),
                symbol: "TKN".into(),
                decimals: 24,
                price: Some(1.23),
            },
        );
        storage.save_ft_metas(&fts).await.expect("save");
        let loaded = storage.load_ft_metas().await.expect("load");
        assert_eq!(loaded["token.near"].price, Some(1.23));
    }

    #[tokio::test]
    async fn corrupt_candidate_blob_is_reported() {
        let storage = test_storage().await;
        storage
            .put_raw(KEY_CANDIDATES, b"garbage".to_vec())
            .await
            .expect("write raw");
        let err = storage.load_candidates().await.unwrap_err();
        assert!(matches!(err, NdcError::Codec(_)));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("ndc_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.save_cursor(4).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.load_cursor().await.unwrap(), 4);
        let result = ro.save_cursor(5).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("ndc_test_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
        assert!(!tmp.exists());
    }
}
