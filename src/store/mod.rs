//! Persistence contract and the adapters behind it.
//!
//! Every backend implements [`Store`]. The JSON-file and key-value backends
//! share [`DocumentStore`], which keeps each collection as one serialized
//! list and commits with compare-and-swap; SQLite gets its own adapter.

mod document;
mod file;
mod kv;
mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};
use crate::db;
use crate::db::models::*;

pub use self::document::{Collection, DocumentBackend, DocumentStore, DocumentWrite};
pub use self::file::FileBackend;
pub use self::kv::{MemoryBackend, RedisBackend};
pub use self::sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too much contention on {0}")]
    Contention(String),
}

/// The full CRUD surface every backend provides.
#[async_trait]
pub trait Store: Send + Sync {
    /// Admin singleton, created with default credentials on first access.
    async fn admin_config(&self) -> Result<AdminConfig, StoreError>;

    /// Replaces the password if `current` matches verbatim.
    async fn update_admin_password(&self, current: &str, new: &str)
        -> Result<bool, StoreError>;

    async fn validate_admin(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        Ok(self.admin_config().await?.matches(username, password))
    }

    async fn records(&self) -> Result<Vec<AirdropRecord>, StoreError>;
    async fn record(&self, id: i64) -> Result<Option<AirdropRecord>, StoreError>;
    async fn create_record(&self, new: NewAirdropRecord) -> Result<AirdropRecord, StoreError>;
    async fn update_record(
        &self,
        id: i64,
        patch: AirdropPatch,
    ) -> Result<Option<AirdropRecord>, StoreError>;
    /// Removes the record and every comment attached to it.
    async fn delete_record(&self, id: i64) -> Result<bool, StoreError>;

    async fn dog_records(&self) -> Result<Vec<DogRecord>, StoreError>;
    async fn dog_record(&self, id: i64) -> Result<Option<DogRecord>, StoreError>;
    /// Fails with [`StoreError::Conflict`] if the contract address is taken.
    async fn create_dog_record(&self, new: NewDogRecord) -> Result<DogRecord, StoreError>;
    async fn update_dog_record(
        &self,
        id: i64,
        patch: DogPatch,
    ) -> Result<Option<DogRecord>, StoreError>;
    async fn delete_dog_record(&self, id: i64) -> Result<bool, StoreError>;

    async fn comments(&self) -> Result<Vec<Comment>, StoreError>;
    async fn comments_by_record(
        &self,
        record_id: i64,
        kind: RecordKind,
    ) -> Result<Vec<Comment>, StoreError>;
    /// Inserts the comment and bumps the parent's `comment_count` in one commit.
    async fn create_comment(&self, new: NewComment) -> Result<Comment, StoreError>;
    /// Removes the comment and decrements the parent's `comment_count` (floor 0).
    async fn delete_comment(&self, id: i64) -> Result<bool, StoreError>;
    async fn delete_comments_by_record(
        &self,
        record_id: i64,
        kind: RecordKind,
    ) -> Result<u64, StoreError>;
}

pub type DynStore = Arc<dyn Store>;

/// Counter adjustment shared by every backend.
pub(crate) fn adjust_count(count: i64, delta: i64) -> i64 {
    (count + delta).max(0)
}

/// Builds the backend named in the config. Called once at startup.
pub async fn open_store(config: &StorageConfig) -> anyhow::Result<DynStore> {
    let store: DynStore = match config.backend {
        StorageBackend::File => {
            let dir = config
                .path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage.path is not set"))?;
            tracing::info!("Using file storage at {}", dir.display());
            Arc::new(DocumentStore::new(FileBackend::open(dir)?))
        }
        StorageBackend::Sqlite => {
            let db_path = config
                .path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage.path is not set"))?;
            tracing::info!("Using SQLite storage at {}", db_path.display());
            let pool = db::create_pool(&db_path)?;
            db::run_migrations(&pool)?;
            Arc::new(SqliteStore::new(pool))
        }
        StorageBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage.redis_url is not set"))?;
            tracing::info!("Using Redis storage");
            Arc::new(DocumentStore::new(RedisBackend::connect(url).await?))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            Arc::new(DocumentStore::new(MemoryBackend::new()))
        }
    };
    Ok(store)
}
