//! Key-value persistence for contacts and message templates.
//!
//! Three backends share the [`KvStore`] trait: a JSON file (default), Postgres
//! (when `DATABASE_URL` is set) and an in-memory map (ephemeral mode and tests).

pub mod contacts;
pub mod file;
pub mod memory;
pub mod pg;

pub use contacts::ContactStore;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use pg::PgStore;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// String-keyed, string-valued persistence.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    fn name(&self) -> &str;

    /// Returns `Ok(None)` if the key was never written.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Create or replace a single key.
    async fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Write several keys. Backends that can do it atomically override this.
    async fn put_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        for (key, value) in entries {
            self.put(key, value).await?;
        }
        Ok(())
    }
}
