use std::time::Duration;

use sqlx::PgPool;

use super::{KvStore, StoreError, StoreResult};

/// Postgres-backed store over the `plugwatch_kv` table.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect, run migrations, and wrap the pool.
    pub async fn connect(url: &str, timeout_secs: u64) -> StoreResult<Self> {
        let pool = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            sqlx::postgres::PgPoolOptions::new()
                .max_connections(4)
                .connect(url),
        )
        .await
        .map_err(|_| StoreError::Timeout(timeout_secs))??;

        sqlx::migrate!("../../migrations").run(&pool).await?;
        tracing::info!("database connected and migrations applied");
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl KvStore for PgStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM plugwatch_kv WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        upsert(&self.pool, key, value).await?;
        Ok(())
    }

    async fn put_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            upsert(&mut *tx, key, value).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

async fn upsert<'e, E>(executor: E, key: &str, value: &str) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO plugwatch_kv (key, value, updated_at) VALUES ($1, $2, now()) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(key)
    .bind(value)
    .execute(executor)
    .await?;
    Ok(())
}
