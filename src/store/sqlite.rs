use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::SnapshotStore;
use crate::utils::error::StoreError;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    name TEXT PRIMARY KEY NOT NULL,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// Snapshots stored as rows of a single SQLite table, one row per query.
#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Opens (creating if needed) the database at `url` and ensures the table exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to an in-memory database sees its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn initialize(&self, names: &[String]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for name in names {
            sqlx::query("INSERT OR IGNORE INTO snapshots (name, payload, updated_at) VALUES (?, '', ?)")
                .bind(name)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_raw(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query("SELECT payload FROM snapshots WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get::<String, _>("payload").into_bytes()))
    }

    async fn save_raw(&self, name: &str, payload: &[u8]) -> Result<(), StoreError> {
        // Payloads are produced by serde_json and are always UTF-8.
        let payload = String::from_utf8_lossy(payload);

        sqlx::query(
            "INSERT INTO snapshots (name, payload, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
        )
        .bind(name)
        .bind(payload.as_ref())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
