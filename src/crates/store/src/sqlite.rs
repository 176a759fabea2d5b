//! SQLite-backed document store.
//!
//! Each book is one row holding the serialized document plus a version
//! counter. Conditional updates run as an optimistic read-evaluate-write
//! loop: the write is guarded by `version`, so a racing writer forces a
//! re-read instead of a lost update. This preserves the per-document
//! compare-and-set contract of [`DocumentStore`] across processes sharing
//! the database file.

use crate::document::{Filter, Update};
use crate::error::{Result, StoreError};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Abandon a CAS loop after this many lost races.
const MAX_CAS_ATTEMPTS: u32 = 32;

/// SQLite implementation of [`DocumentStore`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStore {
    /// Connect to the given database URL (e.g. `sqlite:taletwo.db`) and run
    /// migrations. The database file is created when missing.
    pub async fn connect(url: &str) -> Result<Self> {
        debug!(url = %url, "connecting to document store");

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self {
            pool: Arc::new(pool),
        };
        store.run_migrations().await?;

        info!(url = %url, "document store ready");
        Ok(store)
    }

    /// Create an in-memory store with migrations applied. Test helper.
    pub async fn test_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self {
            pool: Arc::new(pool),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<(Value, i64)>> {
        let row = sqlx::query("SELECT doc, version FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let doc: String = row.get("doc");
        let version: i64 = row.get("version");
        Ok(Some((serde_json::from_str(&doc)?, version)))
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_one(&self, doc: Value) -> Result<()> {
        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Malformed("document missing string id".to_string()))?
            .to_string();
        let owner_id = doc
            .get("ownerId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        sqlx::query(
            "INSERT INTO books (id, owner_id, doc, version, updated_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(&id)
        .bind(&owner_id)
        .bind(doc.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn find_one(&self, id: &str) -> Result<Option<Value>> {
        Ok(self.fetch(id).await?.map(|(doc, _)| doc))
    }

    async fn update_one(&self, id: &str, filter: Filter, update: Update) -> Result<u64> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let Some((mut doc, version)) = self.fetch(id).await? else {
                return Ok(0);
            };
            if !filter.matches(&doc) {
                return Ok(0);
            }

            update.apply(&mut doc);

            let result = sqlx::query(
                "UPDATE books SET doc = ?, version = version + 1, updated_at = ?
                 WHERE id = ? AND version = ?",
            )
            .bind(doc.to_string())
            .bind(Utc::now().timestamp_millis())
            .bind(id)
            .bind(version)
            .execute(self.pool.as_ref())
            .await?;

            if result.rows_affected() == 1 {
                return Ok(1);
            }
            // Lost the race; re-read and re-evaluate the filter.
        }

        Err(StoreError::Conflict(id.to_string()))
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Value>> {
        let rows = sqlx::query("SELECT doc FROM books WHERE owner_id = ? ORDER BY updated_at DESC")
            .bind(owner_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter()
            .map(|row| {
                let doc: String = row.get("doc");
                serde_json::from_str(&doc).map_err(StoreError::from)
            })
            .collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}
