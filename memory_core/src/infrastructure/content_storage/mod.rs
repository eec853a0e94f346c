// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQLite-Backed Content Storage Service
//!
//! Implements [`ContentStorageService`] (§4.G) over a SQLite Operations
//! ledger with the two-phase queued write model:
//!
//! - Phase 1 ([`upsert`](ContentStorageService::upsert) /
//!   [`delete`](ContentStorageService::delete)) synchronously appends a
//!   row to `content_operations` and returns immediately.
//! - Phase 2 is a single background worker that periodically drains
//!   pending operations per `content_id`: it applies only the latest
//!   pending operation and marks every strictly earlier one cancelled
//!   (last-write-wins), committing both the cancellations and the
//!   applied write in one transaction.
//!
//! Schema setup uses inline `CREATE TABLE IF NOT EXISTS` rather than
//! `sqlx::migrate!` - see `DESIGN.md` for why. Queries use the runtime
//! `sqlx::query`/`query_scalar` builders rather than the `query!` family,
//! since the compile-time-checked macros require a reachable database at
//! build time.

use std::path::Path;

use async_trait::async_trait;
use semantic_memory_bootstrap::shutdown::{CancellationToken, ShutdownCoordinator};
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::{ContentRecord, ContentStorageService, UpsertRequest};
use semantic_memory_domain::value_objects::{DocumentId, IndexName};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

const DEFAULT_DRAIN_INTERVAL: std::time::Duration = std::time::Duration::from_millis(200);

/// `memory_domain` never depends on `sqlx` directly, so its `MemoryError`
/// has no `From<sqlx::Error>` - and one is not derivable here either:
/// neither type is local to this crate, so the orphan rule rules out a
/// `From` impl. A plain mapping function is the idiomatic workaround.
fn map_sqlx_error(e: sqlx::Error) -> MemoryError {
    MemoryError::storage(e.to_string())
}

/// The SQLite-backed reference implementation of the Content Storage
/// Service. Owns a background worker task draining the Operations
/// ledger; call [`SqliteContentStorageService::shutdown`] to stop it.
pub struct SqliteContentStorageService {
    pool: SqlitePool,
    cancel: CancellationToken,
    worker: AsyncMutex<Option<JoinHandle<()>>>,
}

impl SqliteContentStorageService {
    pub async fn connect(database_path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        Self::connect_with_interval(database_path, DEFAULT_DRAIN_INTERVAL).await
    }

    /// Like [`Self::connect`] but with an overridable drain tick.
    /// Integration tests use a short interval so convergence scenarios
    /// don't need multi-second sleeps.
    pub async fn connect_with_interval(database_path: impl AsRef<Path>, interval: std::time::Duration) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::new().filename(database_path.as_ref()).create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await.map_err(map_sqlx_error)?;
        Self::ensure_schema(&pool).await?;

        let cancel = ShutdownCoordinator::default().token();
        let worker = tokio::spawn(Self::run_worker(pool.clone(), cancel.clone(), interval));

        Ok(Self { pool, cancel, worker: AsyncMutex::new(Some(worker)) })
    }

    async fn ensure_schema(pool: &SqlitePool) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content_operations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id TEXT NOT NULL,
                op_type TEXT NOT NULL,
                index_name TEXT,
                document_id TEXT,
                tags_json TEXT,
                payload_json TEXT,
                created_at TEXT NOT NULL,
                complete INTEGER NOT NULL DEFAULT 0,
                cancelled INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content (
                content_id TEXT PRIMARY KEY,
                index_name TEXT NOT NULL,
                document_id TEXT NOT NULL,
                tags_json TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_content_operations_pending ON content_operations(content_id, complete, cancelled)")
            .execute(pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn run_worker(pool: SqlitePool, cancel: CancellationToken, interval: std::time::Duration) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(e) = Self::drain_once(&pool).await {
                tracing::warn!(target: "content_storage", error = %e, "operations drain tick failed, retrying next tick");
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }
        }
    }

    /// One pass over every `content_id` with pending operations.
    async fn drain_once(pool: &SqlitePool) -> Result<(), MemoryError> {
        let content_ids = sqlx::query_scalar::<_, String>("SELECT DISTINCT content_id FROM content_operations WHERE complete = 0 AND cancelled = 0")
            .fetch_all(pool)
            .await
            .map_err(map_sqlx_error)?;

        for content_id in content_ids {
            Self::drain_content_id(pool, &content_id).await?;
        }
        Ok(())
    }

    /// Applies the latest pending operation for `content_id` and cancels
    /// every strictly earlier pending one, in a single transaction.
    async fn drain_content_id(pool: &SqlitePool, content_id: &str) -> Result<(), MemoryError> {
        let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

        let rows = sqlx::query(
            "SELECT id, op_type, index_name, document_id, tags_json, payload_json FROM content_operations \
             WHERE content_id = ?1 AND complete = 0 AND cancelled = 0 ORDER BY id ASC",
        )
        .bind(content_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let Some(latest) = rows.last() else {
            tx.commit().await.map_err(map_sqlx_error)?;
            return Ok(());
        };

        for row in &rows[..rows.len() - 1] {
            let id: i64 = row.get("id");
            sqlx::query("UPDATE content_operations SET cancelled = 1 WHERE id = ?1").bind(id).execute(&mut *tx).await.map_err(map_sqlx_error)?;
        }

        let latest_id: i64 = latest.get("id");
        let op_type: String = latest.get("op_type");

        if op_type == "delete" {
            sqlx::query("DELETE FROM content WHERE content_id = ?1").bind(content_id).execute(&mut *tx).await.map_err(map_sqlx_error)?;
        } else {
            let index_name: String = latest.get("index_name");
            let document_id: String = latest.get("document_id");
            let tags_json: String = latest.get("tags_json");
            let payload_json: String = latest.get("payload_json");
            let now = chrono::Utc::now().to_rfc3339();

            sqlx::query(
                "INSERT INTO content (content_id, index_name, document_id, tags_json, payload_json, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(content_id) DO UPDATE SET index_name = excluded.index_name, document_id = excluded.document_id, \
                 tags_json = excluded.tags_json, payload_json = excluded.payload_json, updated_at = excluded.updated_at",
            )
            .bind(content_id)
            .bind(index_name)
            .bind(document_id)
            .bind(tags_json)
            .bind(payload_json)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        sqlx::query("UPDATE content_operations SET complete = 1 WHERE id = ?1").bind(latest_id).execute(&mut *tx).await.map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Stops the drain worker. In-flight transactions run to completion.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl ContentStorageService for SqliteContentStorageService {
    async fn upsert(&self, request: UpsertRequest) -> Result<String, MemoryError> {
        let content_id = request.content_id.unwrap_or_else(|| ulid::Ulid::new().to_string());
        let tags_json = serde_json::to_string(&request.tags)?;
        let payload_json = serde_json::to_string(&request.payload)?;
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO content_operations (content_id, op_type, index_name, document_id, tags_json, payload_json, created_at) \
             VALUES (?1, 'upsert', ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&content_id)
        .bind(request.index.as_str())
        .bind(request.document_id.as_str())
        .bind(tags_json)
        .bind(payload_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(content_id)
    }

    async fn delete(&self, content_id: &str) -> Result<(), MemoryError> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO content_operations (content_id, op_type, created_at) VALUES (?1, 'delete', ?2)")
            .bind(content_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_by_id(&self, content_id: &str) -> Result<Option<ContentRecord>, MemoryError> {
        let row = sqlx::query("SELECT index_name, document_id, tags_json, payload_json, updated_at FROM content WHERE content_id = ?1")
            .bind(content_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else { return Ok(None) };

        let index_name: String = row.get("index_name");
        let document_id: String = row.get("document_id");
        let tags_json: String = row.get("tags_json");
        let payload_json: String = row.get("payload_json");
        let updated_at: String = row.get("updated_at");

        Ok(Some(ContentRecord {
            content_id: content_id.to_string(),
            index: IndexName::new(index_name)?,
            document_id: DocumentId::new(document_id)?,
            tags: serde_json::from_str(&tags_json)?,
            payload: serde_json::from_str(&payload_json)?,
            updated: chrono::DateTime::parse_from_rfc3339(&updated_at)
                .map_err(|e| MemoryError::storage(format!("corrupt updated_at timestamp: {e}")))?
                .with_timezone(&chrono::Utc),
        }))
    }

    async fn count(&self) -> Result<u64, MemoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM content").fetch_one(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semantic_memory_domain::value_objects::TagCollection;
    use std::time::Duration;

    fn request(content_id: Option<&str>, payload: serde_json::Value) -> UpsertRequest {
        UpsertRequest {
            content_id: content_id.map(str::to_string),
            index: IndexName::new("personal").unwrap(),
            document_id: DocumentId::new("doc-001").unwrap(),
            tags: TagCollection::new(),
            payload,
        }
    }

    async fn service(dir: &tempfile::TempDir) -> SqliteContentStorageService {
        SqliteContentStorageService::connect_with_interval(dir.path().join("content.db"), Duration::from_millis(20)).await.unwrap()
    }

    #[tokio::test]
    async fn upsert_eventually_becomes_visible_via_get_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir).await;

        let id = service.upsert(request(Some("c1"), serde_json::json!({"text": "hello"}))).await.unwrap();
        assert_eq!(id, "c1");

        tokio::time::sleep(Duration::from_millis(200)).await;
        let record = service.get_by_id("c1").await.unwrap().expect("committed");
        assert_eq!(record.payload, serde_json::json!({"text": "hello"}));

        service.shutdown().await;
    }

    #[tokio::test]
    async fn later_upsert_wins_over_an_earlier_one_not_yet_applied() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir).await;

        service.upsert(request(Some("c1"), serde_json::json!({"v": 1}))).await.unwrap();
        service.upsert(request(Some("c1"), serde_json::json!({"v": 2}))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let record = service.get_by_id("c1").await.unwrap().expect("committed");
        assert_eq!(record.payload, serde_json::json!({"v": 2}));
        assert_eq!(service.count().await.unwrap(), 1);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn delete_removes_the_committed_row() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir).await;

        service.upsert(request(Some("c1"), serde_json::json!({"v": 1}))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        service.delete("c1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(service.get_by_id("c1").await.unwrap().is_none());

        service.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_content_id_is_none_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir).await;
        assert!(service.get_by_id("does-not-exist").await.unwrap().is_none());
        service.shutdown().await;
    }
}
