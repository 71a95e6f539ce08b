//! Task persistence.
//!
//! The engine consumes the `TaskStore` trait; `SqliteTaskStore` is the
//! production implementation (SQLite in WAL mode, one `tickd.db` file under
//! the data directory). The store enforces two invariants the rest of the
//! engine relies on:
//!
//! - `external_id` uniqueness (PRIMARY KEY),
//! - the derived priority: any write carrying a full ICE triple has its
//!   priority recomputed before persistence.

use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};

use super::{TaskPatch, TaskPriority, TaskRecord, TaskStatus};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

// ─── Trait ────────────────────────────────────────────────────────────────────

/// Local persistence contract consumed by the sync engine.
///
/// Implementations must guarantee `external_id` uniqueness.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<TaskRecord>>;
    async fn create(&self, record: TaskRecord) -> Result<TaskRecord>;
    async fn update(&self, external_id: &str, patch: TaskPatch) -> Result<TaskRecord>;
    async fn list(&self) -> Result<Vec<TaskRecord>>;
}

// ─── SQLite implementation ────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
struct TaskRow {
    external_id: String,
    title: String,
    content: String,
    status: String,
    priority: String,
    impact: i64,
    confidence: i64,
    ease: i64,
    due_date: Option<String>,
    start_date: Option<String>,
    tags: String,
    last_sync: Option<String>,
}

impl TaskRow {
    fn into_record(self) -> TaskRecord {
        // A hand-edited tags column that isn't valid JSON degrades to no tags.
        let tags: Vec<String> = serde_json::from_str(&self.tags).unwrap_or_default();
        TaskRecord {
            external_id: self.external_id,
            title: self.title,
            content: self.content,
            status: TaskStatus::parse(&self.status),
            priority: TaskPriority::parse(&self.priority),
            impact: self.impact,
            confidence: self.confidence,
            ease: self.ease,
            due_date: self.due_date,
            start_date: self.start_date,
            tags,
            last_sync: self.last_sync,
        }
    }
}

#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("tickd.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts).await?;
        sqlx::migrate!("src/tasks/migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<TaskRecord>> {
        with_timeout(async {
            let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE external_id = ?")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(TaskRow::into_record))
        })
        .await
    }

    async fn create(&self, record: TaskRecord) -> Result<TaskRecord> {
        with_timeout(async {
            let rec = record.with_derived_priority();
            let now = Utc::now().to_rfc3339();
            let tags = serde_json::to_string(&rec.tags)?;
            sqlx::query(
                "INSERT INTO tasks (external_id, title, content, status, priority,
                                    impact, confidence, ease, due_date, start_date,
                                    tags, last_sync, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&rec.external_id)
            .bind(&rec.title)
            .bind(&rec.content)
            .bind(rec.status.as_str())
            .bind(rec.priority.as_str())
            .bind(rec.impact)
            .bind(rec.confidence)
            .bind(rec.ease)
            .bind(&rec.due_date)
            .bind(&rec.start_date)
            .bind(&tags)
            .bind(&rec.last_sync)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to insert task {}", rec.external_id))?;
            Ok(rec)
        })
        .await
    }

    async fn update(&self, external_id: &str, patch: TaskPatch) -> Result<TaskRecord> {
        // Read-merge-write keeps the derived-priority invariant in one place
        // (TaskPatch::apply_to). The snapshot and the rewrite share one
        // transaction, so a concurrent writer cannot land between them.
        with_timeout(async {
            let mut tx = self.pool.begin().await?;
            let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE external_id = ?")
                .bind(external_id)
                .fetch_optional(&mut *tx)
                .await?;
            let existing = row
                .map(TaskRow::into_record)
                .ok_or_else(|| anyhow!("task {external_id} not found"))?;
            let rec = patch.apply_to(existing);

            let now = Utc::now().to_rfc3339();
            let tags = serde_json::to_string(&rec.tags)?;
            sqlx::query(
                "UPDATE tasks SET title = ?, content = ?, status = ?, priority = ?,
                        impact = ?, confidence = ?, ease = ?, due_date = ?, start_date = ?,
                        tags = ?, last_sync = ?, updated_at = ?
                 WHERE external_id = ?",
            )
            .bind(&rec.title)
            .bind(&rec.content)
            .bind(rec.status.as_str())
            .bind(rec.priority.as_str())
            .bind(rec.impact)
            .bind(rec.confidence)
            .bind(rec.ease)
            .bind(&rec.due_date)
            .bind(&rec.start_date)
            .bind(&tags)
            .bind(&rec.last_sync)
            .bind(&now)
            .bind(&rec.external_id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(rec)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<TaskRecord>> {
        with_timeout(async {
            let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(TaskRow::into_record).collect())
        })
        .await
    }
}
