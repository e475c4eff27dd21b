//! SQLite-backed namespaced store.
//!
//! Each namespace owns one database file. The store keeps a connection pool
//! (WAL journal mode, so readers proceed while a writer commits) and a
//! namespace-scoped write mutex: multi-step updates run inside a [`StoreTx`]
//! which holds both an SQLite transaction and the write guard, so concurrent
//! writers serialize instead of spinning on busy errors. Dropping a
//! [`StoreTx`] without committing rolls the transaction back.
//!
//! Dynamic JSON columns (skills, current_tasks, depends_on, evaluation) are
//! decoded into typed values at this boundary; nothing above the store sees
//! raw JSON text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::discussion::DiscussionMessage;
use crate::errors::{StoreError, StoreResult};
use crate::hunter::{Hunter, HunterStatus};
use crate::ids::{format_timestamp, parse_timestamp};
use crate::report::{Report, ReportStatus};
use crate::task::{Task, TaskStatus, TaskType};

/// Filter for task listings. All supplied fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Restrict to one lifecycle status
    #[serde(default)]
    pub status: Option<TaskStatus>,

    /// Restrict to one required skill
    #[serde(default)]
    pub required_skill: Option<String>,

    /// Restrict to one claimant
    #[serde(default)]
    pub hunter_id: Option<String>,
}

/// Filter for report listings. All supplied fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilter {
    /// Restrict to one task
    #[serde(default)]
    pub task_id: Option<String>,

    /// Restrict to one submitter
    #[serde(default)]
    pub hunter_id: Option<String>,

    /// Restrict to one outcome
    #[serde(default)]
    pub status: Option<ReportStatus>,

    /// Maximum number of rows returned, newest first
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Default row cap for report listings.
const DEFAULT_REPORT_LIMIT: i64 = 100;

/// Durable per-namespace state: tasks, hunters, reports, and the discussion
/// log. One instance per namespace, reused across requests.
pub struct SqliteStore {
    /// Connection pool to the namespace database
    pool: SqlitePool,

    /// Path to the database file
    db_path: PathBuf,

    /// Namespace write mutex; held by every [`StoreTx`]
    write_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `db_path` and bring the
    /// schema up to date.
    pub async fn connect<P: AsRef<Path>>(db_path: P) -> StoreResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let store = SqliteStore {
            pool,
            db_path,
            write_lock: Arc::new(Mutex::new(())),
        };
        store.apply_migrations().await?;
        info!(path = %store.db_path.display(), "namespace store ready");
        Ok(store)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Close the pool. Further calls fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Apply pending schema migrations.
    async fn apply_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS migrations (
                version INTEGER PRIMARY KEY NOT NULL,
                name TEXT NOT NULL UNIQUE,
                applied_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("failed to create migrations table: {}", e)))?;

        let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(format!("failed to read schema version: {}", e)))?;

        let migrations: Vec<(i64, &str, Vec<&str>)> = vec![
            (
                1,
                "create_coordination_schema",
                vec![
                    r#"CREATE TABLE IF NOT EXISTS tasks (
                        id TEXT PRIMARY KEY NOT NULL,
                        name TEXT NOT NULL,
                        details TEXT NOT NULL DEFAULT '',
                        required_skill TEXT NOT NULL,
                        status TEXT NOT NULL,
                        priority INTEGER NOT NULL DEFAULT 0,
                        task_type TEXT NOT NULL DEFAULT 'NORMAL',
                        hunter_id TEXT,
                        assigned_hunter_id TEXT,
                        published_by_hunter_id TEXT,
                        lease_id TEXT,
                        lease_expires_at TEXT,
                        depends_on TEXT NOT NULL DEFAULT '[]',
                        parent_task_id TEXT,
                        report_id TEXT,
                        evaluation TEXT,
                        is_archived INTEGER NOT NULL DEFAULT 0,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    )"#,
                    r#"CREATE TABLE IF NOT EXISTS hunters (
                        id TEXT PRIMARY KEY NOT NULL,
                        skills TEXT NOT NULL DEFAULT '{}',
                        reputation INTEGER NOT NULL DEFAULT 0,
                        status TEXT NOT NULL DEFAULT 'active',
                        current_tasks TEXT NOT NULL DEFAULT '[]',
                        completed_tasks INTEGER NOT NULL DEFAULT 0,
                        failed_tasks INTEGER NOT NULL DEFAULT 0,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL,
                        last_read_discussion_timestamp TEXT
                    )"#,
                    r#"CREATE TABLE IF NOT EXISTS reports (
                        id TEXT PRIMARY KEY NOT NULL,
                        task_id TEXT NOT NULL,
                        hunter_id TEXT NOT NULL,
                        status TEXT NOT NULL,
                        details TEXT,
                        result TEXT,
                        evaluation TEXT,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    )"#,
                    r#"CREATE TABLE IF NOT EXISTS discussion_messages (
                        id TEXT PRIMARY KEY NOT NULL,
                        hunter_id TEXT NOT NULL,
                        content TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    )"#,
                    r#"CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)"#,
                    r#"CREATE INDEX IF NOT EXISTS idx_tasks_hunter_id ON tasks(hunter_id)"#,
                ],
            ),
            (
                2,
                "add_report_and_discussion_indexes",
                vec![
                    r#"CREATE INDEX IF NOT EXISTS idx_reports_task_id ON reports(task_id)"#,
                    r#"CREATE INDEX IF NOT EXISTS idx_reports_hunter_id ON reports(hunter_id)"#,
                    r#"CREATE INDEX IF NOT EXISTS idx_discussion_hunter_id
                       ON discussion_messages(hunter_id)"#,
                    r#"CREATE INDEX IF NOT EXISTS idx_discussion_created_at
                       ON discussion_messages(created_at)"#,
                ],
            ),
        ];

        for (version, name, statements) in migrations {
            if version <= current {
                continue;
            }
            debug!(version, name, "applying migration");
            for statement in statements {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| {
                        StoreError::Migration(format!("migration {} failed: {}", name, e))
                    })?;
            }
            sqlx::query("INSERT INTO migrations (version, name, applied_at) VALUES (?, ?, ?)")
                .bind(version)
                .bind(name)
                .bind(format_timestamp(&crate::ids::now_utc()))
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Migration(format!("failed to record {}: {}", name, e)))?;
        }
        Ok(())
    }

    /// Start a write transaction, serialized against other writers in this
    /// namespace.
    pub async fn begin(&self) -> StoreResult<StoreTx> {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(StoreTx {
            tx,
            _write_guard: guard,
        })
    }

    /// Fetch a task by ID.
    pub async fn get_task(&self, task_id: &str) -> StoreResult<Option<Task>> {
        fetch_task(&self.pool, task_id).await
    }

    /// List tasks matching the filter, in no particular order.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        query_tasks(&self.pool, filter).await
    }

    /// Insert or replace a task.
    pub async fn save_task(&self, task: &Task) -> StoreResult<()> {
        persist_task(&self.pool, task).await
    }

    /// Hard-delete a task.
    pub async fn delete_task(&self, task_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fetch a hunter by ID.
    pub async fn get_hunter(&self, hunter_id: &str) -> StoreResult<Option<Hunter>> {
        fetch_hunter(&self.pool, hunter_id).await
    }

    /// List every hunter in the namespace.
    pub async fn list_hunters(&self) -> StoreResult<Vec<Hunter>> {
        query_hunters(&self.pool).await
    }

    /// Insert or replace a hunter.
    pub async fn save_hunter(&self, hunter: &Hunter) -> StoreResult<()> {
        persist_hunter(&self.pool, hunter).await
    }

    /// Fetch a report by ID.
    pub async fn get_report(&self, report_id: &str) -> StoreResult<Option<Report>> {
        fetch_report(&self.pool, report_id).await
    }

    /// List reports matching the filter, newest first.
    pub async fn list_reports(&self, filter: &ReportFilter) -> StoreResult<Vec<Report>> {
        query_reports(&self.pool, filter).await
    }

    /// Insert or replace a report.
    pub async fn save_report(&self, report: &Report) -> StoreResult<()> {
        persist_report(&self.pool, report).await
    }

    /// Append a discussion message.
    pub async fn save_message(&self, message: &DiscussionMessage) -> StoreResult<()> {
        persist_message(&self.pool, message).await
    }

    /// Messages strictly after `after`, ascending, up to `limit`.
    pub async fn messages_after(
        &self,
        after: &DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<DiscussionMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM discussion_messages WHERE created_at > ? ORDER BY created_at ASC LIMIT ?",
        )
        .bind(format_timestamp(after))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    /// Newest `limit` messages, returned in ascending order.
    pub async fn latest_messages(&self, limit: i64) -> StoreResult<Vec<DiscussionMessage>> {
        let rows =
            sqlx::query("SELECT * FROM discussion_messages ORDER BY created_at DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        let mut messages: Vec<DiscussionMessage> = rows
            .iter()
            .map(message_from_row)
            .collect::<StoreResult<_>>()?;
        messages.reverse();
        Ok(messages)
    }
}

/// A write transaction on one namespace store.
///
/// Holds the namespace write mutex for its whole lifetime. Committing is
/// explicit; dropping the value rolls the transaction back.
pub struct StoreTx {
    tx: Transaction<'static, Sqlite>,
    _write_guard: OwnedMutexGuard<()>,
}

impl StoreTx {
    /// Fetch a task by ID within the transaction.
    pub async fn get_task(&mut self, task_id: &str) -> StoreResult<Option<Task>> {
        fetch_task(&mut *self.tx, task_id).await
    }

    /// List tasks matching the filter within the transaction.
    pub async fn list_tasks(&mut self, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        query_tasks(&mut *self.tx, filter).await
    }

    /// Insert or replace a task within the transaction.
    pub async fn save_task(&mut self, task: &Task) -> StoreResult<()> {
        persist_task(&mut *self.tx, task).await
    }

    /// Hard-delete a task within the transaction.
    pub async fn delete_task(&mut self, task_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// Fetch a hunter by ID within the transaction.
    pub async fn get_hunter(&mut self, hunter_id: &str) -> StoreResult<Option<Hunter>> {
        fetch_hunter(&mut *self.tx, hunter_id).await
    }

    /// List every hunter within the transaction.
    pub async fn list_hunters(&mut self) -> StoreResult<Vec<Hunter>> {
        query_hunters(&mut *self.tx).await
    }

    /// Insert or replace a hunter within the transaction.
    pub async fn save_hunter(&mut self, hunter: &Hunter) -> StoreResult<()> {
        persist_hunter(&mut *self.tx, hunter).await
    }

    /// Fetch a report by ID within the transaction.
    pub async fn get_report(&mut self, report_id: &str) -> StoreResult<Option<Report>> {
        fetch_report(&mut *self.tx, report_id).await
    }

    /// Insert or replace a report within the transaction.
    pub async fn save_report(&mut self, report: &Report) -> StoreResult<()> {
        persist_report(&mut *self.tx, report).await
    }

    /// Append a discussion message within the transaction.
    pub async fn save_message(&mut self, message: &DiscussionMessage) -> StoreResult<()> {
        persist_message(&mut *self.tx, message).await
    }

    /// Commit the transaction and release the write mutex.
    pub async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    /// Roll the transaction back and release the write mutex.
    pub async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// Shared row-level helpers, generic over pool and transaction executors.

async fn fetch_task<'e, E>(executor: E, task_id: &str) -> StoreResult<Option<Task>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(task_from_row).transpose()
}

async fn query_tasks<'e, E>(executor: E, filter: &TaskFilter) -> StoreResult<Vec<Task>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let mut sql = String::from("SELECT * FROM tasks WHERE 1=1");
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    if filter.required_skill.is_some() {
        sql.push_str(" AND required_skill = ?");
    }
    if filter.hunter_id.is_some() {
        sql.push_str(" AND hunter_id = ?");
    }

    let mut query = sqlx::query(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(skill) = &filter.required_skill {
        query = query.bind(skill);
    }
    if let Some(hunter_id) = &filter.hunter_id {
        query = query.bind(hunter_id);
    }

    let rows = query.fetch_all(executor).await?;
    rows.iter().map(task_from_row).collect()
}

async fn persist_task<'e, E>(executor: E, task: &Task) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let evaluation = task
        .evaluation
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO tasks (
            id, name, details, required_skill, status, priority, task_type,
            hunter_id, assigned_hunter_id, published_by_hunter_id,
            lease_id, lease_expires_at, depends_on, parent_task_id, report_id,
            evaluation, is_archived, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&task.id)
    .bind(&task.name)
    .bind(&task.details)
    .bind(&task.required_skill)
    .bind(task.status.as_str())
    .bind(task.priority)
    .bind(task.task_type.as_str())
    .bind(&task.hunter_id)
    .bind(&task.assigned_hunter_id)
    .bind(&task.published_by_hunter_id)
    .bind(&task.lease_id)
    .bind(task.lease_expires_at.as_ref().map(format_timestamp))
    .bind(serde_json::to_string(&task.depends_on)?)
    .bind(&task.parent_task_id)
    .bind(&task.report_id)
    .bind(evaluation)
    .bind(task.is_archived as i64)
    .bind(format_timestamp(&task.created_at))
    .bind(format_timestamp(&task.updated_at))
    .execute(executor)
    .await?;
    Ok(())
}

async fn fetch_hunter<'e, E>(executor: E, hunter_id: &str) -> StoreResult<Option<Hunter>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM hunters WHERE id = ?")
        .bind(hunter_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(hunter_from_row).transpose()
}

async fn query_hunters<'e, E>(executor: E) -> StoreResult<Vec<Hunter>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT * FROM hunters")
        .fetch_all(executor)
        .await?;
    rows.iter().map(hunter_from_row).collect()
}

async fn persist_hunter<'e, E>(executor: E, hunter: &Hunter) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO hunters (
            id, skills, reputation, status, current_tasks,
            completed_tasks, failed_tasks, created_at, updated_at,
            last_read_discussion_timestamp
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&hunter.id)
    .bind(serde_json::to_string(&hunter.skills)?)
    .bind(hunter.reputation)
    .bind(hunter.status.as_str())
    .bind(serde_json::to_string(&hunter.current_tasks)?)
    .bind(hunter.completed_tasks)
    .bind(hunter.failed_tasks)
    .bind(format_timestamp(&hunter.created_at))
    .bind(format_timestamp(&hunter.updated_at))
    .bind(
        hunter
            .last_read_discussion_timestamp
            .as_ref()
            .map(format_timestamp),
    )
    .execute(executor)
    .await?;
    Ok(())
}

async fn fetch_report<'e, E>(executor: E, report_id: &str) -> StoreResult<Option<Report>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM reports WHERE id = ?")
        .bind(report_id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(report_from_row).transpose()
}

async fn query_reports<'e, E>(executor: E, filter: &ReportFilter) -> StoreResult<Vec<Report>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let mut sql = String::from("SELECT * FROM reports WHERE 1=1");
    if filter.task_id.is_some() {
        sql.push_str(" AND task_id = ?");
    }
    if filter.hunter_id.is_some() {
        sql.push_str(" AND hunter_id = ?");
    }
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT ?");

    let mut query = sqlx::query(&sql);
    if let Some(task_id) = &filter.task_id {
        query = query.bind(task_id);
    }
    if let Some(hunter_id) = &filter.hunter_id {
        query = query.bind(hunter_id);
    }
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    query = query.bind(filter.limit.unwrap_or(DEFAULT_REPORT_LIMIT));

    let rows = query.fetch_all(executor).await?;
    rows.iter().map(report_from_row).collect()
}

async fn persist_report<'e, E>(executor: E, report: &Report) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let evaluation = report
        .evaluation
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO reports (
            id, task_id, hunter_id, status, details, result, evaluation,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&report.id)
    .bind(&report.task_id)
    .bind(&report.hunter_id)
    .bind(report.status.as_str())
    .bind(&report.details)
    .bind(&report.result)
    .bind(evaluation)
    .bind(format_timestamp(&report.created_at))
    .bind(format_timestamp(&report.updated_at))
    .execute(executor)
    .await?;
    Ok(())
}

async fn persist_message<'e, E>(executor: E, message: &DiscussionMessage) -> StoreResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR REPLACE INTO discussion_messages (id, hunter_id, content, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.hunter_id)
    .bind(&message.content)
    .bind(format_timestamp(&message.created_at))
    .execute(executor)
    .await?;
    Ok(())
}

fn message_from_row(row: &SqliteRow) -> StoreResult<DiscussionMessage> {
    Ok(DiscussionMessage {
        id: row.try_get("id")?,
        hunter_id: row.try_get("hunter_id")?,
        content: row.try_get("content")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn decode_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    parse_timestamp(raw).map_err(|e| StoreError::Decode(format!("bad timestamp {:?}: {}", raw, e)))
}

fn task_from_row(row: &SqliteRow) -> StoreResult<Task> {
    let status_raw: String = row.try_get("status")?;
    let status = TaskStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown task status {:?}", status_raw)))?;
    let type_raw: String = row.try_get("task_type")?;
    let task_type = TaskType::parse(&type_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown task type {:?}", type_raw)))?;

    let depends_on: Vec<String> = serde_json::from_str(&row.try_get::<String, _>("depends_on")?)?;
    let evaluation = match row.try_get::<Option<String>, _>("evaluation")? {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };
    let lease_expires_at = row
        .try_get::<Option<String>, _>("lease_expires_at")?
        .as_deref()
        .map(decode_timestamp)
        .transpose()?;

    Ok(Task {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        details: row.try_get("details")?,
        required_skill: row.try_get("required_skill")?,
        status,
        priority: row.try_get("priority")?,
        task_type,
        hunter_id: row.try_get("hunter_id")?,
        assigned_hunter_id: row.try_get("assigned_hunter_id")?,
        published_by_hunter_id: row.try_get("published_by_hunter_id")?,
        lease_id: row.try_get("lease_id")?,
        lease_expires_at,
        depends_on,
        parent_task_id: row.try_get("parent_task_id")?,
        report_id: row.try_get("report_id")?,
        evaluation,
        is_archived: row.try_get::<i64, _>("is_archived")? != 0,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn hunter_from_row(row: &SqliteRow) -> StoreResult<Hunter> {
    let status_raw: String = row.try_get("status")?;
    let status = HunterStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown hunter status {:?}", status_raw)))?;
    let skills: HashMap<String, i64> = serde_json::from_str(&row.try_get::<String, _>("skills")?)?;
    let current_tasks: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("current_tasks")?)?;
    let last_read = row
        .try_get::<Option<String>, _>("last_read_discussion_timestamp")?
        .as_deref()
        .map(decode_timestamp)
        .transpose()?;

    Ok(Hunter {
        id: row.try_get("id")?,
        skills,
        reputation: row.try_get("reputation")?,
        status,
        current_tasks,
        completed_tasks: row.try_get("completed_tasks")?,
        failed_tasks: row.try_get("failed_tasks")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?)?,
        last_read_discussion_timestamp: last_read,
    })
}

fn report_from_row(row: &SqliteRow) -> StoreResult<Report> {
    let status_raw: String = row.try_get("status")?;
    let status = ReportStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown report status {:?}", status_raw)))?;
    let evaluation = match row.try_get::<Option<String>, _>("evaluation")? {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };

    Ok(Report {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        hunter_id: row.try_get("hunter_id")?,
        status,
        details: row.try_get("details")?,
        result: row.try_get("result")?,
        evaluation,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}
