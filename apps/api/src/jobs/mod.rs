//! Job queue persistence.
//!
//! A small work queue over one SQLite table. URLs are enqueued (idempotently,
//! the URL is unique), claimed oldest-first, and settled by the session that
//! ran them. `logs` accumulates one line per lifecycle event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

pub mod handlers;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_FAILED: &str = "FAILED";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QueuedJob {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub status: String,
    pub logs: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Adds a URL to the queue. Returns false when the URL was already queued.
pub async fn enqueue(
    pool: &SqlitePool,
    url: &str,
    title: Option<&str>,
    company: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO job_queue (url, title, company, status, created_at, updated_at)
        VALUES (?, ?, ?, 'PENDING', ?, ?)
        "#,
    )
    .bind(url)
    .bind(title)
    .bind(company)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Atomically claims the oldest pending job, marking it in progress.
pub async fn claim_next(pool: &SqlitePool) -> Result<Option<QueuedJob>, sqlx::Error> {
    sqlx::query_as::<_, QueuedJob>(
        r#"
        UPDATE job_queue
        SET status = 'IN_PROGRESS', updated_at = ?
        WHERE id = (
            SELECT id FROM job_queue
            WHERE status = 'PENDING'
            ORDER BY created_at ASC, id ASC
            LIMIT 1
        )
        RETURNING id, url, title, company, status, logs, created_at, updated_at
        "#,
    )
    .bind(Utc::now())
    .fetch_optional(pool)
    .await
}

/// Updates a job's status and appends a log line.
pub async fn update_status(
    pool: &SqlitePool,
    id: i64,
    status: &str,
    log_line: &str,
) -> Result<(), sqlx::Error> {
    // char(10) because SQLite string literals have no escape sequences.
    sqlx::query(
        r#"
        UPDATE job_queue
        SET status = ?,
            logs = COALESCE(logs, '')
                || CASE WHEN logs IS NULL OR logs = '' THEN '' ELSE char(10) END
                || ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(log_line)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<QueuedJob>, sqlx::Error> {
    sqlx::query_as::<_, QueuedJob>(
        r#"
        SELECT id, url, title, company, status, logs, created_at, updated_at
        FROM job_queue
        ORDER BY updated_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<QueuedJob>, sqlx::Error> {
    sqlx::query_as::<_, QueuedJob>(
        r#"
        SELECT id, url, title, company, status, logs, created_at, updated_at
        FROM job_queue
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
