//! Audit queue rows and their lifecycle transitions.
//!
//! Transitions are guarded in SQL: claiming flips exactly one pending row
//! to running under SKIP LOCKED, and completion/failure only land on rows
//! still running. A worker crash leaves the row running; the row is
//! surfaced in the startup queue-depth log rather than silently retried.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use sitepulse_common::{AuditKind, AuditOptions, AuditStatus, SitepulseError};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Audit {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub url: String,
    pub keywords: Json<Vec<String>>,
    pub options: Json<AuditOptions>,
    pub kind: String,
    pub status: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditResult {
    pub audit_id: Uuid,
    pub project_id: Option<Uuid>,
    pub payload: Value,
    pub overall_score: i32,
    pub critical: i32,
    pub warnings: i32,
    pub opportunities: i32,
    pub created_at: DateTime<Utc>,
}

impl Audit {
    pub fn status(&self) -> AuditStatus {
        self.status.parse().unwrap_or(AuditStatus::Failed)
    }

    /// Queues a new pending audit.
    pub async fn enqueue(
        pool: &PgPool,
        project_id: Option<Uuid>,
        url: &str,
        keywords: &[String],
        options: &AuditOptions,
        kind: AuditKind,
    ) -> Result<Self> {
        let row = sqlx::query_as::<_, Self>(
            "INSERT INTO audits (id, project_id, url, keywords, options, kind, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'pending')
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(url)
        .bind(Json(keywords.to_vec()))
        .bind(Json(options.clone()))
        .bind(kind.as_str())
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    /// Same insert inside a caller-owned transaction (scheduler path).
    pub async fn enqueue_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        project_id: Uuid,
        url: &str,
        keywords: &[String],
        options: &AuditOptions,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO audits (id, project_id, url, keywords, options, kind, status)
             VALUES ($1, $2, $3, $4, $5, 'scheduled', 'pending')",
        )
        .bind(id)
        .bind(project_id)
        .bind(url)
        .bind(Json(keywords.to_vec()))
        .bind(Json(options.clone()))
        .execute(&mut **tx)
        .await?;
        Ok(id)
    }

    /// Claims the oldest pending audit, or None when the queue is empty.
    /// SKIP LOCKED keeps concurrent workers from claiming the same row.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(
            "UPDATE audits SET status = 'running', started_at = now()
             WHERE id = (
                 SELECT id FROM audits
                 WHERE status = 'pending'
                 ORDER BY created_at
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING *",
        )
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>("SELECT * FROM audits WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    /// Persists the result and marks the audit completed in one transaction,
    /// touching the owning project's last_audit_at when there is one.
    pub async fn complete(
        pool: &PgPool,
        audit_id: Uuid,
        project_id: Option<Uuid>,
        payload: &Value,
        overall_score: i32,
        critical: i32,
        warnings: i32,
        opportunities: i32,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO audit_results
                 (audit_id, project_id, payload, overall_score, critical, warnings, opportunities)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (audit_id) DO UPDATE SET
                 payload = EXCLUDED.payload,
                 overall_score = EXCLUDED.overall_score,
                 critical = EXCLUDED.critical,
                 warnings = EXCLUDED.warnings,
                 opportunities = EXCLUDED.opportunities",
        )
        .bind(audit_id)
        .bind(project_id)
        .bind(payload)
        .bind(overall_score)
        .bind(critical)
        .bind(warnings)
        .bind(opportunities)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE audits SET status = 'completed', finished_at = now(), error = NULL
             WHERE id = $1 AND status = 'running'",
        )
        .bind(audit_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(
                SitepulseError::Database(format!("audit {audit_id} is not running")).into(),
            );
        }

        if let Some(pid) = project_id {
            sqlx::query("UPDATE projects SET last_audit_at = now(), updated_at = now() WHERE id = $1")
                .bind(pid)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Marks a running audit failed with a reason. No result row is written.
    pub async fn fail(pool: &PgPool, audit_id: Uuid, reason: &str) -> Result<()> {
        sqlx::query(
            "UPDATE audits SET status = 'failed', finished_at = now(), error = $2
             WHERE id = $1 AND status = 'running'",
        )
        .bind(audit_id)
        .bind(reason)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Pending and running counts, logged at startup for queue visibility.
    pub async fn queue_depth(pool: &PgPool) -> Result<(i64, i64)> {
        let (pending, running): (i64, i64) = sqlx::query_as(
            "SELECT
                 count(*) FILTER (WHERE status = 'pending'),
                 count(*) FILTER (WHERE status = 'running')
             FROM audits",
        )
        .fetch_one(pool)
        .await?;
        Ok((pending, running))
    }
}

impl AuditResult {
    pub async fn get(pool: &PgPool, audit_id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>("SELECT * FROM audit_results WHERE audit_id = $1")
            .bind(audit_id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }
}
