//! Project rows: the monitored-site registry the scheduler walks.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use sitepulse_common::Schedule;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub primary_url: String,
    pub keywords: Json<Vec<String>>,
    pub monitoring_enabled: bool,
    pub schedule: String,
    pub last_audit_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn schedule(&self) -> Schedule {
        self.schedule.parse().unwrap_or(Schedule::None)
    }

    pub async fn insert(
        pool: &PgPool,
        name: &str,
        primary_url: &str,
        keywords: &[String],
        monitoring_enabled: bool,
        schedule: Schedule,
    ) -> Result<Self> {
        let row = sqlx::query_as::<_, Self>(
            "INSERT INTO projects (id, name, primary_url, keywords, monitoring_enabled, schedule)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(primary_url)
        .bind(Json(keywords.to_vec()))
        .bind(monitoring_enabled)
        .bind(schedule.as_str())
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    /// Ids of projects that might be due. The scheduler re-checks each one
    /// under a row lock before enqueueing.
    pub async fn monitored_candidates(pool: &PgPool) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM projects
             WHERE monitoring_enabled AND schedule <> 'none'
             ORDER BY last_audit_at NULLS FIRST",
        )
        .fetch_all(pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Locks one project row for the duration of the transaction.
    pub async fn lock(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>("SELECT * FROM projects WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row)
    }

    pub async fn touch_last_audit(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE projects SET last_audit_at = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
