//! Idempotent schema setup, run at worker startup.

use anyhow::Result;
use sqlx::PgPool;

pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id                 UUID         PRIMARY KEY,
            name               TEXT         NOT NULL,
            primary_url        TEXT         NOT NULL,
            keywords           JSONB        NOT NULL DEFAULT '[]',
            monitoring_enabled BOOLEAN      NOT NULL DEFAULT false,
            schedule           TEXT         NOT NULL DEFAULT 'none',
            last_audit_at      TIMESTAMPTZ,
            created_at         TIMESTAMPTZ  NOT NULL DEFAULT now(),
            updated_at         TIMESTAMPTZ  NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audits (
            id          UUID         PRIMARY KEY,
            project_id  UUID         REFERENCES projects(id),
            url         TEXT         NOT NULL,
            keywords    JSONB        NOT NULL DEFAULT '[]',
            options     JSONB        NOT NULL DEFAULT '{}',
            kind        TEXT         NOT NULL DEFAULT 'submitted',
            status      TEXT         NOT NULL DEFAULT 'pending',
            error       TEXT,
            created_at  TIMESTAMPTZ  NOT NULL DEFAULT now(),
            started_at  TIMESTAMPTZ,
            finished_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_audits_status_created
         ON audits (status, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_results (
            audit_id      UUID         PRIMARY KEY REFERENCES audits(id),
            project_id    UUID,
            payload       JSONB        NOT NULL,
            overall_score INTEGER      NOT NULL,
            critical      INTEGER      NOT NULL DEFAULT 0,
            warnings      INTEGER      NOT NULL DEFAULT 0,
            opportunities INTEGER      NOT NULL DEFAULT 0,
            created_at    TIMESTAMPTZ  NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rank_cache (
            id         BIGSERIAL    PRIMARY KEY,
            domain     TEXT         NOT NULL,
            keyword    TEXT         NOT NULL,
            status     TEXT         NOT NULL,
            position   INTEGER,
            found_url  TEXT,
            source     TEXT         NOT NULL DEFAULT 'live',
            fetched_at TIMESTAMPTZ  NOT NULL DEFAULT now(),
            UNIQUE (domain, keyword)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
