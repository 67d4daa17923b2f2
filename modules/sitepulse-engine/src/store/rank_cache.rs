//! Durable tier of the rank cache, keyed by (domain, keyword).

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sitepulse_common::{RankLookup, RankSource, RankStatus};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RankCacheEntry {
    pub id: i64,
    pub domain: String,
    pub keyword: String,
    pub status: String,
    pub position: Option<i32>,
    pub found_url: Option<String>,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl RankCacheEntry {
    /// Entry younger than the TTL, or None.
    pub async fn fresh(
        pool: &PgPool,
        domain: &str,
        keyword: &str,
        ttl_secs: u64,
    ) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, Self>(
            "SELECT * FROM rank_cache
             WHERE domain = $1 AND keyword = $2
               AND fetched_at > now() - make_interval(secs => $3)",
        )
        .bind(domain)
        .bind(keyword)
        .bind(ttl_secs as f64)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert(pool: &PgPool, domain: &str, lookup: &RankLookup) -> Result<()> {
        sqlx::query(
            "INSERT INTO rank_cache (domain, keyword, status, position, found_url, source, fetched_at)
             VALUES ($1, $2, $3, $4, $5, $6, now())
             ON CONFLICT (domain, keyword) DO UPDATE SET
                 status = EXCLUDED.status,
                 position = EXCLUDED.position,
                 found_url = EXCLUDED.found_url,
                 source = EXCLUDED.source,
                 fetched_at = now()",
        )
        .bind(domain)
        .bind(&lookup.keyword)
        .bind(lookup.status.as_str())
        .bind(lookup.position)
        .bind(&lookup.found_url)
        .bind(lookup.source.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    pub fn to_lookup(&self) -> RankLookup {
        RankLookup {
            keyword: self.keyword.clone(),
            status: self.status.parse().unwrap_or(RankStatus::NotFound),
            position: self.position,
            found_url: self.found_url.clone(),
            source: self.source.parse().unwrap_or(RankSource::Live),
        }
    }
}
