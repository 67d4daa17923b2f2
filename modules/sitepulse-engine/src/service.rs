//! Public service facade: submit audits, poll status, read results, and
//! run ad-hoc rank lookups.

use anyhow::Result;
use uuid::Uuid;

use sitepulse_common::{AuditKind, AuditOptions, AuditStatus, RankLookup, SitepulseError};

use crate::deps::EngineDeps;
use crate::store::{Audit, AuditResult};

const MAX_KEYWORDS: usize = 5;

pub struct AuditService {
    deps: EngineDeps,
}

#[derive(Debug, Clone)]
pub struct AuditStatusView {
    pub id: Uuid,
    pub status: AuditStatus,
    pub error: Option<String>,
}

impl AuditService {
    pub fn new(deps: EngineDeps) -> Self {
        Self { deps }
    }

    /// Validates and queues an ad-hoc audit, returning its id.
    pub async fn submit_audit(
        &self,
        url: &str,
        keywords: &[String],
        options: AuditOptions,
    ) -> Result<Uuid> {
        let url = url.trim();
        let parsed = url::Url::parse(url)
            .map_err(|e| SitepulseError::Validation(format!("invalid URL {url}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(SitepulseError::Validation(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            ))
            .into());
        }

        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.len() > MAX_KEYWORDS {
            return Err(SitepulseError::Validation(format!(
                "at most {MAX_KEYWORDS} keywords per audit, got {}",
                keywords.len()
            ))
            .into());
        }

        let audit = Audit::enqueue(
            &self.deps.pool,
            None,
            url,
            &keywords,
            &options,
            AuditKind::Submitted,
        )
        .await?;
        Ok(audit.id)
    }

    pub async fn status(&self, id: Uuid) -> Result<Option<AuditStatusView>> {
        let audit = Audit::get(&self.deps.pool, id).await?;
        Ok(audit.map(|a| AuditStatusView {
            id: a.id,
            status: a.status(),
            error: a.error,
        }))
    }

    /// The persisted result payload, or None while the audit is still
    /// pending/running or after a failure.
    pub async fn result(&self, id: Uuid) -> Result<Option<serde_json::Value>> {
        let result = AuditResult::get(&self.deps.pool, id).await?;
        Ok(result.map(|r| r.payload))
    }

    /// Ad-hoc rank lookup outside the audit pipeline, same cache path.
    pub async fn lookup_rank(
        &self,
        domain_or_url: &str,
        keywords: &[String],
    ) -> Result<Vec<RankLookup>> {
        self.deps.ranks.lookup_domain(domain_or_url, keywords).await
    }
}
