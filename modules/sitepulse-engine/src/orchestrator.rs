//! Audit pipeline: claim a pending audit, fetch and analyze the page,
//! resolve ranks, optionally summarize, persist the result.
//!
//! Fetch failures fail the audit. Rank lookups fail it too when the
//! provider errors out (cache misses with a dead provider are not silent
//! zeroes). Summary failures are non-fatal: the audit completes without
//! an executive summary.

use anyhow::Result;
use serde_json::json;
use tracing::{error, info, warn};

use sitepulse_common::{AuditPayload, ExecutiveSummary};

use crate::analysis;
use crate::deps::EngineDeps;
use crate::extract;
use crate::relevance::{self, MetaFields, SocialFields};
use crate::retry::{with_retries, RetryPolicy};
use crate::store::Audit;

pub struct Orchestrator {
    deps: EngineDeps,
}

impl Orchestrator {
    pub fn new(deps: EngineDeps) -> Self {
        Self { deps }
    }

    /// Claims and runs one audit. Returns false when the queue was empty.
    pub async fn run_next(&self) -> Result<bool> {
        let Some(audit) = Audit::claim_next(&self.deps.pool).await? else {
            return Ok(false);
        };
        self.run_audit(audit).await;
        Ok(true)
    }

    /// Runs one claimed audit to a terminal state. Never returns an error:
    /// a failed pipeline marks the audit failed with the reason.
    pub async fn run_audit(&self, audit: Audit) {
        let audit_id = audit.id;
        let project_id = audit.project_id;
        info!(audit_id = %audit_id, url = %audit.url, kind = %audit.kind, "Running audit");

        match self.execute(&audit).await {
            Ok(payload) => {
                let (critical, warnings, opportunities) = payload.suggestion_counts();
                let overall = payload.scores.overall as i32;
                let value = match serde_json::to_value(&payload) {
                    Ok(v) => v,
                    Err(e) => {
                        error!(audit_id = %audit_id, error = %e, "Payload serialization failed");
                        if let Err(persist_err) =
                            Audit::fail(&self.deps.pool, audit_id, &e.to_string()).await
                        {
                            error!(audit_id = %audit_id, error = %persist_err, "Failed to mark audit failed");
                        }
                        return;
                    }
                };
                if let Err(e) = Audit::complete(
                    &self.deps.pool,
                    audit_id,
                    project_id,
                    &value,
                    overall,
                    critical as i32,
                    warnings as i32,
                    opportunities as i32,
                )
                .await
                {
                    error!(audit_id = %audit_id, error = %e, "Failed to persist audit result");
                    if let Err(persist_err) =
                        Audit::fail(&self.deps.pool, audit_id, &e.to_string()).await
                    {
                        error!(audit_id = %audit_id, error = %persist_err, "Failed to mark audit failed");
                    }
                } else {
                    info!(audit_id = %audit_id, overall, critical, "Audit completed");
                }
            }
            Err(e) => {
                warn!(audit_id = %audit_id, error = %e, "Audit failed");
                if let Err(persist_err) =
                    Audit::fail(&self.deps.pool, audit_id, &e.to_string()).await
                {
                    error!(audit_id = %audit_id, error = %persist_err, "Failed to mark audit failed");
                }
            }
        }
    }

    async fn execute(&self, audit: &Audit) -> Result<AuditPayload> {
        let keywords: &[String] = &audit.keywords.0;
        let options = &audit.options.0;

        // Fetch failures are fatal to the audit, so a single attempt.
        let fetched = self.deps.fetcher.fetch(&audit.url).await?;
        let page = extract::extract_page(&fetched.body);

        let meta_rel = relevance::meta_relevance(
            &MetaFields {
                url: &fetched.final_url,
                title: &page.title,
                description: &page.description,
                h1: &page.h1,
                h2: &page.h2,
            },
            keywords,
        );
        let social_rel = relevance::social_relevance(
            &SocialFields {
                og_title: &page.og_title,
                og_description: &page.og_description,
                twitter_title: &page.twitter_title,
                twitter_description: &page.twitter_description,
            },
            keywords,
        );

        let seo_meta = analysis::meta_report(&page, meta_rel);
        let social = analysis::social_report(&page, &fetched.final_url, social_rel);
        let performance = analysis::performance_report(&fetched, &page);
        let indexability = analysis::indexability_report(&fetched, &page);
        let scores = analysis::score_block(&seo_meta, &social, &performance, &indexability);

        let serp = if options.include_serp && !keywords.is_empty() {
            self.deps.ranks.lookup_domain(&audit.url, keywords).await?
        } else {
            Vec::new()
        };

        let mut payload = AuditPayload {
            executive_summary: None,
            scores,
            seo_meta,
            social,
            performance,
            indexability,
            serp,
        };

        if options.include_summary {
            if let Some(summarizer) = &self.deps.summarizer {
                let metrics = json!({
                    "scores": payload.scores,
                    "seo_meta": payload.seo_meta,
                    "performance": payload.performance,
                    "indexability": payload.indexability,
                    "serp": payload.serp,
                });
                match with_retries("executive_summary", RetryPolicy::default(), || {
                    summarizer.summarize(&audit.url, keywords, &metrics)
                })
                .await
                {
                    Ok(summary) => {
                        payload.executive_summary = Some(ExecutiveSummary { html: summary.html });
                        payload.seo_meta.suggestions.extend(summary.suggestions);
                    }
                    Err(e) => {
                        warn!(audit_id = %audit.id, error = %e, "Summary failed, completing without it");
                    }
                }
            }
        }

        Ok(payload)
    }
}

/// Polling worker loop. Drains the queue, then sleeps `poll` between
/// empty checks.
pub async fn worker_loop(orchestrator: std::sync::Arc<Orchestrator>, poll: std::time::Duration) {
    loop {
        match orchestrator.run_next().await {
            Ok(true) => {}
            Ok(false) => tokio::time::sleep(poll).await,
            Err(e) => {
                error!(error = %e, "Worker claim failed");
                tokio::time::sleep(poll).await;
            }
        }
    }
}
