//! Recurring-audit dispatch for monitored projects.
//!
//! Each pass walks the monitored projects and enqueues a pending audit
//! for every one whose schedule interval has elapsed. Dispatch is
//! idempotent under concurrent passes: the due re-check, the insert, and
//! the last_audit_at bump happen inside one row-locked transaction, so a
//! second pass observing the bumped timestamp skips the project.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use sitepulse_common::AuditOptions;

use crate::store::{Audit, Project};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned: usize,
    pub enqueued: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct DueAuditScheduler {
    pool: PgPool,
}

impl DueAuditScheduler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One dispatch pass over the monitored projects. Per-project errors
    /// are logged and counted, never aborting the pass.
    pub async fn run_once(&self, now: DateTime<Utc>) -> anyhow::Result<ScanStats> {
        let candidates = Project::monitored_candidates(&self.pool).await?;
        let mut stats = ScanStats::default();

        for project_id in candidates {
            stats.scanned += 1;
            match self.dispatch_if_due(project_id, now).await {
                Ok(true) => stats.enqueued += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    warn!(project_id = %project_id, error = %e, "Scheduler dispatch failed");
                    stats.failed += 1;
                }
            }
        }

        if stats.enqueued > 0 || stats.failed > 0 {
            info!(
                scanned = stats.scanned,
                enqueued = stats.enqueued,
                skipped = stats.skipped,
                failed = stats.failed,
                "Scheduler pass finished"
            );
        }
        Ok(stats)
    }

    async fn dispatch_if_due(
        &self,
        project_id: uuid::Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Re-check under the row lock; the unlocked candidate scan can
        // race a concurrent pass or a settings change.
        let Some(project) = Project::lock(&mut tx, project_id).await? else {
            tx.rollback().await?;
            return Ok(false);
        };
        if !project.monitoring_enabled {
            tx.rollback().await?;
            return Ok(false);
        }
        let Some(interval) = project.schedule().interval_secs() else {
            tx.rollback().await?;
            return Ok(false);
        };
        let due = match project.last_audit_at {
            None => true,
            Some(last) => (now - last).num_seconds() >= interval,
        };
        if !due {
            tx.rollback().await?;
            return Ok(false);
        }

        let audit_id = Audit::enqueue_in_tx(
            &mut tx,
            project.id,
            &project.primary_url,
            &project.keywords.0,
            &AuditOptions::default(),
        )
        .await?;
        Project::touch_last_audit(&mut tx, project.id, now).await?;
        tx.commit().await?;

        debug!(project_id = %project.id, audit_id = %audit_id, "Enqueued scheduled audit");
        Ok(true)
    }

    /// Runs dispatch passes forever at a fixed interval.
    pub async fn run_loop(&self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once(Utc::now()).await {
                warn!(error = %e, "Scheduler pass failed");
            }
        }
    }
}
