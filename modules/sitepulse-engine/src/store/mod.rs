//! Postgres persistence: projects, audit queue, results, the durable
//! rank cache, and schema setup.

pub mod audits;
pub mod migrations;
pub mod projects;
pub mod rank_cache;

pub use audits::{Audit, AuditResult};
pub use migrations::migrate;
pub use projects::Project;
pub use rank_cache::RankCacheEntry;
