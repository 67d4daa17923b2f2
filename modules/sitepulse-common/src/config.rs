use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // SERP provider (optional — absence means degraded rank lookups)
    pub serpapi_api_key: Option<String>,
    pub serp_depth: u32,
    pub serp_lang: String,
    pub serp_country: String,

    // LLM summaries (optional — absence means audits complete without one)
    pub openai_api_key: Option<String>,
    pub openai_model: String,

    // Cache TTLs
    pub query_cache_ttl_secs: u64,
    pub query_cache_capacity: usize,
    pub rank_cache_ttl_secs: u64,

    // Worker pool
    pub worker_count: usize,
    pub worker_poll_secs: u64,
    pub scheduler_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            serpapi_api_key: optional_env("SERPAPI_API_KEY"),
            serp_depth: parsed_env("SERP_DEPTH", 20),
            serp_lang: env::var("SERP_LANG").unwrap_or_else(|_| "en".to_string()),
            serp_country: env::var("SERP_COUNTRY").unwrap_or_else(|_| "US".to_string()),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            query_cache_ttl_secs: parsed_env("QUERY_CACHE_TTL_SECS", 1800),
            query_cache_capacity: parsed_env("QUERY_CACHE_CAPACITY", 256),
            rank_cache_ttl_secs: parsed_env("RANK_CACHE_TTL_SECS", 21_600),
            worker_count: parsed_env("WORKER_COUNT", 2),
            worker_poll_secs: parsed_env("WORKER_POLL_SECS", 5),
            scheduler_interval_secs: parsed_env("SCHEDULER_INTERVAL_SECS", 60),
        }
    }

    /// Log the effective configuration without leaking credentials.
    pub fn log_redacted(&self) {
        info!(
            serp_provider = if self.serpapi_api_key.is_some() { "configured" } else { "degraded" },
            summaries = if self.openai_api_key.is_some() { "configured" } else { "disabled" },
            serp_depth = self.serp_depth,
            serp_lang = self.serp_lang.as_str(),
            serp_country = self.serp_country.as_str(),
            query_cache_ttl_secs = self.query_cache_ttl_secs,
            rank_cache_ttl_secs = self.rank_cache_ttl_secs,
            workers = self.worker_count,
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

/// Empty strings count as unset so a blank line in .env doesn't enable a provider.
fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
