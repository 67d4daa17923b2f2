//! Shared dependency bundle handed to the orchestrator, scheduler, and
//! service facade.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use serp_client::SerpClient;
use sitepulse_common::Config;

use crate::fetcher::HttpFetcher;
use crate::rank::RankResolver;
use crate::summarizer::OpenAiSummarizer;
use crate::traits::{PageFetcher, Summarizer};

#[derive(Clone)]
pub struct EngineDeps {
    pub pool: PgPool,
    pub fetcher: Arc<dyn PageFetcher>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub ranks: Arc<RankResolver>,
    pub config: Config,
}

impl EngineDeps {
    /// Wires production collaborators from config. Missing provider keys
    /// degrade the corresponding capability instead of failing startup.
    pub fn from_config(pool: PgPool, config: Config) -> Result<Self> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new()?);

        let provider = config.serpapi_api_key.as_deref().map(|key| {
            Arc::new(SerpClient::new(
                key,
                Duration::from_secs(config.query_cache_ttl_secs),
                config.query_cache_capacity,
            ))
        });
        if provider.is_none() {
            info!("No SERP provider key, rank lookups run in degraded mode");
        }
        let ranks = Arc::new(RankResolver::new(pool.clone(), provider, &config));

        let summarizer: Option<Arc<dyn Summarizer>> = config
            .openai_api_key
            .as_deref()
            .map(|key| {
                Arc::new(OpenAiSummarizer::new(key, &config.openai_model)) as Arc<dyn Summarizer>
            });
        if summarizer.is_none() {
            info!("No OpenAI key, executive summaries disabled");
        }

        Ok(Self {
            pool,
            fetcher,
            summarizer,
            ranks,
            config,
        })
    }
}
