//! Collaborator seams for the audit pipeline. Production wires the HTTP
//! fetcher and the OpenAI summarizer; tests substitute mocks.

use async_trait::async_trait;
use sitepulse_common::{FetchedPage, Suggestion};

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedPage>;
}

/// Output of the executive-summary collaborator.
#[derive(Debug, Clone)]
pub struct SummaryOutput {
    pub html: String,
    pub suggestions: Vec<Suggestion>,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        url: &str,
        keywords: &[String],
        metrics: &serde_json::Value,
    ) -> anyhow::Result<SummaryOutput>;
}
