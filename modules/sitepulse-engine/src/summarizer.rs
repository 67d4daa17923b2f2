//! Executive-summary collaborator backed by the OpenAI chat API.
//!
//! The model gets the audited URL, target keywords, and the metric
//! payload, and returns a short HTML summary plus extra suggestions.
//! Summary generation is best-effort for the pipeline; callers decide
//! whether its failure is fatal.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use sitepulse_common::Suggestion;
use tracing::debug;

use crate::traits::{Summarizer, SummaryOutput};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
// Keep prompts bounded; huge metric payloads are truncated, not rejected.
const MAX_METRICS_CHARS: usize = 6_000;

pub struct OpenAiSummarizer {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_prompt(url: &str, keywords: &[String], metrics: &serde_json::Value) -> String {
        let mut metrics_json = metrics.to_string();
        if metrics_json.len() > MAX_METRICS_CHARS {
            metrics_json.truncate(MAX_METRICS_CHARS);
        }
        format!(
            "You are an SEO consultant. Summarize this page audit for a non-technical \
             site owner.\n\nURL: {url}\nTarget keywords: {}\n\nAudit metrics (JSON):\n\
             {metrics_json}\n\nRespond with a JSON object: {{\"html\": \"<short HTML \
             summary, 2-4 paragraphs>\", \"suggestions\": [{{\"priority\": \
             \"high|medium|low\", \"category\": \"on_page|indexability|social|\
             performance|content\", \"task\": \"...\", \"impact\": \"high|medium|low\", \
             \"effort\": \"low|medium|high\"}}]}}. Suggestions must not repeat ones \
             already present in the metrics.",
            if keywords.is_empty() {
                "(none)".to_string()
            } else {
                keywords.join(", ")
            }
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct LlmSummary {
    #[serde(default)]
    html: String,
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(
        &self,
        url: &str,
        keywords: &[String],
        metrics: &serde_json::Value,
    ) -> Result<SummaryOutput> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": Self::build_prompt(url, keywords, metrics)}
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.3,
        });

        debug!(model = %self.model, url, "Requesting executive summary");

        let response = self
            .http
            .post(&endpoint)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error ({}): {}", status, error_text));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("OpenAI response had no choices"))?;

        // Lenient parse: a model that ignores the schema still yields a
        // usable summary from its raw content.
        let parsed: LlmSummary = match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, "Summary was not valid JSON, using raw content");
                LlmSummary {
                    html: content,
                    suggestions: Vec::new(),
                }
            }
        };
        if parsed.html.trim().is_empty() {
            return Err(anyhow!("summary response contained no html"));
        }

        Ok(SummaryOutput {
            html: parsed.html,
            suggestions: parsed.suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_truncates_oversized_metrics() {
        let metrics = json!({"blob": "x".repeat(20_000)});
        let prompt = OpenAiSummarizer::build_prompt("https://example.com", &[], &metrics);
        assert!(prompt.len() < 8_000);
        assert!(prompt.contains("(none)"));
    }

    #[test]
    fn lenient_parse_accepts_partial_payload() {
        let parsed: LlmSummary = serde_json::from_str(r#"{"html": "<p>ok</p>"}"#).unwrap();
        assert_eq!(parsed.html, "<p>ok</p>");
        assert!(parsed.suggestions.is_empty());
    }
}
