pub mod cache;
pub mod error;

pub use cache::QueryCache;
pub use error::{Result, SerpError};

use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// One organic search result, positions starting at 1.
#[derive(Debug, Clone)]
pub struct OrganicResult {
    pub position: i32,
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[derive(Debug, serde::Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    organic_results: Vec<SerpApiResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerpApiResult {
    #[serde(default)]
    position: Option<i32>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

/// SerpAPI-compatible Google organic search client.
///
/// Every call goes through the in-process [`QueryCache`] first; the cache is
/// private to this client instance (one per worker process).
pub struct SerpClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    cache: QueryCache,
}

impl SerpClient {
    pub fn new(api_key: &str, cache_ttl: Duration, cache_capacity: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(25))
            .build()
            .expect("Failed to build HTTP client");

        info!(cache_ttl_secs = cache_ttl.as_secs(), cache_capacity, "SerpClient initialized");

        Self {
            api_key: api_key.to_string(),
            client,
            base_url: SERPAPI_URL.to_string(),
            cache: QueryCache::new(cache_ttl, cache_capacity),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Run a Google organic search, serving repeats of the same raw query
    /// from the short-TTL cache.
    pub async fn search(
        &self,
        query: &str,
        num: u32,
        lang: &str,
        country: &str,
    ) -> Result<Vec<OrganicResult>> {
        let cache_key = raw_query_key(query, num, lang, country);
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!(query, "SERP cache hit");
            return Ok(cached);
        }

        let num = num.clamp(1, 100).to_string();
        let mut params: Vec<(&str, String)> = vec![
            ("engine", "google".to_string()),
            ("q", query.to_string()),
            ("num", num),
            ("api_key", self.api_key.clone()),
            ("safe", "off".to_string()),
        ];
        params.extend(locale_params(lang, country));

        info!(query, lang, country, "SERP search");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SerpError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data: SerpApiResponse = resp.json().await?;
        if let Some(err) = data.error {
            return Err(SerpError::Provider(err));
        }

        let results: Vec<OrganicResult> = data
            .organic_results
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let url = if r.link.is_empty() { r.url } else { r.link };
                OrganicResult {
                    // Provider position when present, 1-based order otherwise
                    position: r.position.unwrap_or(i as i32 + 1),
                    url,
                    title: r.title,
                    snippet: r.snippet,
                }
            })
            .collect();

        info!(query, count = results.len(), "SERP search complete");

        self.cache.insert(cache_key, results.clone());
        Ok(results)
    }
}

/// Cache key over the full raw query tuple.
fn raw_query_key(query: &str, num: u32, lang: &str, country: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("serp|{query}|{num}|{lang}|{country}"));
    hex::encode(hasher.finalize())
}

/// Map a language/country pair to SerpAPI `hl`/`gl`/`google_domain` params.
fn locale_params(lang: &str, country: &str) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();

    let lang = lang.trim().to_ascii_lowercase();
    if !lang.is_empty() && lang != "auto" {
        params.push(("hl", lang));
    }

    let country = country.trim().to_ascii_uppercase();
    if !country.is_empty() && country != "AUTO" {
        if let Some(domain) = google_domain_for_country(&country) {
            params.push(("google_domain", domain.to_string()));
        }
        params.push(("gl", country));
    }

    params
}

fn google_domain_for_country(country: &str) -> Option<&'static str> {
    match country {
        "ES" => Some("google.es"),
        "PT" => Some("google.pt"),
        "BR" => Some("google.com.br"),
        "US" => Some("google.com"),
        "GB" => Some("google.co.uk"),
        "MX" => Some("google.com.mx"),
        "AR" => Some("google.com.ar"),
        "CL" => Some("google.cl"),
        "CO" => Some("google.com.co"),
        "PE" => Some("google.com.pe"),
        "FR" => Some("google.fr"),
        "DE" => Some("google.de"),
        "IT" => Some("google.it"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_query_key_is_stable_and_distinct() {
        let a = raw_query_key("seo tool", 20, "en", "US");
        let b = raw_query_key("seo tool", 20, "en", "US");
        let c = raw_query_key("seo tool", 50, "en", "US");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn locale_params_skip_auto() {
        assert!(locale_params("Auto", "Auto").is_empty());
        let params = locale_params("es", "es");
        assert!(params.contains(&("hl", "es".to_string())));
        assert!(params.contains(&("gl", "ES".to_string())));
        assert!(params.contains(&("google_domain", "google.es".to_string())));
    }
}
