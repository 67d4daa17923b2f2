//! Plain HTTP page fetcher. Follows redirects manually so the audit can
//! report the full chain, and records elapsed time as a TTFB proxy.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sitepulse_common::{FetchedPage, SitepulseError};

use crate::traits::PageFetcher;

const MAX_REDIRECTS: usize = 10;
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedPage> {
        let started = Instant::now();
        let mut current = url.to_string();
        let mut chain: Vec<String> = Vec::new();

        loop {
            tracing::debug!(url = %current, hop = chain.len(), "Fetching page");
            let response = self
                .client
                .get(&current)
                .header("Accept", "text/html,application/xhtml+xml,*/*;q=0.8")
                .header("Accept-Language", "en-US,en;q=0.9")
                .send()
                .await
                .map_err(|e| SitepulseError::Fetch(format!("request to {current} failed: {e}")))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        SitepulseError::Fetch(format!(
                            "redirect from {current} without a Location header"
                        ))
                    })?;
                let next = url::Url::parse(&current)
                    .and_then(|base| base.join(location))
                    .map_err(|e| {
                        SitepulseError::Fetch(format!("bad redirect target {location}: {e}"))
                    })?;
                chain.push(current);
                if chain.len() > MAX_REDIRECTS {
                    return Err(SitepulseError::Fetch(format!(
                        "more than {MAX_REDIRECTS} redirects starting from {url}"
                    ))
                    .into());
                }
                current = next.to_string();
                continue;
            }

            let mut headers = BTreeMap::new();
            for (name, value) in response.headers() {
                if let Ok(v) = value.to_str() {
                    headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
                }
            }
            let status_code = status.as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| SitepulseError::Fetch(format!("reading body of {current}: {e}")))?;

            return Ok(FetchedPage {
                final_url: current,
                status_code,
                headers,
                body,
                redirect_chain: chain,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
    }
}
