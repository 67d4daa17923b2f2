//! Integration tests for the audit lifecycle.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use async_trait::async_trait;
use sqlx::PgPool;

use sitepulse_common::{AuditOptions, AuditStatus, Config, FetchedPage, RankSource};
use sitepulse_engine::rank::RankResolver;
use sitepulse_engine::store::{migrate, Audit};
use sitepulse_engine::traits::{PageFetcher, Summarizer, SummaryOutput};
use sitepulse_engine::{AuditService, EngineDeps, Orchestrator};

/// Get a test database pool, or skip if no test DB is available.
async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    migrate(&pool).await.ok()?;

    // Clean slate for each test
    sqlx::query("TRUNCATE audit_results, audits, rank_cache, projects RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .ok()?;

    Some(pool)
}

fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        serpapi_api_key: None,
        serp_depth: 20,
        serp_lang: "en".to_string(),
        serp_country: "US".to_string(),
        openai_api_key: None,
        openai_model: "gpt-4o-mini".to_string(),
        query_cache_ttl_secs: 1800,
        query_cache_capacity: 256,
        rank_cache_ttl_secs: 21_600,
        worker_count: 1,
        worker_poll_secs: 1,
        scheduler_interval_secs: 60,
    }
}

const SAMPLE_HTML: &str = r#"<!doctype html>
<html><head>
<title>Comprar Zapatillas de Running Online | Tienda Deportiva</title>
<meta name="description" content="La mejor seleccion de zapatillas running para corredores. Envio gratis en 24 horas y devoluciones sin coste.">
<link rel="canonical" href="https://example.com/zapatillas-running">
<meta property="og:title" content="Zapatillas Running | Tienda Deportiva">
<meta property="og:description" content="Zapatillas running para corredores exigentes.">
<meta property="og:image" content="https://example.com/og.png">
</head><body>
<h1>Zapatillas de running</h1>
<h2>Novedades</h2>
<a href="/a">a</a><img src="/x.png">
</body></html>"#;

struct MockFetcher {
    html: &'static str,
    fail: bool,
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedPage> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        let mut headers = BTreeMap::new();
        headers.insert("content-encoding".to_string(), "gzip".to_string());
        headers.insert("cache-control".to_string(), "public, max-age=600".to_string());
        Ok(FetchedPage {
            final_url: url.to_string(),
            status_code: 200,
            headers,
            body: self.html.to_string(),
            redirect_chain: Vec::new(),
            elapsed_ms: 120,
        })
    }
}

struct CountingFailFetcher {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl PageFetcher for CountingFailFetcher {
    async fn fetch(&self, _url: &str) -> anyhow::Result<FetchedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("connection refused")
    }
}

struct FailingSummarizer;

#[async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(
        &self,
        _url: &str,
        _keywords: &[String],
        _metrics: &serde_json::Value,
    ) -> anyhow::Result<SummaryOutput> {
        anyhow::bail!("model unavailable")
    }
}

fn deps_with(
    pool: &PgPool,
    fetcher: Arc<dyn PageFetcher>,
    summarizer: Option<Arc<dyn Summarizer>>,
) -> EngineDeps {
    let config = test_config("unused");
    let ranks = Arc::new(RankResolver::new(pool.clone(), None, &config));
    EngineDeps {
        pool: pool.clone(),
        fetcher,
        summarizer,
        ranks,
        config,
    }
}

#[tokio::test]
async fn submitted_audit_runs_to_completed() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let deps = deps_with(&pool, Arc::new(MockFetcher { html: SAMPLE_HTML, fail: false }), None);
    let service = AuditService::new(deps.clone());
    let orchestrator = Orchestrator::new(deps);

    let keywords = vec!["zapatillas running".to_string()];
    let id = service
        .submit_audit("https://example.com/zapatillas-running", &keywords, AuditOptions::default())
        .await
        .unwrap();

    let status = service.status(id).await.unwrap().unwrap();
    assert_eq!(status.status, AuditStatus::Pending);
    assert!(service.result(id).await.unwrap().is_none(), "no result before the run");

    assert!(orchestrator.run_next().await.unwrap());

    let status = service.status(id).await.unwrap().unwrap();
    assert_eq!(status.status, AuditStatus::Completed);
    assert!(status.error.is_none());

    let payload = service.result(id).await.unwrap().unwrap();
    let overall = payload["scores"]["overall"].as_u64().unwrap();
    assert!(overall <= 100);
    assert!(payload["executive_summary"].is_null() || payload.get("executive_summary").is_none());

    // No provider key: rank entries come from the degraded fallback.
    let serp = payload["serp"].as_array().unwrap();
    assert_eq!(serp.len(), 1);
    assert_eq!(serp[0]["source"], RankSource::Degraded.as_str());
    let position = serp[0]["position"].as_i64().unwrap();
    assert!((1..=20).contains(&position));

    // The keyword should register as a partial match on the title.
    assert_eq!(
        payload["seo_meta"]["keyword_relevance"]["by_keyword"]["zapatillas running"]["title"]
            ["match"],
        "partial"
    );
}

#[tokio::test]
async fn fetch_failure_fails_the_audit_with_reason() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let deps = deps_with(&pool, Arc::new(MockFetcher { html: "", fail: true }), None);
    let service = AuditService::new(deps.clone());
    let orchestrator = Orchestrator::new(deps);

    let id = service
        .submit_audit("https://down.example.com/", &[], AuditOptions::default())
        .await
        .unwrap();
    assert!(orchestrator.run_next().await.unwrap());

    let status = service.status(id).await.unwrap().unwrap();
    assert_eq!(status.status, AuditStatus::Failed);
    let reason = status.error.unwrap();
    assert!(!reason.is_empty());
    assert!(service.result(id).await.unwrap().is_none(), "failed audits have no result row");
}

#[tokio::test]
async fn fetch_is_attempted_exactly_once() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let calls = Arc::new(AtomicU32::new(0));
    let deps = deps_with(&pool, Arc::new(CountingFailFetcher { calls: calls.clone() }), None);
    let service = AuditService::new(deps.clone());
    let orchestrator = Orchestrator::new(deps);

    let id = service
        .submit_audit("https://down.example.com/", &[], AuditOptions::default())
        .await
        .unwrap();
    assert!(orchestrator.run_next().await.unwrap());

    let status = service.status(id).await.unwrap().unwrap();
    assert_eq!(status.status, AuditStatus::Failed);
    // A fetch failure is fatal to the audit: no pipeline-level retries.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn summary_failure_is_not_fatal() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let deps = deps_with(
        &pool,
        Arc::new(MockFetcher { html: SAMPLE_HTML, fail: false }),
        Some(Arc::new(FailingSummarizer)),
    );
    let service = AuditService::new(deps.clone());
    let orchestrator = Orchestrator::new(deps);

    let id = service
        .submit_audit("https://example.com/", &[], AuditOptions::default())
        .await
        .unwrap();
    assert!(orchestrator.run_next().await.unwrap());

    let status = service.status(id).await.unwrap().unwrap();
    assert_eq!(status.status, AuditStatus::Completed);
    let payload = service.result(id).await.unwrap().unwrap();
    assert!(payload.get("executive_summary").map_or(true, |v| v.is_null()));
}

#[tokio::test]
async fn empty_queue_returns_false() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let deps = deps_with(&pool, Arc::new(MockFetcher { html: SAMPLE_HTML, fail: false }), None);
    let orchestrator = Orchestrator::new(deps);
    assert!(!orchestrator.run_next().await.unwrap());
}

#[tokio::test]
async fn submission_validates_url_and_keyword_count() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let deps = deps_with(&pool, Arc::new(MockFetcher { html: SAMPLE_HTML, fail: false }), None);
    let service = AuditService::new(deps);

    assert!(service
        .submit_audit("ftp://example.com/", &[], AuditOptions::default())
        .await
        .is_err());
    assert!(service
        .submit_audit("not a url", &[], AuditOptions::default())
        .await
        .is_err());

    let too_many: Vec<String> = (0..6).map(|i| format!("kw {i}")).collect();
    assert!(service
        .submit_audit("https://example.com/", &too_many, AuditOptions::default())
        .await
        .is_err());

    // Blank keywords are dropped, not counted.
    let padded = vec![
        " a ".to_string(),
        String::new(),
        "b".to_string(),
        "  ".to_string(),
    ];
    assert!(service
        .submit_audit("https://example.com/", &padded, AuditOptions::default())
        .await
        .is_ok());
}

#[tokio::test]
async fn degraded_rank_is_served_from_durable_cache_on_repeat() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let config = test_config("unused");
    let ranks = RankResolver::new(pool.clone(), None, &config);

    let keywords = vec!["best shoes".to_string()];
    let first = ranks.lookup_domain("https://example.com/", &keywords).await.unwrap();
    let second = ranks.lookup_domain("https://example.com/", &keywords).await.unwrap();
    assert_eq!(first[0].position, second[0].position);
    assert_eq!(first[0].source, RankSource::Degraded);

    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM rank_cache")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "repeat lookups reuse the cached row");
}

#[tokio::test]
async fn stale_rank_cache_entry_is_refetched() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let config = test_config("unused");
    let ranks = RankResolver::new(pool.clone(), None, &config);

    let keywords = vec!["best shoes".to_string()];
    let first = ranks.lookup_domain("https://example.com/", &keywords).await.unwrap();

    // Age the row past the TTL so the next lookup misses the durable cache.
    sqlx::query("UPDATE rank_cache SET fetched_at = now() - interval '2 days'")
        .execute(&pool)
        .await
        .unwrap();
    let (stale_at,): (DateTime<Utc>,) = sqlx::query_as("SELECT fetched_at FROM rank_cache")
        .fetch_one(&pool)
        .await
        .unwrap();

    let second = ranks.lookup_domain("https://example.com/", &keywords).await.unwrap();
    // The fallback is deterministic, so the refetched lookup agrees.
    assert_eq!(first[0].position, second[0].position);

    let (count, fetched_at): (i64, DateTime<Utc>) =
        sqlx::query_as("SELECT count(*), max(fetched_at) FROM rank_cache")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1, "refetch upserts over the stale row");
    assert!(fetched_at > stale_at, "refetch renews fetched_at");
}

#[tokio::test]
async fn concurrent_workers_claim_distinct_audits() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let deps = deps_with(&pool, Arc::new(MockFetcher { html: SAMPLE_HTML, fail: false }), None);
    let service = AuditService::new(deps.clone());

    for i in 0..2 {
        service
            .submit_audit(&format!("https://example.com/page{i}"), &[], AuditOptions::default())
            .await
            .unwrap();
    }

    let a = Orchestrator::new(deps.clone());
    let b = Orchestrator::new(deps);
    let (ra, rb) = tokio::join!(a.run_next(), b.run_next());
    assert!(ra.unwrap());
    assert!(rb.unwrap());

    let (pending, running) = Audit::queue_depth(&pool).await.unwrap();
    assert_eq!(pending, 0);
    assert_eq!(running, 0);
}
