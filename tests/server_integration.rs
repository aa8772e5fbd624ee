//! HTTP integration tests.
//!
//! Each test starts the real server on a free port with an in-memory review
//! source and calls it over HTTP, so routing, status mapping, CORS and the
//! JSON contract are exercised exactly as a browser would see them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use review_lens::analyze::Analyzer;
use review_lens::category::{CategoryBackend, CategoryLabeler, OverrideRules};
use review_lens::config::{CategoryStrategyKind, Config};
use review_lens::models::{AppId, AppMetadata, LabelSet, Review};
use review_lens::sentiment::SentimentLabeler;
use review_lens::server::run_server_with;
use review_lens::traits::{CategoryModel, MetadataSource, ReviewSource};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const APP_URL: &str = "https://play.google.com/store/apps/details?id=com.example.notes";

// ─── Test doubles ───────────────────────────────────────────────────

/// Returns fixed reviews and counts how often it was asked.
struct InMemorySource {
    reviews: Vec<Review>,
    calls: AtomicUsize,
}

impl InMemorySource {
    fn new(reviews: Vec<Review>) -> Arc<Self> {
        Arc::new(Self {
            reviews,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReviewSource for InMemorySource {
    fn name(&self) -> &str {
        "inmemory"
    }

    async fn fetch_reviews(&self, _app: &AppId) -> Result<Vec<Review>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reviews.clone())
    }
}

struct PanickingSource;

#[async_trait]
impl ReviewSource for PanickingSource {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn fetch_reviews(&self, _app: &AppId) -> Result<Vec<Review>> {
        panic!("scraper blew up")
    }
}

struct StaticMetadata;

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn fetch_metadata(&self, _app: &AppId) -> Result<AppMetadata> {
        Ok(AppMetadata {
            title: Some("Example Notes".into()),
            genre: Some("PRODUCTIVITY".into()),
            icon: Some("https://play-lh.example/notes.png".into()),
        })
    }
}

/// Files everything without a keyword match under one category.
struct FixedCategory(&'static str);

#[async_trait]
impl CategoryModel for FixedCategory {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn classify(&self, _text: &str, _candidates: &LabelSet) -> Result<String> {
        Ok(self.0.to_string())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn test_config(port: u16) -> Config {
    let mut cfg = Config::default();
    cfg.server.bind = format!("127.0.0.1:{}", port);
    cfg.feedback.seed = Some(7);
    cfg
}

fn days_ago(n: i64) -> Option<NaiveDate> {
    Some(Local::now().date_naive() - Duration::days(n))
}

fn build_analyzer(
    cfg: &Config,
    source: Arc<dyn ReviewSource>,
    metadata: Option<Arc<dyn MetadataSource>>,
    backend: CategoryBackend,
) -> Analyzer {
    let sentiment = SentimentLabeler::from_config(cfg).unwrap();
    let categories = CategoryLabeler::new(
        cfg.categories.label_set().unwrap(),
        cfg.categories.fallback.clone(),
        backend,
        OverrideRules::from_config(&cfg.categories.override_rules()),
    )
    .unwrap();
    Analyzer::new(cfg, source, metadata, sentiment, categories)
}

/// Start a server around `analyzer` and return its base URL.
async fn start(cfg: Config, analyzer: Analyzer) -> String {
    let port: u16 = cfg
        .server
        .bind
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap();
    let analyzer = Arc::new(analyzer);
    tokio::spawn(async move {
        run_server_with(&cfg, analyzer).await.ok();
    });
    wait_for_server(port).await;
    format!("http://127.0.0.1:{}", port)
}

fn assert_zero_filled(body: &Value) {
    for field in [
        "app_name",
        "category",
        "icon",
        "period",
        "total_reviews",
        "sentiment",
        "categories",
        "categories_estimated",
        "category_model",
        "trends",
        "clusters",
        "solutions",
        "feedback",
        "warnings",
        "error",
    ] {
        assert!(body.get(field).is_some(), "missing field {field}: {body}");
    }
    assert_eq!(body["total_reviews"], 0);
    assert!(body["sentiment"]
        .as_object()
        .unwrap()
        .values()
        .all(|v| v.as_u64() == Some(0)));
    assert_eq!(body["sentiment"].as_object().unwrap().len(), 5);
    assert_eq!(body["categories"].as_object().unwrap().len(), 6);
    assert!(body["trends"].as_object().unwrap().is_empty());
    assert!(body["feedback"].as_array().unwrap().is_empty());
    assert!(body["clusters"].as_object().unwrap().is_empty());
    assert!(body["solutions"].as_object().unwrap().is_empty());
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let cfg = test_config(find_free_port());
    let analyzer = build_analyzer(
        &cfg,
        InMemorySource::new(Vec::new()),
        None,
        CategoryBackend::Available(Arc::new(FixedCategory("Others"))),
    );
    let base = start(cfg, analyzer).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_invalid_input_is_400_without_calling_source() {
    let cfg = test_config(find_free_port());
    let source = InMemorySource::new(vec![Review::new("great app", days_ago(1))]);
    let analyzer = build_analyzer(
        &cfg,
        source.clone(),
        None,
        CategoryBackend::Available(Arc::new(FixedCategory("Others"))),
    );
    let base = start(cfg, analyzer).await;
    let client = reqwest::Client::new();

    let cases = [
        (json!({}), "No URL provided"),
        (json!({ "url": "" }), "No URL provided"),
        (
            json!({ "url": "https://apps.apple.com/us/app/notes/id123?id=com.example" }),
            "Invalid URL",
        ),
        (
            json!({ "url": "https://play.google.com/store/apps/details" }),
            "Invalid URL",
        ),
    ];
    for (payload, message) in cases {
        let resp = client
            .post(format!("{}/analyze", base))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "payload {payload}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], message);
        assert_zero_filled(&body);
    }

    let resp = client
        .post(format!("{}/analyze", base))
        .json(&json!({ "url": APP_URL, "period": "5y" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("5y"));

    assert_eq!(source.calls(), 0, "source must not be called for bad input");
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let cfg = test_config(find_free_port());
    let source = InMemorySource::new(Vec::new());
    let analyzer = build_analyzer(
        &cfg,
        source.clone(),
        None,
        CategoryBackend::Available(Arc::new(FixedCategory("Others"))),
    );
    let base = start(cfg, analyzer).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .header("content-type", "application/json")
        .body("{\"url\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
    assert_zero_filled(&body);
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_no_reviews_is_404_zero_filled() {
    let cfg = test_config(find_free_port());
    let source = InMemorySource::new(Vec::new());
    let analyzer = build_analyzer(
        &cfg,
        source.clone(),
        None,
        CategoryBackend::Available(Arc::new(FixedCategory("Others"))),
    );
    let base = start(cfg, analyzer).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .json(&json!({ "url": APP_URL, "period": "3m" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "No reviews found");
    assert_eq!(body["period"], "3m");
    assert_zero_filled(&body);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_one_week_analysis() {
    let cfg = test_config(find_free_port());
    let source = InMemorySource::new(vec![
        Review::new("I love this app, it is great!", days_ago(1)),
        Review::new("Have to force exit every time. Terrible.", days_ago(2)),
        Review::new("Please add a widget", days_ago(3)),
    ]);
    let analyzer = build_analyzer(
        &cfg,
        source,
        Some(Arc::new(StaticMetadata)),
        CategoryBackend::Available(Arc::new(FixedCategory("Feature Requests"))),
    );
    let base = start(cfg, analyzer).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .json(&json!({ "url": APP_URL, "period": "1w" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    assert!(body.get("error").is_none(), "unexpected error: {body}");
    assert_eq!(body["app_name"], "Example Notes");
    assert_eq!(body["category"], "PRODUCTIVITY");
    assert_eq!(body["period"], "1w");
    assert_eq!(body["total_reviews"], 3);
    assert_eq!(body["category_model"], "fixed");

    let sentiment_total: u64 = body["sentiment"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(sentiment_total, 3);
    assert_eq!(body["sentiment"]["Delighted"], 1);

    let trends = body["trends"].as_object().unwrap();
    assert!(trends.len() <= 7);
    let trend_total: u64 = trends
        .values()
        .flat_map(|bucket| bucket.as_object().unwrap().values())
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(trend_total, 3);

    let share_sum: f64 = body["categories"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_f64().unwrap())
        .sum();
    assert!((share_sum - 100.0).abs() <= 0.1);

    let feedback = body["feedback"].as_array().unwrap();
    assert_eq!(feedback.len(), 3);
    assert_eq!(feedback[1]["category"], "Bugs");
    assert_eq!(
        feedback[1]["solution"],
        "Investigate and fix the reported issue."
    );
    for item in feedback {
        for field in ["content", "category", "sentiment", "solution"] {
            assert!(item[field].is_string(), "feedback field {field}: {item}");
        }
    }

    assert_eq!(body["clusters"]["Bugs"].as_array().unwrap().len(), 1);
    assert_eq!(body["clusters"]["Feature Requests"].as_array().unwrap().len(), 2);
    assert_eq!(body["solutions"]["Bugs"], feedback[1]["solution"]);
}

#[tokio::test]
async fn test_category_model_unavailable() {
    let mut cfg = test_config(find_free_port());
    cfg.categories.strategy = CategoryStrategyKind::Disabled;
    let sentiment = SentimentLabeler::from_config(&cfg).unwrap();
    let categories = CategoryLabeler::from_config(&cfg).unwrap();
    let analyzer = Analyzer::new(
        &cfg,
        InMemorySource::new(vec![Review::new("Crashes on launch", days_ago(5))]),
        None,
        sentiment,
        categories,
    );
    let base = start(cfg, analyzer).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .json(&json!({ "url": APP_URL }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["period"], "1y");
    assert_eq!(body["category_model"], "unavailable");
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
    assert_eq!(body["feedback"][0]["category"], "N/A");
    assert_eq!(body["feedback"][0]["solution"], "N/A");
    assert!(body["categories"]
        .as_object()
        .unwrap()
        .values()
        .all(|v| v.as_f64() == Some(0.0)));
}

#[tokio::test]
async fn test_panic_is_500_zero_filled() {
    let cfg = test_config(find_free_port());
    let analyzer = build_analyzer(
        &cfg,
        Arc::new(PanickingSource),
        None,
        CategoryBackend::Available(Arc::new(FixedCategory("Others"))),
    );
    let base = start(cfg, analyzer).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/analyze", base))
        .json(&json!({ "url": APP_URL }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
    assert_zero_filled(&body);

    // The server keeps serving after the failed request.
    let health = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert!(health.status().is_success());
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let cfg = test_config(find_free_port());
    let analyzer = build_analyzer(
        &cfg,
        InMemorySource::new(Vec::new()),
        None,
        CategoryBackend::Available(Arc::new(FixedCategory("Others"))),
    );
    let base = start(cfg, analyzer).await;

    let resp = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/analyze", base))
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );

    let resp = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/analyze", base))
        .header("origin", "http://evil.example")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}
