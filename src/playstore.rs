//! Google Play review and listing source.
//!
//! Reviews come from the store's `batchexecute` RPC (`UsvDTd`), which pages
//! newest-first with an opaque continuation token. Listing metadata (title,
//! genre, icon) is read from the details page's JSON-LD block, falling back
//! to its `og:` meta tags.
//!
//! # Configuration
//!
//! ```toml
//! [source]
//! host = "play.google.com"
//! lang = "en"
//! country = "us"
//! max_reviews = 200     # 0 = everything the store pages through
//! timeout_secs = 30
//! fetch_metadata = true
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::error::AnalyzeError;
use crate::models::{AppId, AppMetadata, Review};
use crate::traits::{MetadataSource, ReviewSource};

/// Largest page the review RPC serves.
const PAGE_SIZE: usize = 199;
/// Sort order "newest" in the review RPC.
const SORT_NEWEST: u8 = 2;
const RPC_ID: &str = "UsvDTd";
/// Anti-JSON-hijacking prefix on `batchexecute` replies.
const XSSI_PREFIX: &str = ")]}'";

/// Pull the app id out of a store listing URL.
///
/// The URL must parse, point at `host`, and carry a non-empty `id` query
/// parameter, e.g. `https://play.google.com/store/apps/details?id=com.example`.
pub fn extract_app_id(raw: &str, host: &str) -> Result<AppId, AnalyzeError> {
    let url = Url::parse(raw.trim()).map_err(|_| AnalyzeError::InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AnalyzeError::InvalidUrl);
    }
    let host_matches = url
        .host_str()
        .is_some_and(|h| h.eq_ignore_ascii_case(host));
    if !host_matches {
        return Err(AnalyzeError::InvalidUrl);
    }
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(AppId::new)
        .ok_or(AnalyzeError::InvalidUrl)
}

fn build_client(config: &SourceConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("review-lens/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build storefront HTTP client")
}

// ============ Reviews ============

/// Pages through Google Play reviews, newest first.
pub struct GooglePlaySource {
    http: reqwest::Client,
    base_url: String,
    lang: String,
    country: String,
    max_reviews: usize,
}

impl GooglePlaySource {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http: build_client(config)?,
            base_url: format!("https://{}", config.host),
            lang: config.lang.clone(),
            country: config.country.clone(),
            max_reviews: config.max_reviews,
        })
    }

    /// Point the source at another origin (a local fixture server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_page(
        &self,
        app: &AppId,
        count: usize,
        token: Option<&str>,
    ) -> Result<(Vec<Review>, Option<String>)> {
        let url = format!("{}/_/PlayStoreUi/data/batchexecute", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("hl", self.lang.as_str()), ("gl", self.country.as_str())])
            .form(&[("f.req", review_request(app, count, token))])
            .send()
            .await
            .with_context(|| format!("Review request failed for {}", app))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Review request for {} returned {}: {}", app, status, body);
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read review page for {}", app))?;
        parse_review_page(&body)
    }
}

#[async_trait]
impl ReviewSource for GooglePlaySource {
    fn name(&self) -> &str {
        "google_play"
    }

    async fn fetch_reviews(&self, app: &AppId) -> Result<Vec<Review>> {
        let mut reviews: Vec<Review> = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let want = if self.max_reviews == 0 {
                PAGE_SIZE
            } else {
                (self.max_reviews - reviews.len()).min(PAGE_SIZE)
            };

            let (page, next) = match self.fetch_page(app, want, token.as_deref()).await {
                Ok(page) => page,
                // Keep what earlier pages returned.
                Err(e) if !reviews.is_empty() => {
                    warn!(
                        app = %app,
                        fetched = reviews.len(),
                        error = %e,
                        "Stopping pagination early"
                    );
                    break;
                }
                Err(e) => return Err(e),
            };
            let got = page.len();
            reviews.extend(page);
            debug!(app = %app, got, total = reviews.len(), "Fetched review page");

            if self.max_reviews > 0 && reviews.len() >= self.max_reviews {
                reviews.truncate(self.max_reviews);
                break;
            }
            match next {
                Some(next) if got > 0 => token = Some(next),
                _ => break,
            }
        }

        Ok(reviews)
    }
}

/// `f.req` form value for one review page.
fn review_request(app: &AppId, count: usize, token: Option<&str>) -> String {
    let inner = json!([
        null,
        null,
        [2, SORT_NEWEST, [count, null, token], null, []],
        [app.as_str(), 7]
    ]);
    json!([[[RPC_ID, inner.to_string(), null, "generic"]]]).to_string()
}

/// Parse one `batchexecute` reply into reviews and the next-page token.
fn parse_review_page(body: &str) -> Result<(Vec<Review>, Option<String>)> {
    let body = body.trim_start();
    let body = body.strip_prefix(XSSI_PREFIX).unwrap_or(body);
    let outer: Value =
        serde_json::from_str(body.trim()).context("Invalid review response envelope")?;

    // An app without reviews answers with a null payload.
    let Some(payload) = outer
        .get(0)
        .and_then(|entry| entry.get(2))
        .and_then(Value::as_str)
    else {
        return Ok((Vec::new(), None));
    };
    let payload: Value = serde_json::from_str(payload).context("Invalid review payload")?;

    let reviews = payload
        .get(0)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_review).collect())
        .unwrap_or_default();

    let token = payload.as_array().and_then(|parts| {
        let holder = parts.len().checked_sub(2).and_then(|i| parts.get(i))?;
        holder.as_array()?.last()?.as_str().map(str::to_string)
    });

    Ok((reviews, token))
}

fn parse_review(item: &Value) -> Option<Review> {
    let text = item.get(4)?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    let posted_on: Option<NaiveDate> = item
        .get(5)
        .and_then(|ts| ts.get(0))
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.date_naive());
    Some(Review::new(text, posted_on))
}

// ============ Listing metadata ============

/// Reads title, genre, and icon from the store details page.
pub struct GooglePlayMetadata {
    http: reqwest::Client,
    base_url: String,
    lang: String,
    country: String,
    parser: ListingParser,
}

impl GooglePlayMetadata {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http: build_client(config)?,
            base_url: format!("https://{}", config.host),
            lang: config.lang.clone(),
            country: config.country.clone(),
            parser: ListingParser::new()?,
        })
    }
}

#[async_trait]
impl MetadataSource for GooglePlayMetadata {
    async fn fetch_metadata(&self, app: &AppId) -> Result<AppMetadata> {
        let url = format!("{}/store/apps/details", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("id", app.as_str()),
                ("hl", self.lang.as_str()),
                ("gl", self.country.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Listing request failed for {}", app))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Listing request for {} returned {}", app, status);
        }
        let html = response.text().await?;
        Ok(self.parser.parse(&html))
    }
}

struct ListingParser {
    ld_json: Regex,
    og_title: Regex,
    og_image: Regex,
}

impl ListingParser {
    fn new() -> Result<Self> {
        Ok(Self {
            ld_json: Regex::new(
                r#"(?s)<script[^>]*type="application/ld\+json"[^>]*>(.*?)</script>"#,
            )?,
            og_title: Regex::new(r#"<meta[^>]+property="og:title"[^>]+content="([^"]*)""#)?,
            og_image: Regex::new(r#"<meta[^>]+property="og:image"[^>]+content="([^"]*)""#)?,
        })
    }

    fn parse(&self, html: &str) -> AppMetadata {
        let mut meta = AppMetadata::default();

        for caps in self.ld_json.captures_iter(html) {
            let Ok(ld) = serde_json::from_str::<Value>(&caps[1]) else {
                continue;
            };
            let field = |key: &str| {
                ld.get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            meta.title = meta.title.or_else(|| field("name"));
            meta.genre = meta.genre.or_else(|| field("applicationCategory"));
            meta.icon = meta.icon.or_else(|| field("image"));
        }

        let og = |re: &Regex| {
            re.captures(html)
                .map(|caps| decode_entities(&caps[1]))
                .filter(|v| !v.is_empty())
        };
        meta.title = meta.title.or_else(|| og(&self.og_title));
        meta.icon = meta.icon.or_else(|| og(&self.og_image));
        meta
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
