//! Remote inference client and the label models built on it.
//!
//! Pretrained sentiment and zero-shot models are reached through a Hugging
//! Face-style inference API: `POST {base_url}/{model}` with a JSON body,
//! optional bearer token. Two models are provided:
//!
//! - **[`RemoteSentimentModel`]**: text classification returning a
//!   probability per polarity class. Implements [`PolarityModel`].
//! - **[`ZeroShotModel`]**: zero-shot classification against the
//!   configured category labels. Implements [`CategoryModel`].
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error, including 503 while
//!   the model is loading) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::InferenceConfig;
use crate::models::LabelSet;
use crate::traits::{CategoryModel, ClassScore, Polarity, PolarityModel};

/// Shared HTTP client for the inference API. Cheap to clone.
#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
}

impl InferenceClient {
    /// Build a client from `[inference]`. The token is read from the
    /// environment variable named by `token_env`; a missing token is not an
    /// error.
    pub fn from_config(config: &InferenceConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::new(
            &config.base_url,
            token,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )
    }

    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build inference HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            max_retries,
        })
    }

    /// Run `model` on `body` with retry/backoff and return the JSON reply.
    pub async fn run(&self, model: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, model);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(model, attempt, ?delay, "Retrying inference call");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.http.post(&url).json(body);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json()
                            .await
                            .with_context(|| format!("Invalid JSON from model {}", model));
                    }

                    // Rate limited, loading, or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Inference API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error (not 429): don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Inference API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Inference failed after retries")))
    }
}

// ============ Sentiment ============

/// Pretrained sentiment classifier behind the inference API
/// (e.g. `cardiffnlp/twitter-roberta-base-sentiment-latest`).
pub struct RemoteSentimentModel {
    client: InferenceClient,
    model: String,
}

impl RemoteSentimentModel {
    pub fn new(client: InferenceClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl PolarityModel for RemoteSentimentModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn class_scores(&self, text: &str) -> Result<Vec<ClassScore>> {
        let body = json!({ "inputs": text });
        let reply = self.client.run(&self.model, &body).await?;
        parse_sentiment_response(&reply)
    }
}

/// Map a classifier label to a polarity. Older checkpoints report raw
/// `LABEL_0/1/2` names in negative/neutral/positive order.
fn parse_polarity(label: &str) -> Option<Polarity> {
    match label.to_ascii_lowercase().as_str() {
        "positive" | "pos" | "label_2" => Some(Polarity::Positive),
        "neutral" | "neu" | "label_1" => Some(Polarity::Neutral),
        "negative" | "neg" | "label_0" => Some(Polarity::Negative),
        _ => None,
    }
}

/// Parse `[[{label, score}, ...]]` (or the flat `[{label, score}, ...]`).
fn parse_sentiment_response(json: &Value) -> Result<Vec<ClassScore>> {
    let outer = json
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid sentiment response: expected an array"))?;
    let items = match outer.first() {
        Some(Value::Array(inner)) => inner,
        _ => outer,
    };

    let scores: Vec<ClassScore> = items
        .iter()
        .filter_map(|item| {
            let polarity = parse_polarity(item.get("label")?.as_str()?)?;
            let score = item.get("score")?.as_f64()?;
            Some(ClassScore { polarity, score })
        })
        .collect();

    if scores.is_empty() {
        bail!("Invalid sentiment response: no recognizable class scores");
    }
    Ok(scores)
}

// ============ Zero-shot ============

/// Zero-shot classifier behind the inference API
/// (e.g. `facebook/bart-large-mnli`).
pub struct ZeroShotModel {
    client: InferenceClient,
    model: String,
}

impl ZeroShotModel {
    pub fn new(client: InferenceClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CategoryModel for ZeroShotModel {
    fn name(&self) -> &str {
        "zero_shot"
    }

    async fn classify(&self, text: &str, candidates: &LabelSet) -> Result<String> {
        let labels: Vec<&str> = candidates.iter().collect();
        let body = json!({
            "inputs": text,
            "parameters": { "candidate_labels": labels, "multi_label": false },
        });
        let reply = self.client.run(&self.model, &body).await?;
        parse_zero_shot_response(&reply)
    }
}

/// Parse either `{labels: [...], scores: [...]}` or `[{label, score}, ...]`
/// and return the highest-scoring label.
fn parse_zero_shot_response(json: &Value) -> Result<String> {
    let pairs: Vec<(String, f64)> = if let Some(items) = json.as_array() {
        items
            .iter()
            .filter_map(|item| {
                Some((
                    item.get("label")?.as_str()?.to_string(),
                    item.get("score")?.as_f64()?,
                ))
            })
            .collect()
    } else {
        let labels = json
            .get("labels")
            .and_then(|l| l.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid zero-shot response: missing labels"))?;
        let scores = json
            .get("scores")
            .and_then(|s| s.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid zero-shot response: missing scores"))?;
        labels
            .iter()
            .zip(scores)
            .filter_map(|(l, s)| Some((l.as_str()?.to_string(), s.as_f64()?)))
            .collect()
    };

    pairs
        .into_iter()
        .filter(|(_, score)| score.is_finite())
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(label, _)| label)
        .ok_or_else(|| anyhow::anyhow!("Invalid zero-shot response: no scored labels"))
}
