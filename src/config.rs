//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`Config::default`]) yields a working service that scores
//! sentiment with the built-in lexicon and categorizes with the bag-of-words
//! artifacts under `models/`.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:5000"
//!
//! [sentiment]
//! scheme = "five"        # or "three"
//! strategy = "lexicon"   # or "model"
//!
//! [categories]
//! strategy = "bag_of_words"   # or "zero_shot", "disabled"
//! breakdown = "percent"       # or "count"
//!
//! [[categories.overrides]]
//! label = "Bugs"
//! keywords = ["force exit", "crash"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::models::LabelSet;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub categories: CategoriesConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub solutions: SolutionsConfig,
}

// ============ [server] ============

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed browser origins. `["*"]` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

// ============ [source] ============

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Storefront host an app URL must point at.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_country")]
    pub country: String,
    /// Upper bound on reviews fetched per request. `0` fetches everything
    /// the store will page through.
    #[serde(default = "default_max_reviews")]
    pub max_reviews: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Look up app title, genre, and icon alongside the reviews.
    #[serde(default = "default_true")]
    pub fetch_metadata: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            lang: default_lang(),
            country: default_country(),
            max_reviews: default_max_reviews(),
            timeout_secs: default_timeout_secs(),
            fetch_metadata: true,
        }
    }
}

fn default_host() -> String {
    "play.google.com".to_string()
}
fn default_lang() -> String {
    "en".to_string()
}
fn default_country() -> String {
    "us".to_string()
}
fn default_max_reviews() -> usize {
    200
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

// ============ [inference] ============

/// Remote inference endpoint used by the `model` sentiment strategy and the
/// `zero_shot` category strategy.
#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the bearer token. The token
    /// is optional; anonymous calls are rate-limited harder.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_inference_base_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_inference_base_url() -> String {
    "https://router.huggingface.co/hf-inference/models".to_string()
}
fn default_token_env() -> String {
    "HF_API_TOKEN".to_string()
}
fn default_max_retries() -> u32 {
    3
}

// ============ [sentiment] ============

/// Sentiment vocabulary.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SentimentScheme {
    /// Delighted, Happy, Neutral, Frustrated, Angry.
    #[default]
    Five,
    /// Happy, Neutral, Frustrated.
    Three,
}

impl SentimentScheme {
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            SentimentScheme::Five => &["Delighted", "Happy", "Neutral", "Frustrated", "Angry"],
            SentimentScheme::Three => &["Happy", "Neutral", "Frustrated"],
        }
    }

    fn default_mild_cutoff(&self) -> f64 {
        match self {
            SentimentScheme::Five => 0.1,
            SentimentScheme::Three => 0.3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SentimentStrategyKind {
    #[default]
    Lexicon,
    Model,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SentimentConfig {
    #[serde(default)]
    pub scheme: SentimentScheme,
    #[serde(default)]
    pub strategy: SentimentStrategyKind,
    /// Remote text-classification model for the `model` strategy.
    #[serde(default = "default_sentiment_model")]
    pub model: String,
    /// Probability at or above which positive/negative become the strong
    /// labels (Delighted/Angry).
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Compound score magnitude for the strong labels (five-level only).
    #[serde(default = "default_strong_cutoff")]
    pub strong_cutoff: f64,
    /// Compound score magnitude for the mild labels. Defaults to 0.1 for the
    /// five-level scheme and 0.3 for the three-level one.
    #[serde(default)]
    pub mild_cutoff: Option<f64>,
    /// Extra lexicon entries (`word<TAB>valence`), merged over the built-in list.
    #[serde(default)]
    pub lexicon_path: Option<PathBuf>,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            scheme: SentimentScheme::default(),
            strategy: SentimentStrategyKind::default(),
            model: default_sentiment_model(),
            confidence_threshold: default_confidence_threshold(),
            strong_cutoff: default_strong_cutoff(),
            mild_cutoff: None,
            lexicon_path: None,
        }
    }
}

impl SentimentConfig {
    pub fn mild_cutoff(&self) -> f64 {
        self.mild_cutoff
            .unwrap_or_else(|| self.scheme.default_mild_cutoff())
    }

    pub fn label_set(&self) -> Result<LabelSet> {
        LabelSet::new(self.scheme.labels().iter().copied())
    }
}

fn default_sentiment_model() -> String {
    "cardiffnlp/twitter-roberta-base-sentiment-latest".to_string()
}
fn default_confidence_threshold() -> f64 {
    0.8
}
fn default_strong_cutoff() -> f64 {
    0.5
}

// ============ [categories] ============

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStrategyKind {
    #[default]
    BagOfWords,
    ZeroShot,
    Disabled,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BreakdownKind {
    Count,
    #[default]
    Percent,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OverrideRuleConfig {
    pub label: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoriesConfig {
    #[serde(default)]
    pub strategy: CategoryStrategyKind,
    #[serde(default = "default_category_labels")]
    pub labels: Vec<String>,
    /// Catch-all label for predictions outside the set and failed reviews.
    #[serde(default = "default_fallback")]
    pub fallback: String,
    #[serde(default)]
    pub breakdown: BreakdownKind,
    /// Classify only this many randomly chosen reviews for the breakdown.
    /// `0` classifies every review.
    #[serde(default)]
    pub sample_size: usize,
    #[serde(default = "default_vectorizer_path")]
    pub vectorizer_path: PathBuf,
    #[serde(default = "default_classifier_path")]
    pub classifier_path: PathBuf,
    /// Remote zero-shot model for the `zero_shot` strategy.
    #[serde(default = "default_zero_shot_model")]
    pub model: String,
    /// Keyword overrides, highest priority first. When unset, the built-in
    /// rules whose label is in `labels` apply.
    #[serde(default)]
    pub overrides: Option<Vec<OverrideRuleConfig>>,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            strategy: CategoryStrategyKind::default(),
            labels: default_category_labels(),
            fallback: default_fallback(),
            breakdown: BreakdownKind::default(),
            sample_size: 0,
            vectorizer_path: default_vectorizer_path(),
            classifier_path: default_classifier_path(),
            model: default_zero_shot_model(),
            overrides: None,
        }
    }
}

impl CategoriesConfig {
    pub fn label_set(&self) -> Result<LabelSet> {
        LabelSet::new(self.labels.iter().cloned())
    }

    /// The override rules in effect: the configured list, or the built-in
    /// rules restricted to the configured labels.
    pub fn override_rules(&self) -> Vec<OverrideRuleConfig> {
        match &self.overrides {
            Some(rules) => rules.clone(),
            None => default_overrides()
                .into_iter()
                .filter(|rule| self.labels.contains(&rule.label))
                .collect(),
        }
    }
}

fn default_category_labels() -> Vec<String> {
    [
        "Feature Requests",
        "Bugs",
        "UX/UI",
        "Performance",
        "Navigation Issues",
        "Others",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_fallback() -> String {
    "Others".to_string()
}
fn default_vectorizer_path() -> PathBuf {
    PathBuf::from("models/vectorizer.json")
}
fn default_classifier_path() -> PathBuf {
    PathBuf::from("models/classifier.json")
}
fn default_zero_shot_model() -> String {
    "facebook/bart-large-mnli".to_string()
}

fn rule(label: &str, keywords: &[&str]) -> OverrideRuleConfig {
    OverrideRuleConfig {
        label: label.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

fn default_overrides() -> Vec<OverrideRuleConfig> {
    vec![
        rule(
            "Bugs",
            &[
                "force exit",
                "force close",
                "crash",
                "not responding",
                "stopped working",
                "keeps closing",
                "freez",
            ],
        ),
        rule(
            "Performance",
            &["slow", "lag", "takes forever", "loading time", "battery drain"],
        ),
        rule(
            "UX/UI",
            &["interface", "confusing", "layout", "hard to find", "design"],
        ),
        rule(
            "Navigation Issues",
            &[
                "back button",
                "go back",
                "can't exit",
                "cannot exit",
                "exit the app",
            ],
        ),
    ]
}

// ============ [feedback] ============

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_sample_size")]
    pub sample_size: usize,
    /// Sentiment labels whose reviews are left out of the feedback sample.
    #[serde(default)]
    pub exclude_sentiments: Vec<String>,
    /// Seed for sampling and solution choice. Unset draws from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            sample_size: default_feedback_sample_size(),
            exclude_sentiments: Vec::new(),
            seed: None,
        }
    }
}

fn default_feedback_sample_size() -> usize {
    10
}

// ============ [solutions] ============

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SolutionMode {
    /// Always the first suggestion listed for the category.
    #[default]
    Fixed,
    /// A uniformly random suggestion from the category's list.
    Random,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SolutionsConfig {
    #[serde(default)]
    pub mode: SolutionMode,
    #[serde(default = "default_solution_table")]
    pub table: BTreeMap<String, Vec<String>>,
}

impl Default for SolutionsConfig {
    fn default() -> Self {
        Self {
            mode: SolutionMode::default(),
            table: default_solution_table(),
        }
    }
}

fn default_solution_table() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 6] = [
        (
            "Feature Requests",
            &[
                "Consider adding the requested feature.",
                "Add the request to the roadmap and gauge demand with a short survey.",
                "Check whether an existing feature covers this and make it easier to discover.",
            ],
        ),
        (
            "Bugs",
            &[
                "Investigate and fix the reported issue.",
                "Reproduce the failure on the reported device and ship a hotfix.",
                "Add crash reporting around this flow to capture stack traces.",
            ],
        ),
        (
            "UX/UI",
            &[
                "Redesign the interface for better usability.",
                "Run a usability test on this screen and simplify the flow.",
                "Review labels and visual hierarchy so key actions stand out.",
            ],
        ),
        (
            "Performance",
            &[
                "Optimize app performance to reduce lag.",
                "Profile startup and rendering on low-end devices.",
                "Cache network responses and defer non-critical work.",
            ],
        ),
        (
            "Navigation Issues",
            &[
                "Review back-navigation and exit flows for dead ends.",
                "Make sure the system back gesture behaves consistently on every screen.",
            ],
        ),
        (
            "Others",
            &[
                "Review feedback for further analysis.",
                "Tag this feedback for the next product review meeting.",
            ],
        ),
    ];
    entries
        .iter()
        .map(|(category, solutions)| {
            (
                category.to_string(),
                solutions.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}

// ============ Loading & validation ============

impl Config {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            bail!("server.bind must not be empty");
        }
        if self.source.host.trim().is_empty() {
            bail!("source.host must not be empty");
        }

        let s = &self.sentiment;
        if !(0.0..=1.0).contains(&s.confidence_threshold) {
            bail!("sentiment.confidence_threshold must be in [0.0, 1.0]");
        }
        let mild = s.mild_cutoff();
        if !(mild > 0.0 && mild <= 1.0) {
            bail!("sentiment.mild_cutoff must be in (0.0, 1.0]");
        }
        if s.scheme == SentimentScheme::Five && !(mild..=1.0).contains(&s.strong_cutoff) {
            bail!("sentiment.strong_cutoff must be in [mild_cutoff, 1.0]");
        }
        let sentiment_labels = s.label_set()?;

        let c = &self.categories;
        let category_labels = c
            .label_set()
            .context("Invalid categories.labels")?;
        if !category_labels.contains(&c.fallback) {
            bail!(
                "categories.fallback '{}' must be one of categories.labels",
                c.fallback
            );
        }
        for rule in &c.override_rules() {
            if !category_labels.contains(&rule.label) {
                bail!(
                    "categories.overrides label '{}' is not one of categories.labels",
                    rule.label
                );
            }
            if rule.keywords.is_empty() || rule.keywords.iter().any(|k| k.trim().is_empty()) {
                bail!(
                    "categories.overrides for '{}' must list non-empty keywords",
                    rule.label
                );
            }
        }

        for label in &self.feedback.exclude_sentiments {
            if !sentiment_labels.contains(label) {
                bail!(
                    "feedback.exclude_sentiments entry '{}' is not a {:?} sentiment label",
                    label,
                    s.scheme
                );
            }
        }

        for (category, solutions) in &self.solutions.table {
            if solutions.is_empty() {
                bail!("solutions.table entry '{}' must not be empty", category);
            }
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
