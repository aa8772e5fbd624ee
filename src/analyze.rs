//! The analysis pipeline: fetch → label → aggregate → assemble.
//!
//! An [`Analyzer`] owns every long-lived collaborator (review source,
//! metadata source, sentiment and category labelers, solution table) and is
//! shared read-only between requests. Per-request state is limited to the
//! fetched reviews, the labels computed for them, and a caller-supplied RNG
//! used for category sampling and solution choice.
//!
//! Every outcome, success or failure, is an [`AnalysisReport`] with the same
//! set of fields; failures carry a zero-filled report plus `error`.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::category::CategoryLabeler;
use crate::config::{BreakdownKind, Config, FeedbackConfig};
use crate::error::{AnalyzeError, Result};
use crate::feedback::{sample_feedback, FeedbackItem, SolutionBook, NOT_AVAILABLE, NO_SOLUTION};
use crate::models::{AppMetadata, LabelCounts, LabelSet, LabelShares, Period, Review};
use crate::playstore::{extract_app_id, GooglePlayMetadata, GooglePlaySource};
use crate::sentiment::SentimentLabeler;
use crate::traits::{MetadataSource, ReviewSource};
use crate::trends::{bucket_trends, TrendBuckets};

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(url: impl Into<String>, period: Option<&str>) -> Self {
        Self {
            url: Some(url.into()),
            period: period.map(str::to_string),
        }
    }
}

/// Category breakdown as raw counts or percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategoryBreakdown {
    Counts(LabelCounts),
    Shares(LabelShares),
}

impl CategoryBreakdown {
    fn from_counts(counts: LabelCounts, kind: BreakdownKind) -> Self {
        match kind {
            BreakdownKind::Count => CategoryBreakdown::Counts(counts),
            BreakdownKind::Percent => CategoryBreakdown::Shares(LabelShares::from_counts(&counts)),
        }
    }
}

/// Per-category values in category-set order. Only categories with at
/// least one classified review appear.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMap<T>(Vec<(String, T)>);

impl<T> Default for CategoryMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> CategoryMap<T> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, category: &str) -> Option<&T> {
        self.0.iter().find(|(c, _)| c == category).map(|(_, v)| v)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }
}

impl<T: Serialize> Serialize for CategoryMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, value) in &self.0 {
            map.serialize_entry(category, value)?;
        }
        map.end()
    }
}

/// The response document.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub app_name: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub period: Period,
    pub total_reviews: usize,
    pub sentiment: LabelCounts,
    pub categories: CategoryBreakdown,
    pub categories_estimated: bool,
    pub category_model: String,
    pub trends: TrendBuckets,
    /// Review texts grouped by assigned category.
    pub clusters: CategoryMap<Vec<String>>,
    /// One suggested solution per category in `clusters`.
    pub solutions: CategoryMap<String>,
    pub feedback: Vec<FeedbackItem>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisReport {
    /// A report with every tally zero-filled and every list empty.
    pub fn empty(
        sentiments: &LabelSet,
        categories: &LabelSet,
        breakdown: BreakdownKind,
        period: Period,
        category_model: impl Into<String>,
    ) -> Self {
        Self {
            app_name: None,
            category: None,
            icon: None,
            period,
            total_reviews: 0,
            sentiment: LabelCounts::zeroed(sentiments),
            categories: CategoryBreakdown::from_counts(LabelCounts::zeroed(categories), breakdown),
            categories_estimated: false,
            category_model: category_model.into(),
            trends: TrendBuckets::default(),
            clusters: CategoryMap::default(),
            solutions: CategoryMap::default(),
            feedback: Vec::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// Long-lived pipeline state shared by every request.
pub struct Analyzer {
    host: String,
    source: Arc<dyn ReviewSource>,
    metadata: Option<Arc<dyn MetadataSource>>,
    sentiment: SentimentLabeler,
    categories: CategoryLabeler,
    solutions: SolutionBook,
    breakdown: BreakdownKind,
    category_sample: usize,
    feedback: FeedbackConfig,
}

impl Analyzer {
    /// Wire the Google Play sources and the configured label models.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = Arc::new(GooglePlaySource::from_config(&config.source)?);
        let metadata: Option<Arc<dyn MetadataSource>> = if config.source.fetch_metadata {
            Some(Arc::new(GooglePlayMetadata::from_config(&config.source)?))
        } else {
            None
        };
        let sentiment = SentimentLabeler::from_config(config)?;
        let categories = CategoryLabeler::from_config(config)?;
        info!(
            sentiment = sentiment.strategy_name(),
            categories = categories.model_name(),
            "Label models ready"
        );
        Ok(Self::new(config, source, metadata, sentiment, categories))
    }

    /// Assemble an analyzer from explicit collaborators. Aggregation
    /// settings still come from `config`.
    pub fn new(
        config: &Config,
        source: Arc<dyn ReviewSource>,
        metadata: Option<Arc<dyn MetadataSource>>,
        sentiment: SentimentLabeler,
        categories: CategoryLabeler,
    ) -> Self {
        Self {
            host: config.source.host.clone(),
            source,
            metadata,
            sentiment,
            categories,
            solutions: SolutionBook::from_config(&config.solutions),
            breakdown: config.categories.breakdown,
            category_sample: config.categories.sample_size,
            feedback: config.feedback.clone(),
        }
    }

    pub fn sentiment(&self) -> &SentimentLabeler {
        &self.sentiment
    }

    pub fn categories(&self) -> &CategoryLabeler {
        &self.categories
    }

    /// A fresh RNG for one request: seeded from `[feedback].seed` when set,
    /// otherwise from the OS.
    pub fn rng(&self) -> StdRng {
        match self.feedback.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// The zero-filled report used for failed requests.
    pub fn empty_report(&self, period: Period) -> AnalysisReport {
        let mut report = AnalysisReport::empty(
            self.sentiment.labels(),
            self.categories.labels(),
            self.breakdown,
            period,
            self.categories.model_name(),
        );
        report.warnings = self.degradation_warnings();
        report
    }

    /// Zero-filled report carrying `err`'s client-facing message.
    pub fn error_report(&self, err: &AnalyzeError, period: Period) -> AnalysisReport {
        self.empty_report(period).with_error(err.to_string())
    }

    fn degradation_warnings(&self) -> Vec<String> {
        self.categories
            .unavailable_reason()
            .map(|reason| vec![reason.to_string()])
            .unwrap_or_default()
    }

    /// Validate the request and run the full pipeline.
    ///
    /// Input errors are returned before any upstream call is made. A source
    /// failure is logged and treated as zero reviews.
    pub async fn analyze(
        &self,
        request: &AnalyzeRequest,
        today: NaiveDate,
        rng: &mut StdRng,
    ) -> Result<AnalysisReport> {
        let url = request
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(AnalyzeError::MissingUrl)?;
        let period = parse_period(request.period.as_deref())?;
        let app = extract_app_id(url, &self.host)?;
        info!(app = %app, period = %period, source = self.source.name(), "Analyzing reviews");

        let fetch_metadata = async {
            match &self.metadata {
                Some(source) => Some(source.fetch_metadata(&app).await),
                None => None,
            }
        };
        let (reviews, metadata) = tokio::join!(self.source.fetch_reviews(&app), fetch_metadata);

        let reviews: Vec<Review> = match reviews {
            Ok(reviews) => reviews
                .into_iter()
                .filter(|r| !r.text.trim().is_empty())
                .collect(),
            Err(e) => {
                warn!(app = %app, error = %format!("{:#}", e), "Review source failed");
                Vec::new()
            }
        };
        if reviews.is_empty() {
            return Err(AnalyzeError::NoReviews);
        }

        let mut warnings = self.degradation_warnings();
        let metadata = match metadata {
            Some(Ok(meta)) => meta,
            Some(Err(e)) => {
                warn!(app = %app, error = %format!("{:#}", e), "App metadata lookup failed");
                warnings.push("app metadata unavailable".to_string());
                AppMetadata::default()
            }
            None => AppMetadata::default(),
        };

        let mut sentiments: Vec<String> = Vec::with_capacity(reviews.len());
        for review in &reviews {
            sentiments.push(self.sentiment.label(&review.text).await);
        }
        let sentiment_counts = count_sentiments(&sentiments, self.sentiment.labels());

        let (sample, estimated) = self.category_sample(reviews.len(), rng);
        let feedback_idx = sample_feedback(
            &sentiments,
            &self.feedback.exclude_sentiments,
            self.feedback.sample_size,
        );

        let wanted: BTreeSet<usize> = sample.iter().chain(&feedback_idx).copied().collect();
        let mut assigned: HashMap<usize, String> = HashMap::with_capacity(wanted.len());
        for idx in wanted {
            if let Some(label) = self.categories.label(&reviews[idx].text).await {
                assigned.insert(idx, label);
            }
        }

        let categories =
            category_breakdown(&sample, &assigned, self.categories.labels(), self.breakdown);
        debug!(
            classified = assigned.len(),
            sampled = sample.len(),
            "Categorized reviews"
        );

        let trends = bucket_trends(
            reviews
                .iter()
                .zip(&sentiments)
                .map(|(r, s)| (r.posted_on, s.as_str())),
            period,
            today,
            self.sentiment.labels(),
        );

        let clusters = cluster_reviews(&reviews, &assigned, self.categories.labels());
        let solutions = suggest_solutions(&clusters, &self.solutions, rng);

        let feedback = feedback_idx
            .iter()
            .map(|&idx| {
                let (category, solution) = match assigned.get(&idx) {
                    Some(category) => (
                        category.clone(),
                        solutions
                            .get(category)
                            .map(String::as_str)
                            .unwrap_or(NO_SOLUTION)
                            .to_string(),
                    ),
                    None => (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string()),
                };
                FeedbackItem {
                    content: reviews[idx].text.clone(),
                    category,
                    sentiment: sentiments[idx].clone(),
                    solution,
                }
            })
            .collect();

        info!(
            app = %app,
            reviews = reviews.len(),
            buckets = trends.len(),
            "Analysis complete"
        );

        Ok(AnalysisReport {
            app_name: metadata.title,
            category: metadata.genre,
            icon: metadata.icon,
            period,
            total_reviews: reviews.len(),
            sentiment: sentiment_counts,
            categories,
            categories_estimated: estimated,
            category_model: self.categories.model_name().to_string(),
            trends,
            clusters,
            solutions,
            feedback,
            warnings,
            error: None,
        })
    }

    /// Indices classified for the breakdown, and whether they are a sample.
    fn category_sample(&self, total: usize, rng: &mut StdRng) -> (Vec<usize>, bool) {
        if self.category_sample == 0 || self.category_sample >= total {
            return ((0..total).collect(), false);
        }
        let mut picked = rand::seq::index::sample(rng, total, self.category_sample).into_vec();
        picked.sort_unstable();
        (picked, true)
    }
}

/// Tally of every sentiment label over all reviews.
pub fn count_sentiments<S: AsRef<str>>(sentiments: &[S], labels: &LabelSet) -> LabelCounts {
    let mut counts = LabelCounts::zeroed(labels);
    for label in sentiments {
        counts.increment(label.as_ref());
    }
    counts
}

/// Category breakdown over the sampled reviews that received a label.
pub fn category_breakdown(
    sample: &[usize],
    assigned: &HashMap<usize, String>,
    labels: &LabelSet,
    kind: BreakdownKind,
) -> CategoryBreakdown {
    let mut counts = LabelCounts::zeroed(labels);
    for label in sample.iter().filter_map(|idx| assigned.get(idx)) {
        counts.increment(label);
    }
    CategoryBreakdown::from_counts(counts, kind)
}

/// Texts of every classified review grouped by category, in source order
/// within each group.
pub fn cluster_reviews(
    reviews: &[Review],
    assigned: &HashMap<usize, String>,
    labels: &LabelSet,
) -> CategoryMap<Vec<String>> {
    let mut indices: Vec<usize> = assigned.keys().copied().collect();
    indices.sort_unstable();
    let groups = labels
        .iter()
        .filter_map(|label| {
            let texts: Vec<String> = indices
                .iter()
                .filter(|idx| assigned[*idx] == label)
                .map(|&idx| reviews[idx].text.clone())
                .collect();
            (!texts.is_empty()).then(|| (label.to_string(), texts))
        })
        .collect();
    CategoryMap(groups)
}

/// One suggestion per clustered category. Feedback items reuse these so a
/// category always shows the same solution within one report.
pub fn suggest_solutions<T>(
    clusters: &CategoryMap<T>,
    book: &SolutionBook,
    rng: &mut StdRng,
) -> CategoryMap<String> {
    CategoryMap(
        clusters
            .categories()
            .map(|category| (category.to_string(), book.suggest(category, rng).to_string()))
            .collect(),
    )
}

/// Parse the optional period token; absent or blank means the default.
pub fn parse_period(token: Option<&str>) -> Result<Period> {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => token.parse(),
        None => Ok(Period::default()),
    }
}
