//! Extension traits for review sources and label models.
//!
//! The pipeline only talks to its collaborators through these traits, so a
//! different storefront, an in-process model, or a test double can be
//! plugged in without touching the aggregation code.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   ┌────────────────────────────┐   ┌────────────┐
//! │ ReviewSource  │──▶│ SentimentLabeler           │──▶│ Aggregator │
//! │ MetadataSource│   │   PolarityModel | Lexicon  │   │ trends,    │
//! └───────────────┘   │ CategoryLabeler            │   │ breakdown, │
//!                     │   CategoryModel + overrides│   │ feedback   │
//!                     └────────────────────────────┘   └────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use review_lens::models::{AppId, Review};
//! use review_lens::traits::ReviewSource;
//!
//! pub struct FixtureSource(Vec<Review>);
//!
//! #[async_trait]
//! impl ReviewSource for FixtureSource {
//!     fn name(&self) -> &str { "fixture" }
//!
//!     async fn fetch_reviews(&self, _app: &AppId) -> Result<Vec<Review>> {
//!         Ok(self.0.clone())
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AppId, AppMetadata, LabelSet, Review};

// ═══════════════════════════════════════════════════════════════════════
// Sources
// ═══════════════════════════════════════════════════════════════════════

/// Fetches the reviews of one app.
///
/// Implementations return `Err` for network or upstream failures; the
/// pipeline logs the error and treats it like an empty result.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Short identifier used in logs (e.g. `"google_play"`).
    fn name(&self) -> &str;

    /// Fetch reviews for `app`, newest first, bounded by the source's own
    /// configuration. Reviews with empty text must be skipped.
    async fn fetch_reviews(&self, app: &AppId) -> Result<Vec<Review>>;
}

/// Looks up store listing details (title, genre, icon) for an app.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_metadata(&self, app: &AppId) -> Result<AppMetadata>;
}

// ═══════════════════════════════════════════════════════════════════════
// Label models
// ═══════════════════════════════════════════════════════════════════════

/// Coarse polarity class reported by a probability model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Neutral,
    Negative,
}

/// One class probability from a [`PolarityModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScore {
    pub polarity: Polarity,
    pub score: f64,
}

/// A pretrained sentiment classifier returning a probability per polarity.
#[async_trait]
pub trait PolarityModel: Send + Sync {
    fn name(&self) -> &str;

    /// Probabilities for `text`. Order is not significant.
    async fn class_scores(&self, text: &str) -> Result<Vec<ClassScore>>;
}

/// A topical classifier choosing one label for a text.
///
/// The returned label is not required to belong to `candidates`; the
/// category labeler collapses unknown labels into the fallback.
#[async_trait]
pub trait CategoryModel: Send + Sync {
    /// Strategy tag reported as `category_model` (e.g. `"bag_of_words"`).
    fn name(&self) -> &str;

    async fn classify(&self, text: &str, candidates: &LabelSet) -> Result<String>;
}
