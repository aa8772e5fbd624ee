//! # Review Lens
//!
//! App store review analytics: sentiment, feedback categories and trends
//! over time.
//!
//! Given a Google Play listing URL, Review Lens fetches the app's reviews,
//! labels each one with a sentiment and a feedback category, and aggregates
//! the labels into overall counts, a category breakdown, period-scoped trend
//! buckets, and a sample of feedback with suggested next steps.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌─────────────┐
//! │ Google Play  │──▶│ Sentiment +      │──▶│ Aggregation │
//! │ reviews/meta │   │ Category labelers│   │ trends,     │
//! └──────────────┘   └──────────────────┘   │ breakdown,  │
//!                                           │ feedback    │
//!                                           └──────┬──────┘
//!                               ┌──────────────────┤
//!                               ▼                  ▼
//!                          ┌──────────┐      ┌──────────┐
//!                          │   CLI    │      │   HTTP   │
//!                          │(analyze) │      │(/analyze)│
//!                          └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! review-lens models                 # check label models
//! review-lens analyze "https://play.google.com/store/apps/details?id=com.spotify.music" --period 3m
//! review-lens serve                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Request-facing error taxonomy |
//! | [`traits`] | Source and label model traits |
//! | [`playstore`] | Google Play reviews and listing metadata |
//! | [`lexicon`] | Rule-based compound polarity scoring |
//! | [`sentiment`] | Sentiment labeler |
//! | [`bag_of_words`] | TF-IDF + naive Bayes category model |
//! | [`inference`] | Remote inference client and models |
//! | [`category`] | Category labeler and keyword overrides |
//! | [`trends`] | Period-scoped trend buckets |
//! | [`feedback`] | Feedback sample and suggested solutions |
//! | [`analyze`] | The analysis pipeline |
//! | [`server`] | HTTP server |
//! | [`status`] | Label model status listing |

pub mod analyze;
pub mod bag_of_words;
pub mod category;
pub mod config;
pub mod error;
pub mod feedback;
pub mod inference;
pub mod lexicon;
pub mod models;
pub mod playstore;
pub mod sentiment;
pub mod server;
pub mod status;
pub mod traits;
pub mod trends;
