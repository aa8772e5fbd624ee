//! Feedback sampling and suggested solutions.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{SolutionMode, SolutionsConfig};

/// Solution text for a category missing from the table.
pub const NO_SOLUTION: &str = "No solution available.";
/// Category and solution of feedback when no category model is loaded.
pub const NOT_AVAILABLE: &str = "N/A";

/// One representative review in the response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackItem {
    pub content: String,
    pub category: String,
    pub sentiment: String,
    pub solution: String,
}

/// Canned remediation suggestions keyed by category.
#[derive(Debug, Clone)]
pub struct SolutionBook {
    mode: SolutionMode,
    table: BTreeMap<String, Vec<String>>,
}

impl SolutionBook {
    pub fn new(mode: SolutionMode, table: BTreeMap<String, Vec<String>>) -> Self {
        Self { mode, table }
    }

    pub fn from_config(config: &SolutionsConfig) -> Self {
        Self::new(config.mode, config.table.clone())
    }

    /// Suggestion for `category`. `Random` mode draws from `rng`.
    pub fn suggest(&self, category: &str, rng: &mut StdRng) -> &str {
        let Some(options) = self.table.get(category) else {
            return NO_SOLUTION;
        };
        let chosen = match self.mode {
            SolutionMode::Fixed => options.first(),
            SolutionMode::Random => options.choose(rng),
        };
        chosen.map(String::as_str).unwrap_or(NO_SOLUTION)
    }
}

/// Indices of the first `limit` reviews whose sentiment is not excluded, in
/// source order.
pub fn sample_feedback<S: AsRef<str>>(
    sentiments: &[S],
    exclude: &[String],
    limit: usize,
) -> Vec<usize> {
    sentiments
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            let s: &str = (*s).as_ref();
            !exclude.iter().any(|e| e == s)
        })
        .map(|(i, _)| i)
        .take(limit)
        .collect()
}
