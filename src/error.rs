//! Request-facing error taxonomy.
//!
//! Only failures that end an analysis request live here. Degraded channels
//! (a label model that failed to load) and per-review scoring failures are
//! absorbed inside the pipeline and never become an `AnalyzeError`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyzeError>;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("No URL provided")]
    MissingUrl,

    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Invalid period: '{0}' (expected one of 1w, 1m, 3m, 6m, 1y)")]
    InvalidPeriod(String),

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("No reviews found")]
    NoReviews,

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AnalyzeError {
    /// Whether the request was rejected before any upstream call was made.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AnalyzeError::MissingUrl
                | AnalyzeError::InvalidUrl
                | AnalyzeError::InvalidPeriod(_)
                | AnalyzeError::BadRequest(_)
        )
    }
}

impl From<anyhow::Error> for AnalyzeError {
    fn from(err: anyhow::Error) -> Self {
        AnalyzeError::Internal(err)
    }
}
