//! HTTP server for the review analysis API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/analyze` | Analyze the reviews of one app |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Response Contract
//!
//! `POST /analyze` always answers with the full report shape, zero-filled
//! on failure, with an `error` message added:
//!
//! ```json
//! { "app_name": null, "category": null, "icon": null, "period": "1y",
//!   "total_reviews": 0, "sentiment": { "Delighted": 0, ... },
//!   "categories": { "Bugs": 0.0, ... }, "categories_estimated": false,
//!   "category_model": "bag_of_words", "trends": {}, "clusters": {},
//!   "solutions": {}, "feedback": [],
//!   "warnings": [], "error": "No reviews found" }
//! ```
//!
//! Status codes: `400` for a missing or invalid URL, an unknown period or a
//! malformed body; `404` when the store returned no reviews; `500` for
//! internal failures, including panics inside the handler.
//!
//! # CORS
//!
//! Origins come from `[server].cors_origins`; `["*"]` allows any origin.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::Serialize;
use std::any::Any as PanicPayload;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::analyze::{parse_period, AnalysisReport, AnalyzeRequest, Analyzer};
use crate::config::{Config, ServerConfig};
use crate::error::AnalyzeError;
use crate::models::Period;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    analyzer: Arc<Analyzer>,
}

/// Starts the HTTP server with the Google Play source and the configured
/// label models.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let analyzer = Analyzer::from_config(config)?;
    run_server_with(config, Arc::new(analyzer)).await
}

/// Starts the server around an already-built [`Analyzer`].
///
/// Used by tests and embedders that supply their own review source or
/// label models.
///
/// ```rust,no_run
/// use review_lens::analyze::Analyzer;
/// use review_lens::server::run_server_with;
/// use std::sync::Arc;
///
/// # async fn example(config: &review_lens::config::Config) -> anyhow::Result<()> {
/// let analyzer = Analyzer::from_config(config)?;
/// run_server_with(config, Arc::new(analyzer)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with(config: &Config, analyzer: Arc<Analyzer>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(&config.server, analyzer);

    info!(addr = %bind_addr, "Review analysis server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
pub fn router(server: &ServerConfig, analyzer: Arc<Analyzer>) -> Router {
    let panic_report = {
        let analyzer = analyzer.clone();
        move |payload: Box<dyn PanicPayload + Send + 'static>| {
            panic_response(&analyzer, payload)
        }
    };

    Router::new()
        .route("/analyze", post(handle_analyze))
        .route("/health", get(handle_health))
        .layer(CatchPanicLayer::custom(panic_report))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { analyzer })
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

// ============ Error response ============

/// A failed analysis rendered as a zero-filled report.
struct AppError {
    status: StatusCode,
    report: AnalysisReport,
}

impl AppError {
    fn new(analyzer: &Analyzer, err: AnalyzeError, period: Period) -> Self {
        let status = status_for(&err);
        match &err {
            AnalyzeError::Internal(source) => {
                error!(error = %format!("{:#}", source), "Analysis failed")
            }
            other => info!(status = status.as_u16(), error = %other, "Analysis rejected"),
        }
        Self {
            status,
            report: analyzer.error_report(&err, period),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.report)).into_response()
    }
}

/// HTTP status for each error kind.
pub fn status_for(err: &AnalyzeError) -> StatusCode {
    match err {
        AnalyzeError::MissingUrl
        | AnalyzeError::InvalidUrl
        | AnalyzeError::InvalidPeriod(_)
        | AnalyzeError::BadRequest(_) => StatusCode::BAD_REQUEST,
        AnalyzeError::NoReviews => StatusCode::NOT_FOUND,
        AnalyzeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn panic_response(
    analyzer: &Analyzer,
    payload: Box<dyn PanicPayload + Send + 'static>,
) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    let err = AnalyzeError::Internal(anyhow::anyhow!("handler panicked: {}", detail));
    let mut response = AppError::new(analyzer, err, Period::default()).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /analyze ============

/// Handler for `POST /analyze`.
///
/// The analysis runs on its own task, so a panic inside the pipeline becomes
/// a 500 report rather than a dropped connection.
async fn handle_analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisReport>, AppError> {
    let analyzer = state.analyzer.clone();
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let err = AnalyzeError::BadRequest(rejection.body_text());
            return Err(AppError::new(&analyzer, err, Period::default()));
        }
    };
    // Echo the requested period in error bodies when it is valid.
    let period = parse_period(request.period.as_deref()).unwrap_or_default();

    let today = Local::now().date_naive();
    let task = {
        let analyzer = analyzer.clone();
        tokio::spawn(async move {
            let mut rng = analyzer.rng();
            analyzer.analyze(&request, today, &mut rng).await
        })
    };

    let outcome = task.await.unwrap_or_else(|join_err| {
        Err(AnalyzeError::Internal(anyhow::anyhow!(
            "analysis task failed: {}",
            join_err
        )))
    });

    outcome
        .map(Json)
        .map_err(|err| AppError::new(&analyzer, err, period))
}
