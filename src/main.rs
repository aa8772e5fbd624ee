//! # Review Lens CLI (`review-lens`)
//!
//! ## Usage
//!
//! ```bash
//! review-lens --config ./config/review-lens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `review-lens serve` | Start the HTTP server |
//! | `review-lens analyze <url>` | Analyze one app and print the JSON report |
//! | `review-lens models` | Show which label models are configured and loadable |
//!
//! ## Examples
//!
//! ```bash
//! # Last three months of Spotify reviews
//! review-lens analyze "https://play.google.com/store/apps/details?id=com.spotify.music" --period 3m
//!
//! # Serve the API for the dashboard
//! RUST_LOG=review_lens=debug review-lens serve --config ./config/review-lens.toml
//! ```

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use review_lens::analyze::{parse_period, AnalyzeRequest, Analyzer};
use review_lens::config::{self, Config};
use review_lens::{server, status};

/// Review Lens: app store review analytics.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/review-lens.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "review-lens",
    about = "Review Lens: sentiment, feedback categories and trends for app store reviews",
    version,
    long_about = "Review Lens fetches an app's Google Play reviews, labels each review with a \
    sentiment and a feedback category, and reports counts, a category breakdown, trends over \
    time and a sample of feedback with suggested solutions."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/review-lens.toml`. When the file does not
    /// exist, built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/review-lens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Serves `POST /analyze` and `GET /health` on `[server].bind`.
    Serve,

    /// Analyze one app and print the report as JSON.
    ///
    /// Exits non-zero when the analysis fails; the zero-filled report with
    /// its `error` field is still printed.
    Analyze {
        /// Google Play listing URL (`https://play.google.com/store/apps/details?id=...`).
        url: String,

        /// Reporting window: `1w`, `1m`, `3m`, `6m` or `1y`.
        #[arg(long, default_value = "1y")]
        period: String,

        /// Print compact JSON instead of pretty-printed.
        #[arg(long)]
        compact: bool,
    },

    /// List the configured label models and whether they load.
    Models,
}

fn load(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        warn!(path = %path.display(), "Config file not found; using defaults");
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("review_lens=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Analyze {
            url,
            period,
            compact,
        } => {
            let analyzer = Analyzer::from_config(&cfg)?;
            let request = AnalyzeRequest::new(url, Some(period.as_str()));
            let mut rng = analyzer.rng();
            let today = Local::now().date_naive();

            let (report, failure) = match analyzer.analyze(&request, today, &mut rng).await {
                Ok(report) => (report, None),
                Err(err) => {
                    let period = parse_period(Some(period.as_str())).unwrap_or_default();
                    (analyzer.error_report(&err, period), Some(err))
                }
            };

            let json = if compact {
                serde_json::to_string(&report)
            } else {
                serde_json::to_string_pretty(&report)
            }
            .context("Failed to serialize report")?;
            println!("{}", json);

            if let Some(err) = failure {
                return Err(err.into());
            }
        }
        Commands::Models => {
            status::list_models(&cfg)?;
        }
    }

    Ok(())
}
