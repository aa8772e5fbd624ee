use anyhow::Result;

use crate::bag_of_words::BagOfWordsModel;
use crate::config::{CategoryStrategyKind, Config, SentimentStrategyKind};
use crate::lexicon::LexiconScorer;

/// One row of `review-lens models`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStatus {
    pub channel: &'static str,
    pub strategy: String,
    pub status: String,
    pub healthy: bool,
}

/// Check every configured label model without serving a request.
///
/// Local artifacts are loaded; remote models are reported but not probed.
pub fn model_statuses(config: &Config) -> Vec<ModelStatus> {
    let token_set = std::env::var(&config.inference.token_env)
        .map(|t| !t.trim().is_empty())
        .unwrap_or(false);
    let remote = |model: &str| ModelStatus {
        channel: "",
        strategy: model.to_string(),
        status: format!(
            "REMOTE ({} token)",
            if token_set { "with" } else { "no" }
        ),
        healthy: true,
    };

    let sentiment = match config.sentiment.strategy {
        SentimentStrategyKind::Lexicon => {
            let mut scorer = LexiconScorer::new();
            let loaded = match &config.sentiment.lexicon_path {
                Some(path) => scorer.load_extra(path).map(|_| ()),
                None => Ok(()),
            };
            let (status, healthy) = match loaded {
                Ok(()) => (format!("OK ({} words)", scorer.len()), true),
                Err(e) => (format!("ERROR ({:#})", e), false),
            };
            ModelStatus {
                channel: "",
                strategy: "lexicon".to_string(),
                status,
                healthy,
            }
        }
        SentimentStrategyKind::Model => remote(&config.sentiment.model),
    };

    let cfg = &config.categories;
    let categories = match cfg.strategy {
        CategoryStrategyKind::Disabled => ModelStatus {
            channel: "",
            strategy: "disabled".to_string(),
            status: "DISABLED".to_string(),
            healthy: false,
        },
        CategoryStrategyKind::BagOfWords => {
            let (status, healthy) =
                match BagOfWordsModel::load(&cfg.vectorizer_path, &cfg.classifier_path) {
                    Ok(model) => (
                        format!(
                            "OK ({} classes, {} terms)",
                            model.classes().len(),
                            model.vocabulary_size()
                        ),
                        true,
                    ),
                    Err(e) => (format!("UNAVAILABLE ({:#})", e), false),
                };
            ModelStatus {
                channel: "",
                strategy: "bag_of_words".to_string(),
                status,
                healthy,
            }
        }
        CategoryStrategyKind::ZeroShot => remote(&cfg.model),
    };

    vec![
        ModelStatus {
            channel: "sentiment",
            ..sentiment
        },
        ModelStatus {
            channel: "categories",
            ..categories
        },
    ]
}

pub fn list_models(config: &Config) -> Result<()> {
    println!("{:<12} {:<50} {:<8} STATUS", "CHANNEL", "STRATEGY", "HEALTHY");
    for row in model_statuses(config) {
        println!(
            "{:<12} {:<50} {:<8} {}",
            row.channel, row.strategy, row.healthy, row.status
        );
    }
    Ok(())
}
