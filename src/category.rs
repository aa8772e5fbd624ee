//! Category labeling.
//!
//! A [`CategoryLabeler`] assigns one label from the configured category set
//! to a review. The topical guess comes from a [`CategoryModel`] (trained
//! bag-of-words artifacts or a remote zero-shot model); a keyword override
//! pass then gets the last word, so that e.g. "force exit" is always filed
//! under Bugs.
//!
//! When the model cannot be loaded the labeler still exists, with an
//! [`CategoryBackend::Unavailable`] backend. Callers check
//! [`CategoryLabeler::unavailable_reason`] and report the degradation
//! instead of labeling.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bag_of_words::BagOfWordsModel;
use crate::config::{CategoryStrategyKind, Config, OverrideRuleConfig};
use crate::inference::{InferenceClient, ZeroShotModel};
use crate::models::LabelSet;
use crate::traits::CategoryModel;

/// Tag reported as `category_model` when no model is loaded.
pub const UNAVAILABLE: &str = "unavailable";

/// One keyword override: any keyword found in the text selects `label`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRule {
    label: String,
    keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new<I, S>(label: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            label: label.into(),
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Case-insensitive substring match. `lowered` must already be lowercase.
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Ordered keyword rules, first match wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideRules {
    rules: Vec<KeywordRule>,
}

impl OverrideRules {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }

    pub fn from_config(rules: &[OverrideRuleConfig]) -> Self {
        Self::new(
            rules
                .iter()
                .map(|r| KeywordRule::new(r.label.clone(), &r.keywords))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The label of the first rule matching `text`, if any.
    pub fn apply(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(KeywordRule::label)
    }
}

/// The loaded category model, or why there is none.
pub enum CategoryBackend {
    Available(Arc<dyn CategoryModel>),
    Unavailable { reason: String },
}

/// Labels review text with one category from a fixed set.
pub struct CategoryLabeler {
    labels: LabelSet,
    fallback: String,
    backend: CategoryBackend,
    overrides: OverrideRules,
}

impl CategoryLabeler {
    /// Build a labeler. The fallback and every override label must belong to
    /// `labels`.
    pub fn new(
        labels: LabelSet,
        fallback: impl Into<String>,
        backend: CategoryBackend,
        overrides: OverrideRules,
    ) -> Result<Self> {
        let fallback = fallback.into();
        if !labels.contains(&fallback) {
            bail!("fallback category '{}' is not in the category set", fallback);
        }
        if let Some(rule) = overrides.rules.iter().find(|r| !labels.contains(r.label())) {
            bail!(
                "override category '{}' is not in the category set",
                rule.label()
            );
        }
        Ok(Self {
            labels,
            fallback,
            backend,
            overrides,
        })
    }

    /// Build the labeler described by `[categories]`.
    ///
    /// Missing or malformed bag-of-words artifacts do not fail startup; the
    /// backend becomes `Unavailable` and a warning is logged.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cfg = &config.categories;
        let labels = cfg.label_set()?;

        let backend = match cfg.strategy {
            CategoryStrategyKind::Disabled => CategoryBackend::Unavailable {
                reason: "category classification is disabled".to_string(),
            },
            CategoryStrategyKind::BagOfWords => {
                match BagOfWordsModel::load(&cfg.vectorizer_path, &cfg.classifier_path) {
                    Ok(model) => {
                        info!(
                            classes = model.classes().len(),
                            vocabulary = model.vocabulary_size(),
                            "Loaded bag-of-words category model"
                        );
                        for class in model.classes().iter().filter(|c| !labels.contains(c)) {
                            warn!(
                                class = %class,
                                fallback = %cfg.fallback,
                                "Model class outside the category set will map to the fallback"
                            );
                        }
                        CategoryBackend::Available(Arc::new(model))
                    }
                    Err(e) => {
                        warn!(error = %format!("{:#}", e), "Category model unavailable");
                        CategoryBackend::Unavailable {
                            reason: format!("category model unavailable: {:#}", e),
                        }
                    }
                }
            }
            CategoryStrategyKind::ZeroShot => {
                let client = InferenceClient::from_config(&config.inference)?;
                let model = ZeroShotModel::new(client, cfg.model.clone());
                info!(model = model.model(), "Using zero-shot category model");
                CategoryBackend::Available(Arc::new(model))
            }
        };

        Self::new(
            labels,
            cfg.fallback.clone(),
            backend,
            OverrideRules::from_config(&cfg.override_rules()),
        )
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// `category_model` tag: the model's strategy name or `"unavailable"`.
    pub fn model_name(&self) -> &str {
        match &self.backend {
            CategoryBackend::Available(model) => model.name(),
            CategoryBackend::Unavailable { .. } => UNAVAILABLE,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.backend {
            CategoryBackend::Available(_) => None,
            CategoryBackend::Unavailable { reason } => Some(reason),
        }
    }

    /// Label one review, or `None` when no model is available.
    ///
    /// Overrides take precedence over the model, so a matching rule skips
    /// the model call. Model errors and labels outside the set become the
    /// fallback.
    pub async fn label(&self, text: &str) -> Option<String> {
        let model = match &self.backend {
            CategoryBackend::Available(model) => model,
            CategoryBackend::Unavailable { .. } => return None,
        };

        if let Some(label) = self.overrides.apply(text) {
            return Some(label.to_string());
        }

        let label = match model.classify(text, &self.labels).await {
            Ok(label) if self.labels.contains(&label) => label,
            Ok(label) => {
                debug!(predicted = %label, "Predicted category outside the set; using fallback");
                self.fallback.clone()
            }
            Err(e) => {
                warn!(
                    model = model.name(),
                    error = %e,
                    "Category classification failed; using fallback"
                );
                self.fallback.clone()
            }
        };
        Some(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag_of_words::{ClassifierArtifact, VectorizerArtifact};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedModel {
        label: &'static str,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn new(label: &'static str) -> Self {
            Self {
                label,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CategoryModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn classify(&self, _text: &str, _candidates: &LabelSet) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.label.to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl CategoryModel for FailingModel {
        fn name(&self) -> &str {
            "failing"
        }
        async fn classify(&self, _text: &str, _candidates: &LabelSet) -> Result<String> {
            bail!("model offline")
        }
    }

    fn labeler(model: Arc<dyn CategoryModel>) -> CategoryLabeler {
        let cfg = Config::default();
        CategoryLabeler::new(
            cfg.categories.label_set().unwrap(),
            "Others",
            CategoryBackend::Available(model),
            OverrideRules::from_config(&cfg.categories.override_rules()),
        )
        .unwrap()
    }

    #[test]
    fn test_overrides_first_match_wins() {
        let rules = OverrideRules::from_config(&Config::default().categories.override_rules());
        assert_eq!(rules.apply("Had to FORCE EXIT twice"), Some("Bugs"));
        // "crash" (Bugs) outranks "slow" (Performance).
        assert_eq!(rules.apply("slow and then a crash"), Some("Bugs"));
        assert_eq!(rules.apply("so much lag"), Some("Performance"));
        assert_eq!(rules.apply("the back button does nothing"), Some("Navigation Issues"));
        assert_eq!(rules.apply("please add dark mode"), None);
    }

    #[tokio::test]
    async fn test_force_exit_is_bugs_regardless_of_model() {
        let model = Arc::new(FixedModel::new("Feature Requests"));
        let labeler = labeler(model.clone());
        assert_eq!(
            labeler.label("I have to force exit every time").await.as_deref(),
            Some("Bugs")
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            labeler.label("please add dark mode").await.as_deref(),
            Some("Feature Requests")
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_prediction_collapses_to_fallback() {
        let labeler = labeler(Arc::new(FixedModel::new("Positive")));
        assert_eq!(labeler.label("nice colors").await.as_deref(), Some("Others"));
    }

    #[tokio::test]
    async fn test_model_error_uses_fallback() {
        let labeler = labeler(Arc::new(FailingModel));
        assert_eq!(labeler.label("nice colors").await.as_deref(), Some("Others"));
        assert_eq!(labeler.model_name(), "failing");
    }

    #[tokio::test]
    async fn test_unavailable_backend_labels_nothing() {
        let labeler = CategoryLabeler::new(
            LabelSet::new(["Bugs", "Others"]).unwrap(),
            "Others",
            CategoryBackend::Unavailable {
                reason: "no artifacts".into(),
            },
            OverrideRules::default(),
        )
        .unwrap();
        assert_eq!(labeler.label("force exit").await, None);
        assert_eq!(labeler.model_name(), UNAVAILABLE);
        assert_eq!(labeler.unavailable_reason(), Some("no artifacts"));
    }

    #[test]
    fn test_rejects_fallback_outside_set() {
        let result = CategoryLabeler::new(
            LabelSet::new(["Bugs"]).unwrap(),
            "Others",
            CategoryBackend::Unavailable {
                reason: String::new(),
            },
            OverrideRules::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_artifacts_degrade_to_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.categories.vectorizer_path = dir.path().join("vectorizer.json");
        cfg.categories.classifier_path = dir.path().join("classifier.json");
        let labeler = CategoryLabeler::from_config(&cfg).unwrap();
        assert_eq!(labeler.model_name(), UNAVAILABLE);
        assert!(labeler
            .unavailable_reason()
            .unwrap()
            .contains("vectorizer.json"));
    }

    #[test]
    fn test_disabled_strategy_is_unavailable() {
        let mut cfg = Config::default();
        cfg.categories.strategy = CategoryStrategyKind::Disabled;
        let labeler = CategoryLabeler::from_config(&cfg).unwrap();
        assert!(labeler.unavailable_reason().unwrap().contains("disabled"));
    }

    #[tokio::test]
    async fn test_bag_of_words_backend() {
        let vectorizer = VectorizerArtifact {
            vocabulary: HashMap::from([("dark".to_string(), 0), ("mode".to_string(), 1)]),
            idf: vec![1.0, 1.0],
            lowercase: true,
            sublinear_tf: false,
            norm: Some("l2".into()),
        };
        let classifier = ClassifierArtifact {
            classes: vec!["Feature Requests".into(), "Others".into()],
            class_log_prior: vec![-0.7, -0.7],
            feature_log_prob: vec![vec![-0.1, -0.1], vec![-3.0, -3.0]],
        };
        let model = BagOfWordsModel::from_artifacts(vectorizer, classifier).unwrap();
        let labeler = labeler(Arc::new(model));
        assert_eq!(labeler.model_name(), "bag_of_words");
        assert_eq!(
            labeler.label("Please add dark mode").await.as_deref(),
            Some("Feature Requests")
        );
    }
}
