//! Sentiment labeling.
//!
//! A [`SentimentLabeler`] maps one review's text to one label of the
//! configured sentiment vocabulary using one of two strategies:
//!
//! - **Model**: a [`PolarityModel`] returns class probabilities; the arg-max
//!   class is refined by a confidence threshold ([`ProbabilityMapping`]).
//! - **Lexicon**: the [`LexiconScorer`] compound score is matched against an
//!   ordered cutoff list ([`CompoundCutoffs`]).
//!
//! Labeling never fails: a scoring error is logged and the review gets the
//! neutral label.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, SentimentScheme, SentimentStrategyKind};
use crate::inference::{InferenceClient, RemoteSentimentModel};
use crate::lexicon::LexiconScorer;
use crate::models::LabelSet;
use crate::traits::{ClassScore, Polarity, PolarityModel};

const NEUTRAL: &str = "Neutral";

/// One step of a compound-score cutoff chain.
#[derive(Debug, Clone, PartialEq)]
pub enum CompoundRule {
    /// Matches when `score >= bound`.
    AtLeast(f64, String),
    /// Matches when `score <= bound`.
    AtMost(f64, String),
}

impl CompoundRule {
    fn matches(&self, score: f64) -> Option<&str> {
        match self {
            CompoundRule::AtLeast(bound, label) if score >= *bound => Some(label.as_str()),
            CompoundRule::AtMost(bound, label) if score <= *bound => Some(label.as_str()),
            _ => None,
        }
    }

    fn label(&self) -> &str {
        match self {
            CompoundRule::AtLeast(_, label) | CompoundRule::AtMost(_, label) => label.as_str(),
        }
    }
}

/// Ordered compound-score cutoffs, evaluated first-match-wins.
///
/// Strong rules come before mild ones, so a score sitting exactly on a
/// boundary resolves to the higher-magnitude label.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundCutoffs {
    rules: Vec<CompoundRule>,
    fallback: String,
}

impl CompoundCutoffs {
    pub fn new(rules: Vec<CompoundRule>, fallback: impl Into<String>) -> Self {
        Self {
            rules,
            fallback: fallback.into(),
        }
    }

    /// `>= strong` Delighted, `<= -strong` Angry, `>= mild` Happy,
    /// `<= -mild` Frustrated, otherwise Neutral.
    pub fn five_level(strong: f64, mild: f64) -> Self {
        Self::new(
            vec![
                CompoundRule::AtLeast(strong, "Delighted".into()),
                CompoundRule::AtMost(-strong, "Angry".into()),
                CompoundRule::AtLeast(mild, "Happy".into()),
                CompoundRule::AtMost(-mild, "Frustrated".into()),
            ],
            NEUTRAL,
        )
    }

    /// `>= mild` Happy, `<= -mild` Frustrated, otherwise Neutral.
    pub fn three_level(mild: f64) -> Self {
        Self::new(
            vec![
                CompoundRule::AtLeast(mild, "Happy".into()),
                CompoundRule::AtMost(-mild, "Frustrated".into()),
            ],
            NEUTRAL,
        )
    }

    pub fn label(&self, score: f64) -> &str {
        self.rules
            .iter()
            .find_map(|rule| rule.matches(score))
            .unwrap_or(self.fallback.as_str())
    }

    fn labels(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .map(CompoundRule::label)
            .chain(std::iter::once(self.fallback.as_str()))
    }
}

/// Refines a model's arg-max polarity into the configured vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMapping {
    pub threshold: f64,
    pub strong_positive: String,
    pub positive: String,
    pub neutral: String,
    pub negative: String,
    pub strong_negative: String,
}

impl ProbabilityMapping {
    pub fn five_level(threshold: f64) -> Self {
        Self {
            threshold,
            strong_positive: "Delighted".into(),
            positive: "Happy".into(),
            neutral: NEUTRAL.into(),
            negative: "Frustrated".into(),
            strong_negative: "Angry".into(),
        }
    }

    /// Three labels only, so confidence does not change the outcome.
    pub fn three_level(threshold: f64) -> Self {
        Self {
            threshold,
            strong_positive: "Happy".into(),
            positive: "Happy".into(),
            neutral: NEUTRAL.into(),
            negative: "Frustrated".into(),
            strong_negative: "Frustrated".into(),
        }
    }

    pub fn label(&self, scores: &[ClassScore]) -> Result<&str> {
        let Some(top) = scores
            .iter()
            .filter(|s| s.score.is_finite())
            .max_by(|a, b| a.score.total_cmp(&b.score))
        else {
            bail!("model returned no class scores");
        };
        let strong = top.score >= self.threshold;
        let label = match (top.polarity, strong) {
            (Polarity::Positive, true) => &self.strong_positive,
            (Polarity::Positive, false) => &self.positive,
            (Polarity::Negative, true) => &self.strong_negative,
            (Polarity::Negative, false) => &self.negative,
            (Polarity::Neutral, _) => &self.neutral,
        };
        Ok(label.as_str())
    }

    fn labels(&self) -> impl Iterator<Item = &str> {
        [
            &self.strong_positive,
            &self.positive,
            &self.neutral,
            &self.negative,
            &self.strong_negative,
        ]
        .into_iter()
        .map(String::as_str)
    }
}

/// How sentiment is scored. Built once at startup.
pub enum SentimentStrategy {
    Model {
        model: Arc<dyn PolarityModel>,
        mapping: ProbabilityMapping,
    },
    Lexicon {
        scorer: LexiconScorer,
        cutoffs: CompoundCutoffs,
    },
}

impl SentimentStrategy {
    pub fn name(&self) -> &str {
        match self {
            SentimentStrategy::Model { model, .. } => model.name(),
            SentimentStrategy::Lexicon { .. } => "lexicon",
        }
    }
}

/// Labels review text with one sentiment from a fixed vocabulary.
pub struct SentimentLabeler {
    labels: LabelSet,
    neutral: String,
    strategy: SentimentStrategy,
}

impl SentimentLabeler {
    /// Build a labeler, checking that every label the strategy can produce
    /// (and the neutral fallback) belongs to `labels`.
    pub fn new(
        labels: LabelSet,
        neutral: impl Into<String>,
        strategy: SentimentStrategy,
    ) -> Result<Self> {
        let neutral = neutral.into();
        let produced: Vec<&str> = match &strategy {
            SentimentStrategy::Model { mapping, .. } => mapping.labels().collect(),
            SentimentStrategy::Lexicon { cutoffs, .. } => cutoffs.labels().collect(),
        };
        for label in produced.into_iter().chain(std::iter::once(neutral.as_str())) {
            if !labels.contains(label) {
                bail!("sentiment label '{}' is not in the configured vocabulary", label);
            }
        }
        Ok(Self {
            labels,
            neutral,
            strategy,
        })
    }

    /// Build the labeler described by `[sentiment]`, constructing the
    /// remote model client when the `model` strategy is selected.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cfg = &config.sentiment;
        let labels = cfg.label_set()?;
        let strategy = match cfg.strategy {
            SentimentStrategyKind::Lexicon => {
                let mut scorer = LexiconScorer::new();
                if let Some(path) = &cfg.lexicon_path {
                    let added = scorer.load_extra(path)?;
                    info!(path = %path.display(), added, "Loaded extra lexicon entries");
                }
                let cutoffs = match cfg.scheme {
                    SentimentScheme::Five => {
                        CompoundCutoffs::five_level(cfg.strong_cutoff, cfg.mild_cutoff())
                    }
                    SentimentScheme::Three => CompoundCutoffs::three_level(cfg.mild_cutoff()),
                };
                SentimentStrategy::Lexicon { scorer, cutoffs }
            }
            SentimentStrategyKind::Model => {
                let client = InferenceClient::from_config(&config.inference)?;
                let model = RemoteSentimentModel::new(client, cfg.model.clone());
                let mapping = match cfg.scheme {
                    SentimentScheme::Five => {
                        ProbabilityMapping::five_level(cfg.confidence_threshold)
                    }
                    SentimentScheme::Three => {
                        ProbabilityMapping::three_level(cfg.confidence_threshold)
                    }
                };
                SentimentStrategy::Model {
                    model: Arc::new(model),
                    mapping,
                }
            }
        };
        Self::new(labels, NEUTRAL, strategy)
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn neutral(&self) -> &str {
        &self.neutral
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Label one review. Scoring errors fall back to the neutral label.
    pub async fn label(&self, text: &str) -> String {
        match &self.strategy {
            SentimentStrategy::Lexicon { scorer, cutoffs } => {
                cutoffs.label(scorer.compound(text)).to_string()
            }
            SentimentStrategy::Model { model, mapping } => {
                let scored = model
                    .class_scores(text)
                    .await
                    .and_then(|scores| mapping.label(&scores).map(str::to_string));
                match scored {
                    Ok(label) => label,
                    Err(e) => {
                        warn!(
                            model = model.name(),
                            error = %e,
                            "Sentiment scoring failed; using neutral"
                        );
                        self.neutral.clone()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedModel(Vec<ClassScore>);

    #[async_trait]
    impl PolarityModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn class_scores(&self, _text: &str) -> Result<Vec<ClassScore>> {
            Ok(self.0.clone())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl PolarityModel for FailingModel {
        fn name(&self) -> &str {
            "failing"
        }
        async fn class_scores(&self, _text: &str) -> Result<Vec<ClassScore>> {
            bail!("inference endpoint unavailable")
        }
    }

    fn five_labels() -> LabelSet {
        LabelSet::new(SentimentScheme::Five.labels().iter().copied()).unwrap()
    }

    fn scores(pos: f64, neu: f64, neg: f64) -> Vec<ClassScore> {
        vec![
            ClassScore { polarity: Polarity::Positive, score: pos },
            ClassScore { polarity: Polarity::Neutral, score: neu },
            ClassScore { polarity: Polarity::Negative, score: neg },
        ]
    }

    #[test]
    fn test_five_level_boundaries() {
        let c = CompoundCutoffs::five_level(0.5, 0.1);
        assert_eq!(c.label(0.5), "Delighted");
        assert_eq!(c.label(0.4999), "Happy");
        assert_eq!(c.label(0.1), "Happy");
        assert_eq!(c.label(0.0999), "Neutral");
        assert_eq!(c.label(0.0), "Neutral");
        assert_eq!(c.label(-0.1), "Frustrated");
        assert_eq!(c.label(-0.5), "Angry");
        assert_eq!(c.label(-1.0), "Angry");
    }

    #[test]
    fn test_three_level_boundaries() {
        let c = CompoundCutoffs::three_level(0.3);
        assert_eq!(c.label(0.3), "Happy");
        assert_eq!(c.label(0.29), "Neutral");
        assert_eq!(c.label(-0.3), "Frustrated");
        assert_eq!(c.label(0.9), "Happy");
    }

    #[test]
    fn test_probability_mapping_threshold() {
        let m = ProbabilityMapping::five_level(0.8);
        assert_eq!(m.label(&scores(0.8, 0.1, 0.1)).unwrap(), "Delighted");
        assert_eq!(m.label(&scores(0.79, 0.11, 0.1)).unwrap(), "Happy");
        assert_eq!(m.label(&scores(0.05, 0.1, 0.85)).unwrap(), "Angry");
        assert_eq!(m.label(&scores(0.2, 0.1, 0.7)).unwrap(), "Frustrated");
        assert_eq!(m.label(&scores(0.0, 0.99, 0.01)).unwrap(), "Neutral");
        assert!(m.label(&[]).is_err());
    }

    #[test]
    fn test_three_level_mapping_ignores_confidence() {
        let m = ProbabilityMapping::three_level(0.8);
        assert_eq!(m.label(&scores(0.95, 0.03, 0.02)).unwrap(), "Happy");
        assert_eq!(m.label(&scores(0.02, 0.03, 0.95)).unwrap(), "Frustrated");
    }

    #[test]
    fn test_rejects_labels_outside_vocabulary() {
        let three = LabelSet::new(SentimentScheme::Three.labels().iter().copied()).unwrap();
        let strategy = SentimentStrategy::Lexicon {
            scorer: LexiconScorer::new(),
            cutoffs: CompoundCutoffs::five_level(0.5, 0.1),
        };
        assert!(SentimentLabeler::new(three, NEUTRAL, strategy).is_err());
    }

    #[tokio::test]
    async fn test_model_strategy_labels() {
        let labeler = SentimentLabeler::new(
            five_labels(),
            NEUTRAL,
            SentimentStrategy::Model {
                model: Arc::new(FixedModel(scores(0.9, 0.05, 0.05))),
                mapping: ProbabilityMapping::five_level(0.8),
            },
        )
        .unwrap();
        assert_eq!(labeler.label("whatever").await, "Delighted");
        assert_eq!(labeler.strategy_name(), "fixed");
    }

    #[tokio::test]
    async fn test_model_failure_defaults_to_neutral() {
        let labeler = SentimentLabeler::new(
            five_labels(),
            NEUTRAL,
            SentimentStrategy::Model {
                model: Arc::new(FailingModel),
                mapping: ProbabilityMapping::five_level(0.8),
            },
        )
        .unwrap();
        assert_eq!(labeler.label("I love it").await, "Neutral");
    }

    #[tokio::test]
    async fn test_lexicon_strategy_from_default_config() {
        let labeler = SentimentLabeler::from_config(&Config::default()).unwrap();
        assert_eq!(labeler.strategy_name(), "lexicon");
        assert_eq!(labeler.label("I love this app, it is great!").await, "Delighted");
        assert_eq!(labeler.label("It opens.").await, "Neutral");
        assert_eq!(
            labeler.label("Terrible app, the worst, keeps crashing").await,
            "Angry"
        );
    }
}
