//! Trained bag-of-words category classifier.
//!
//! The classifier is loaded from two fitted artifacts persisted as JSON:
//!
//! - **vectorizer**: TF-IDF vocabulary and weights:
//!   ```json
//!   { "vocabulary": { "crash": 0, "slow": 1 }, "idf": [1.4, 1.9],
//!     "lowercase": true, "sublinear_tf": false, "norm": "l2" }
//!   ```
//! - **classifier**: multinomial naive Bayes parameters:
//!   ```json
//!   { "classes": ["Bugs", "Performance"],
//!     "class_log_prior": [-0.69, -0.69],
//!     "feature_log_prob": [[-0.2, -1.8], [-1.8, -0.2]] }
//!   ```
//!
//! Tokens are runs of two or more word characters (`\b\w\w+\b`). The
//! document vector holds term counts (or `1 + ln(count)` when
//! `sublinear_tf`), scaled by `idf` and L2-normalized. The predicted class is
//! the arg-max of `class_log_prior + x · feature_log_prob`; ties go to the
//! first class.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::models::LabelSet;
use crate::traits::CategoryModel;

const TOKEN_PATTERN: &str = r"\b\w\w+\b";

#[derive(Debug, Clone, Deserialize)]
pub struct VectorizerArtifact {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    #[serde(default = "default_lowercase")]
    pub lowercase: bool,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default = "default_norm")]
    pub norm: Option<String>,
}

fn default_lowercase() -> bool {
    true
}
fn default_norm() -> Option<String> {
    Some("l2".to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierArtifact {
    pub classes: Vec<String>,
    pub class_log_prior: Vec<f64>,
    pub feature_log_prob: Vec<Vec<f64>>,
}

/// A fitted TF-IDF vectorizer + multinomial naive Bayes pair.
pub struct BagOfWordsModel {
    vectorizer: VectorizerArtifact,
    classifier: ClassifierArtifact,
    token_re: Regex,
}

impl BagOfWordsModel {
    /// Load and cross-check both artifacts.
    pub fn load(vectorizer_path: &Path, classifier_path: &Path) -> Result<Self> {
        let vectorizer: VectorizerArtifact = read_json(vectorizer_path)?;
        let classifier: ClassifierArtifact = read_json(classifier_path)?;
        Self::from_artifacts(vectorizer, classifier)
    }

    pub fn from_artifacts(
        vectorizer: VectorizerArtifact,
        classifier: ClassifierArtifact,
    ) -> Result<Self> {
        let n_features = vectorizer.idf.len();
        if let Some((term, &col)) = vectorizer.vocabulary.iter().find(|(_, &c)| c >= n_features) {
            bail!(
                "vectorizer term '{}' maps to column {} but idf has {} entries",
                term,
                col,
                n_features
            );
        }
        match vectorizer.norm.as_deref() {
            None | Some("l2") => {}
            Some(other) => bail!("unsupported vectorizer norm '{}'", other),
        }

        let n_classes = classifier.classes.len();
        if n_classes == 0 {
            bail!("classifier has no classes");
        }
        if classifier.class_log_prior.len() != n_classes
            || classifier.feature_log_prob.len() != n_classes
        {
            bail!(
                "classifier has {} classes but {} priors and {} probability rows",
                n_classes,
                classifier.class_log_prior.len(),
                classifier.feature_log_prob.len()
            );
        }
        if let Some(row) = classifier
            .feature_log_prob
            .iter()
            .position(|r| r.len() != n_features)
        {
            bail!(
                "classifier row {} has {} features, vectorizer has {}",
                row,
                classifier.feature_log_prob[row].len(),
                n_features
            );
        }

        let token_re = Regex::new(TOKEN_PATTERN).context("Invalid token pattern")?;
        Ok(Self {
            vectorizer,
            classifier,
            token_re,
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classifier.classes
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.idf.len()
    }

    /// Sparse TF-IDF vector of `text` as `(column, weight)` pairs.
    fn vectorize(&self, text: &str) -> Vec<(usize, f64)> {
        let text = if self.vectorizer.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let mut counts: HashMap<usize, f64> = HashMap::new();
        for m in self.token_re.find_iter(&text) {
            if let Some(&col) = self.vectorizer.vocabulary.get(m.as_str()) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }

        let mut weights: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(col, tf)| {
                let tf = if self.vectorizer.sublinear_tf {
                    1.0 + tf.ln()
                } else {
                    tf
                };
                (col, tf * self.vectorizer.idf[col])
            })
            .collect();
        weights.sort_by_key(|(col, _)| *col);

        if self.vectorizer.norm.is_some() {
            let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for (_, w) in &mut weights {
                    *w /= norm;
                }
            }
        }
        weights
    }

    /// Predict the class of one text.
    pub fn predict(&self, text: &str) -> &str {
        let x = self.vectorize(text);
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (class, prior) in self.classifier.class_log_prior.iter().enumerate() {
            let row = &self.classifier.feature_log_prob[class];
            let score = prior + x.iter().map(|(col, w)| w * row[*col]).sum::<f64>();
            if score > best_score {
                best = class;
                best_score = score;
            }
        }
        &self.classifier.classes[best]
    }
}

#[async_trait]
impl CategoryModel for BagOfWordsModel {
    fn name(&self) -> &str {
        "bag_of_words"
    }

    async fn classify(&self, text: &str, _candidates: &LabelSet) -> Result<String> {
        Ok(self.predict(text).to_string())
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model artifact: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse model artifact: {}", path.display()))
}
