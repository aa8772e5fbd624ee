//! Lexicon-based polarity scoring.
//!
//! [`LexiconScorer`] turns text into a single compound score in `[-1, 1]`
//! the way rule-based scorers such as VADER do: each known word carries a
//! valence on a -4..4 scale, valences are adjusted by nearby negations and
//! intensity modifiers, a contrastive "but" shifts weight to the clause
//! after it, exclamation marks amplify, and the sum is squashed with
//! `s / sqrt(s² + 15)`.
//!
//! The built-in word list targets app-store review language. Extra entries
//! can be merged from a file in the VADER lexicon layout (`word<TAB>valence`,
//! further tab-separated columns ignored).

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Normalization constant for the compound score.
const ALPHA: f64 = 15.0;
/// Multiplier applied to a valence preceded by a negation.
const NEGATION_SCALAR: f64 = -0.74;
/// Increment contributed by a booster (or dampener) word.
const BOOSTER_INCR: f64 = 0.293;
/// Per-mark amplification for `!`, up to four marks.
const EXCLAMATION_INCR: f64 = 0.292;

const BUILTIN: &[(&str, f64)] = &[
    // positive
    ("love", 3.2),
    ("loved", 2.9),
    ("loves", 2.7),
    ("lovely", 2.8),
    ("great", 3.1),
    ("excellent", 2.7),
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("best", 3.2),
    ("perfect", 2.7),
    ("fantastic", 2.6),
    ("wonderful", 2.7),
    ("brilliant", 2.8),
    ("superb", 3.1),
    ("outstanding", 3.0),
    ("beautiful", 2.9),
    ("impressive", 2.3),
    ("enjoy", 2.2),
    ("enjoyed", 2.3),
    ("fun", 2.3),
    ("happy", 2.7),
    ("glad", 2.0),
    ("favorite", 2.0),
    ("good", 1.9),
    ("better", 1.9),
    ("nice", 1.8),
    ("helpful", 1.8),
    ("useful", 1.9),
    ("easy", 1.9),
    ("reliable", 1.8),
    ("pleased", 1.9),
    ("satisfied", 1.8),
    ("thanks", 1.9),
    ("thank", 1.5),
    ("clean", 1.7),
    ("recommend", 1.5),
    ("like", 1.5),
    ("intuitive", 1.5),
    ("cool", 1.3),
    ("smooth", 1.2),
    ("stable", 1.2),
    ("fine", 0.8),
    ("works", 0.6),
    // negative
    ("bad", -2.5),
    ("worse", -2.1),
    ("worst", -3.1),
    ("terrible", -2.1),
    ("horrible", -2.5),
    ("awful", -2.0),
    ("hate", -2.7),
    ("hated", -3.2),
    ("hates", -1.9),
    ("useless", -1.8),
    ("unusable", -2.0),
    ("annoying", -1.7),
    ("annoyed", -1.6),
    ("frustrating", -1.9),
    ("frustrated", -1.8),
    ("disappointed", -1.9),
    ("disappointing", -2.2),
    ("poor", -2.1),
    ("waste", -1.8),
    ("garbage", -2.1),
    ("trash", -1.6),
    ("scam", -2.5),
    ("angry", -2.3),
    ("stupid", -2.4),
    ("ridiculous", -1.5),
    ("pathetic", -2.2),
    ("sucks", -1.5),
    ("suck", -1.9),
    ("ugly", -2.3),
    ("boring", -1.3),
    ("sad", -2.1),
    ("wrong", -2.1),
    ("fake", -2.0),
    ("spam", -1.5),
    ("fail", -2.5),
    ("fails", -2.1),
    ("failed", -2.3),
    ("error", -1.7),
    ("errors", -1.7),
    ("problem", -1.7),
    ("problems", -1.7),
    ("issue", -0.8),
    ("issues", -0.8),
    ("crash", -1.7),
    ("crashes", -1.7),
    ("crashing", -1.7),
    ("broken", -1.6),
    ("bug", -1.0),
    ("bugs", -1.0),
    ("buggy", -1.5),
    ("glitch", -1.2),
    ("glitchy", -1.4),
    ("freezes", -1.2),
    ("lag", -1.0),
    ("laggy", -1.3),
    ("slow", -1.0),
    ("confusing", -1.3),
    ("difficult", -1.5),
    ("unfortunately", -1.5),
    ("uninstall", -1.0),
    ("uninstalled", -1.0),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "cannot", "without",
    "dont", "cant", "wont", "doesnt", "didnt", "isnt", "wasnt", "arent", "aint", "couldnt",
    "shouldnt", "wouldnt",
];

const BOOSTERS: &[(&str, f64)] = &[
    ("very", BOOSTER_INCR),
    ("really", BOOSTER_INCR),
    ("extremely", BOOSTER_INCR),
    ("so", BOOSTER_INCR),
    ("absolutely", BOOSTER_INCR),
    ("totally", BOOSTER_INCR),
    ("completely", BOOSTER_INCR),
    ("incredibly", BOOSTER_INCR),
    ("super", BOOSTER_INCR),
    ("highly", BOOSTER_INCR),
    ("most", BOOSTER_INCR),
    ("slightly", -BOOSTER_INCR),
    ("somewhat", -BOOSTER_INCR),
    ("kinda", -BOOSTER_INCR),
    ("barely", -BOOSTER_INCR),
    ("partly", -BOOSTER_INCR),
];

/// Rule-based compound polarity scorer.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    valences: HashMap<String, f64>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    /// Scorer with the built-in review lexicon.
    pub fn new() -> Self {
        Self {
            valences: BUILTIN
                .iter()
                .map(|(word, v)| (word.to_string(), *v))
                .collect(),
        }
    }

    /// Merge entries from a VADER-layout lexicon file. Returns how many
    /// entries were read. Later entries replace built-in ones.
    pub fn load_extra(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lexicon file: {}", path.display()))?;
        let mut added = 0;
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim_end();
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line.split('\t');
            let word = cols.next().unwrap_or("").trim().to_lowercase();
            let valence: f64 = cols
                .next()
                .map(str::trim)
                .ok_or_else(|| {
                    anyhow::anyhow!("{}:{}: missing valence column", path.display(), lineno + 1)
                })?
                .parse()
                .with_context(|| format!("{}:{}: invalid valence", path.display(), lineno + 1))?;
            if word.is_empty() {
                continue;
            }
            self.valences.insert(word, valence);
            added += 1;
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.valences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.valences.is_empty()
    }

    /// Compound polarity of `text` in `[-1, 1]`. Text without any known
    /// word scores exactly `0.0`.
    pub fn compound(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        let mut valences: Vec<f64> = Vec::with_capacity(tokens.len());

        for (i, token) in tokens.iter().enumerate() {
            let Some(&base) = self.valences.get(token.as_str()) else {
                valences.push(0.0);
                continue;
            };
            let mut v = base;

            // Intensity modifiers up to three words back, decaying with distance.
            for (distance, scale) in [(1usize, 1.0), (2, 0.95), (3, 0.9)] {
                if i < distance {
                    break;
                }
                if let Some((_, incr)) = BOOSTERS.iter().find(|(w, _)| *w == tokens[i - distance]) {
                    v += incr * v.signum() * scale;
                }
            }

            let window = &tokens[i.saturating_sub(3)..i];
            if window.iter().any(|t| is_negation(t)) {
                v *= NEGATION_SCALAR;
            }

            valences.push(v);
        }

        if let Some(but) = tokens.iter().position(|t| t == "but") {
            for (i, v) in valences.iter_mut().enumerate() {
                if i < but {
                    *v *= 0.5;
                } else if i > but {
                    *v *= 1.5;
                }
            }
        }

        let mut sum: f64 = valences.iter().sum();
        if sum != 0.0 {
            let marks = text.chars().filter(|&c| c == '!').count().min(4) as f64;
            sum += (marks * EXCLAMATION_INCR).copysign(sum);
        }

        normalize(sum)
    }
}

fn normalize(score: f64) -> f64 {
    let norm = score / (score * score + ALPHA).sqrt();
    norm.clamp(-1.0, 1.0)
}

fn is_negation(token: &str) -> bool {
    NEGATIONS.contains(&token) || token.ends_with("n't")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| {
            raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .trim_matches('\'')
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unknown_words_score_zero() {
        let scorer = LexiconScorer::new();
        assert_eq!(scorer.compound("The app opens on my phone."), 0.0);
        assert_eq!(scorer.compound(""), 0.0);
    }

    #[test]
    fn test_single_word_normalization() {
        let scorer = LexiconScorer::new();
        let expected = 3.2 / (3.2f64 * 3.2 + ALPHA).sqrt();
        assert!((scorer.compound("love") - expected).abs() < 1e-9);
    }

    #[test]
    fn test_polarity_direction() {
        let scorer = LexiconScorer::new();
        assert!(scorer.compound("I love this app, it is great!") > 0.5);
        assert!(scorer.compound("Terrible app, the worst, keeps crashing") < -0.5);
    }

    #[test]
    fn test_negation_flips() {
        let scorer = LexiconScorer::new();
        assert!(scorer.compound("good") > 0.0);
        assert!(scorer.compound("not good") < 0.0);
        assert!(scorer.compound("it isn't good") < 0.0);
    }

    #[test]
    fn test_booster_and_exclamation_amplify() {
        let scorer = LexiconScorer::new();
        let plain = scorer.compound("good");
        assert!(scorer.compound("very good") > plain);
        assert!(scorer.compound("good!!") > plain);
        assert!(scorer.compound("slightly good") < plain);
    }

    #[test]
    fn test_but_weights_second_clause() {
        let scorer = LexiconScorer::new();
        assert!(scorer.compound("great design but terrible performance") < 0.0);
    }

    #[test]
    fn test_bounds() {
        let scorer = LexiconScorer::new();
        let s = scorer.compound(&"love great awesome best ".repeat(50));
        assert!(s <= 1.0 && s > 0.99);
    }

    #[test]
    fn test_load_extra_lexicon() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "snappy\t2.1\t0.5\t[2, 2, 3]").unwrap();
        writeln!(file, "slow\t-2.0").unwrap();
        let mut scorer = LexiconScorer::new();
        let before = scorer.len();
        assert_eq!(scorer.load_extra(file.path()).unwrap(), 2);
        assert_eq!(scorer.len(), before + 1);
        assert!(scorer.compound("snappy") > 0.0);
        assert!(scorer.compound("slow") < LexiconScorer::new().compound("slow"));
    }

    #[test]
    fn test_load_extra_rejects_bad_valence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "snappy\tfast").unwrap();
        assert!(LexiconScorer::new().load_extra(file.path()).is_err());
    }
}
