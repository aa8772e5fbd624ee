//! Core data models used throughout Review Lens.
//!
//! These types represent the reviews, label vocabularies, and label tallies
//! that flow through the fetch → label → aggregate pipeline. Everything here
//! is created per request and dropped once the response is written.

use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::AnalyzeError;

/// Opaque storefront identifier of an app (e.g. `com.spotify.music`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single user review as returned by a review source.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    pub text: String,
    /// Calendar date the review was posted, `None` when the source did not
    /// report one.
    pub posted_on: Option<NaiveDate>,
}

impl Review {
    pub fn new(text: impl Into<String>, posted_on: Option<NaiveDate>) -> Self {
        Self {
            text: text.into(),
            posted_on,
        }
    }
}

/// Store listing details shown next to the analysis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppMetadata {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub icon: Option<String>,
}

/// Reporting window requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Period {
    OneWeek,
    OneMonth,
    ThreeMonths,
    SixMonths,
    #[default]
    OneYear,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::OneWeek,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
    ];

    /// The request token for this period (`"1w"`, `"1m"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneWeek => "1w",
            Period::OneMonth => "1m",
            Period::ThreeMonths => "3m",
            Period::SixMonths => "6m",
            Period::OneYear => "1y",
        }
    }

    /// Length of the window in days.
    pub fn days(&self) -> u64 {
        match self {
            Period::OneWeek => 7,
            Period::OneMonth => 30,
            Period::ThreeMonths => 90,
            Period::SixMonths => 180,
            Period::OneYear => 365,
        }
    }
}

impl FromStr for Period {
    type Err = AnalyzeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AnalyzeError::InvalidPeriod(s.to_string()))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// An ordered, non-empty vocabulary of label names.
///
/// Both the sentiment and the category vocabularies are `LabelSet`s. The
/// order is the order labels appear in JSON output. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Arc<[String]>,
}

impl LabelSet {
    /// Build a label set, rejecting empty, blank, or duplicate labels.
    pub fn new<I, S>(labels: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            anyhow::bail!("label set must not be empty");
        }
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                anyhow::bail!("label set contains a blank label");
            }
            if labels[..i].contains(label) {
                anyhow::bail!("label set contains duplicate label '{}'", label);
            }
        }
        Ok(Self {
            labels: labels.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Per-label tally over one [`LabelSet`].
///
/// Every label of the set is always present (zero-filled), so the JSON
/// shape does not depend on the data.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCounts {
    labels: LabelSet,
    counts: Vec<u64>,
}

impl LabelCounts {
    pub fn zeroed(labels: &LabelSet) -> Self {
        Self {
            labels: labels.clone(),
            counts: vec![0; labels.len()],
        }
    }

    /// Add one to `label`. Returns `false` (and counts nothing) when the
    /// label is not part of the set.
    pub fn increment(&mut self, label: &str) -> bool {
        match self.labels.index_of(label) {
            Some(i) => {
                self.counts[i] += 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, label: &str) -> u64 {
        self.labels
            .index_of(label)
            .map(|i| self.counts[i])
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.labels.iter().zip(self.counts.iter().copied())
    }
}

impl Serialize for LabelCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label, &count)?;
        }
        map.end()
    }
}

/// Per-label percentages (0 to 100, two decimals) over one [`LabelSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct LabelShares {
    labels: LabelSet,
    shares: Vec<f64>,
}

impl LabelShares {
    /// Convert counts into rounded percentages of their total.
    ///
    /// An all-zero tally yields all-zero shares.
    pub fn from_counts(counts: &LabelCounts) -> Self {
        let total = counts.total();
        let shares = counts
            .iter()
            .map(|(_, n)| {
                if total == 0 {
                    0.0
                } else {
                    round2(n as f64 * 100.0 / total as f64)
                }
            })
            .collect();
        Self {
            labels: counts.labels().clone(),
            shares,
        }
    }

    pub fn get(&self, label: &str) -> f64 {
        self.labels
            .index_of(label)
            .map(|i| self.shares[i])
            .unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.shares.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels.iter().zip(self.shares.iter().copied())
    }
}

impl Serialize for LabelShares {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.shares.len()))?;
        for (label, share) in self.iter() {
            map.serialize_entry(label, &share)?;
        }
        map.end()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
