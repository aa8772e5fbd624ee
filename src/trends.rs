//! Period-scoped sentiment trend buckets.
//!
//! Reviews dated on or after `today - period.days()` are grouped into time
//! buckets whose granularity depends on the period:
//!
//! | period | bucket | label | sort key |
//! |---|---|---|---|
//! | `1y`, `6m` | calendar month | `Mar 2026` | first of month |
//! | `3m` | six 14-day windows from the cutoff | window start, `Oct 04` | window start |
//! | `1m` | four 7-day windows from the cutoff | window start, `Oct 04` | window start |
//! | `1w` | weekday | `Monday` | review date |
//!
//! Days past the last full window join the last window. Every bucket holds a
//! zero-filled tally of all sentiment labels. Buckets are ordered by sort key,
//! then label; a label keeps the first sort key it was seen with.

use chrono::{Datelike, Duration, NaiveDate};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

use crate::models::{LabelCounts, LabelSet, Period};

/// How dates are grouped for one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Month,
    /// `count` consecutive windows of `days` days starting at the cutoff.
    Window { days: i64, count: i64 },
    Weekday,
}

impl Granularity {
    pub fn for_period(period: Period) -> Self {
        match period {
            Period::OneYear | Period::SixMonths => Granularity::Month,
            Period::ThreeMonths => Granularity::Window { days: 14, count: 6 },
            Period::OneMonth => Granularity::Window { days: 7, count: 4 },
            Period::OneWeek => Granularity::Weekday,
        }
    }

    /// Bucket label and sort key of `date`.
    fn bucket(&self, date: NaiveDate, cutoff: NaiveDate) -> (String, NaiveDate) {
        match *self {
            Granularity::Month => {
                let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
                (date.format("%b %Y").to_string(), first)
            }
            Granularity::Window { days, count } => {
                let offset = (date - cutoff).num_days().max(0);
                let index = (offset / days).min(count - 1);
                let start = cutoff + Duration::days(index * days);
                (start.format("%b %d").to_string(), start)
            }
            Granularity::Weekday => (date.format("%A").to_string(), date),
        }
    }
}

/// First day included in the trends for `period`.
pub fn cutoff(period: Period, today: NaiveDate) -> NaiveDate {
    today - Duration::days(period.days() as i64)
}

/// Chronologically ordered `(bucket label, sentiment tally)` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrendBuckets {
    buckets: Vec<(String, LabelCounts)>,
}

impl TrendBuckets {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&LabelCounts> {
        self.buckets
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, counts)| counts)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelCounts)> {
        self.buckets.iter().map(|(l, c)| (l.as_str(), c))
    }

    /// Sum of every bucket's tally.
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(|(_, c)| c.total()).sum()
    }
}

impl Serialize for TrendBuckets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (label, counts) in &self.buckets {
            map.serialize_entry(label, counts)?;
        }
        map.end()
    }
}

/// Bucket `(posted_on, sentiment)` pairs for `period` as of `today`.
///
/// Entries without a date or dated before the cutoff are skipped.
pub fn bucket_trends<'a, I>(
    entries: I,
    period: Period,
    today: NaiveDate,
    sentiments: &LabelSet,
) -> TrendBuckets
where
    I: IntoIterator<Item = (Option<NaiveDate>, &'a str)>,
{
    let cutoff = cutoff(period, today);
    let granularity = Granularity::for_period(period);

    let mut by_label: HashMap<String, (NaiveDate, LabelCounts)> = HashMap::new();
    for (date, sentiment) in entries {
        let Some(date) = date else { continue };
        if date < cutoff {
            continue;
        }
        let (label, key) = granularity.bucket(date, cutoff);
        let (_, counts) = by_label
            .entry(label)
            .or_insert_with(|| (key, LabelCounts::zeroed(sentiments)));
        counts.increment(sentiment);
    }

    let mut ordered: Vec<(NaiveDate, String, LabelCounts)> = by_label
        .into_iter()
        .map(|(label, (key, counts))| (key, label, counts))
        .collect();
    ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    TrendBuckets {
        buckets: ordered
            .into_iter()
            .map(|(_, label, counts)| (label, counts))
            .collect(),
    }
}
