//! Calendar-bucketed aggregation of timestamped values.
//!
//! Buckets are calendar intervals in UTC, not rolling windows:
//!
//! | Bucket    | Key          | Example      |
//! |-----------|--------------|--------------|
//! | `Daily`   | `YYYY-MM-DD` | `2024-01-01` |
//! | `Weekly`  | `YYYY-W##`   | `2024-W01`   |
//! | `Monthly` | `YYYY-MM`    | `2024-01`    |
//!
//! Weekly keys use ISO 8601 week numbering, so the year part is the ISO
//! week-year (2024-12-30 is `2025-W01`). Empty buckets are never emitted.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Calendar bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// One bucket per UTC day.
    Daily,
    /// One bucket per ISO week.
    Weekly,
    /// One bucket per calendar month.
    Monthly,
}

impl Bucket {
    /// Parse bucket from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    /// Bucket key for a timestamp.
    pub fn key(&self, timestamp: &DateTime<Utc>) -> String {
        match self {
            Self::Daily => timestamp.format("%Y-%m-%d").to_string(),
            Self::Monthly => timestamp.format("%Y-%m").to_string(),
            Self::Weekly => {
                let week = timestamp.iso_week();
                format!("{:04}-W{:02}", week.year(), week.week())
            }
        }
    }
}

impl Default for Bucket {
    fn default() -> Self {
        Self::Weekly
    }
}

/// How a bucket's records reduce to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Number of records.
    Count,
    /// Sum of record values.
    Sum,
}

/// A timestamped value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedValue {
    /// When the value occurred.
    pub timestamp: DateTime<Utc>,
    /// The value (ignored by [`Reducer::Count`]).
    pub value: f64,
}

impl TimedValue {
    /// Create a timed value.
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One point of a bucketed series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketPoint {
    /// Bucket key.
    pub bucket: String,
    /// Reduced value.
    pub value: f64,
}

/// Group records into buckets and reduce each bucket.
///
/// Points are returned in ascending key order.
pub fn aggregate<I>(records: I, bucket: Bucket, reducer: Reducer) -> Vec<BucketPoint>
where
    I: IntoIterator<Item = TimedValue>,
{
    let mut groups: BTreeMap<String, f64> = BTreeMap::new();

    for record in records {
        let slot = groups.entry(bucket.key(&record.timestamp)).or_insert(0.0);
        match reducer {
            Reducer::Count => *slot += 1.0,
            Reducer::Sum => *slot += record.value,
        }
    }

    groups
        .into_iter()
        .map(|(bucket, value)| BucketPoint { bucket, value })
        .collect()
}
