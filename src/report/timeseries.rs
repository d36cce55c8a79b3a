//! Time series over the report window.

use serde::{Deserialize, Serialize};

use super::bucket::{aggregate, Bucket, BucketPoint, Reducer, TimedValue};
use crate::types::{ReportFilters, RevisionRecord, SlipRecord};

/// What a time series measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeseriesMetric {
    /// Slips per bucket, by slip date.
    Slips,
    /// Shipped quantity per bucket, by slip date.
    Qty,
    /// Revisions per bucket, by revision time.
    Revisions,
}

impl TimeseriesMetric {
    /// Parse metric from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "slips" => Some(Self::Slips),
            "qty" => Some(Self::Qty),
            "revisions" => Some(Self::Revisions),
            _ => None,
        }
    }
}

impl Default for TimeseriesMetric {
    fn default() -> Self {
        Self::Slips
    }
}

/// Build the series for a metric.
///
/// `revisions` is only read for [`TimeseriesMetric::Revisions`] and should
/// already be limited to the slips and window of the report.
pub fn build_series(
    slips: &[SlipRecord],
    revisions: &[RevisionRecord],
    bucket: Bucket,
    metric: TimeseriesMetric,
) -> Vec<BucketPoint> {
    match metric {
        TimeseriesMetric::Slips => aggregate(
            slips.iter().map(|s| TimedValue::new(s.slip_date, 1.0)),
            bucket,
            Reducer::Count,
        ),
        TimeseriesMetric::Qty => aggregate(
            slips.iter().flat_map(|s| {
                s.lines
                    .iter()
                    .map(move |line| TimedValue::new(s.slip_date, line.qty))
            }),
            bucket,
            Reducer::Sum,
        ),
        TimeseriesMetric::Revisions => aggregate(
            revisions.iter().map(|r| TimedValue::new(r.created_at, 1.0)),
            bucket,
            Reducer::Count,
        ),
    }
}

/// Time series report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesReport {
    /// Filters the report was computed with.
    pub filters: ReportFilters,
    /// Points in ascending bucket order.
    pub points: Vec<BucketPoint>,
}
