//! Report filters parsed from query parameters.
//!
//! Every report shares the same filter vocabulary. Parsing never fails:
//! missing or malformed values fall back to defaults.
//!
//! | Parameter  | Accepted                         | Default              |
//! |------------|----------------------------------|----------------------|
//! | `from`     | `YYYY-MM-DD`                     | `to` minus 29 days   |
//! | `to`       | `YYYY-MM-DD` (inclusive)         | today (UTC)          |
//! | `vendorId` | positive integer                 | none                 |
//! | `customer` | substring, case-insensitive      | none                 |
//! | `bucket`   | `daily`, `weekly`, `monthly`     | `weekly`             |
//! | `metric`   | `slips`, `qty`, `revisions`      | `slips`              |
//! | `limit`    | positive integer, capped at 100  | 10                   |
//! | `slipId`   | positive integer                 | none                 |

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::record::{SlipId, SlipRecord};
use crate::report::bucket::Bucket;
use crate::report::timeseries::TimeseriesMetric;

/// Default number of rows in ranked reports.
pub const DEFAULT_LIMIT: usize = 10;

/// Upper bound on rows in ranked reports.
pub const MAX_LIMIT: usize = 100;

/// Days before `to` that the default window starts.
pub const DEFAULT_WINDOW_DAYS: i64 = 29;

/// Normalized report filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilters {
    /// First day of the window.
    pub from: NaiveDate,
    /// Last day of the window (inclusive).
    pub to: NaiveDate,
    /// Restrict to one vendor.
    pub vendor_id: Option<i64>,
    /// Case-insensitive customer name substring; empty matches all.
    pub customer: String,
    /// Time bucket for series.
    pub bucket: Bucket,
    /// Metric for series.
    pub metric: TimeseriesMetric,
    /// Row limit for ranked reports.
    pub limit: usize,
    /// Slip selected for revision insights.
    pub slip_id: Option<SlipId>,
}

impl ReportFilters {
    /// Filters for a date window with every other field at its default.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        Self {
            from,
            to,
            vendor_id: None,
            customer: String::new(),
            bucket: Bucket::default(),
            metric: TimeseriesMetric::default(),
            limit: DEFAULT_LIMIT,
            slip_id: None,
        }
    }

    /// Parse filters from query parameters.
    ///
    /// `today` anchors the default window.
    pub fn from_params(params: &BTreeMap<String, String>, today: NaiveDate) -> Self {
        let get = |name: &str| params.get(name).map(String::as_str);

        let to_default = today;
        let from_default = to_default - Duration::days(DEFAULT_WINDOW_DAYS);

        let from = parse_date_only(get("from")).unwrap_or(from_default);
        let to = parse_date_only(get("to")).unwrap_or(to_default);

        let mut filters = Self::new(from, to);
        filters.vendor_id = parse_positive_int(get("vendorId"));
        filters.customer = get("customer").unwrap_or_default().trim().to_string();
        filters.bucket = get("bucket").and_then(Bucket::from_str).unwrap_or_default();
        filters.metric = get("metric")
            .and_then(TimeseriesMetric::from_str)
            .unwrap_or_default();
        filters.limit = normalize_limit(get("limit"));
        filters.slip_id = parse_positive_int(get("slipId")).map(SlipId::new);
        filters
    }

    /// Start of the window (inclusive), midnight UTC.
    pub fn from_instant(&self) -> DateTime<Utc> {
        start_of_day(self.from)
    }

    /// End of the window (exclusive): midnight UTC after `to`.
    pub fn to_exclusive(&self) -> DateTime<Utc> {
        start_of_day(self.to.succ_opt().unwrap_or(self.to))
    }

    /// The slip-level part of the filters, for store queries.
    pub fn slip_filter(&self) -> SlipFilter {
        SlipFilter {
            from: self.from_instant(),
            to_exclusive: self.to_exclusive(),
            vendor_id: self.vendor_id,
            customer: self.customer.clone(),
        }
    }
}

/// Which slips a report covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlipFilter {
    /// Slip date lower bound (inclusive).
    pub from: DateTime<Utc>,
    /// Slip date upper bound (exclusive).
    pub to_exclusive: DateTime<Utc>,
    /// Restrict to one vendor.
    pub vendor_id: Option<i64>,
    /// Case-insensitive customer name substring; empty matches all.
    pub customer: String,
}

impl SlipFilter {
    /// Check whether a slip falls inside the filter.
    pub fn matches(&self, slip: &SlipRecord) -> bool {
        if slip.slip_date < self.from || slip.slip_date >= self.to_exclusive {
            return false;
        }
        if let Some(vendor_id) = self.vendor_id {
            if slip.vendor_id != Some(vendor_id) {
                return false;
            }
        }
        self.customer.is_empty()
            || slip
                .customer_name
                .to_lowercase()
                .contains(&self.customer.to_lowercase())
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn date_only_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"))
}

/// Parse a strict `YYYY-MM-DD` date.
fn parse_date_only(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?;
    if !date_only_pattern().is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Parse a positive integer; accepts integral decimal forms like `"3.0"`.
pub(crate) fn parse_positive_int(value: Option<&str>) -> Option<i64> {
    let parsed: f64 = value?.trim().parse().ok()?;
    (parsed.is_finite() && parsed.fract() == 0.0 && parsed > 0.0 && parsed <= i64::MAX as f64)
        .then_some(parsed as i64)
}

fn normalize_limit(value: Option<&str>) -> usize {
    match parse_positive_int(value) {
        Some(limit) => usize::try_from(limit).map_or(MAX_LIMIT, |l| l.min(MAX_LIMIT)),
        None => DEFAULT_LIMIT,
    }
}
