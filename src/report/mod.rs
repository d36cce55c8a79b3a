//! Report computations over slips and revisions.
//!
//! Everything here is synchronous and pure: callers load the slips and
//! revisions for a [`ReportFilters`](crate::types::ReportFilters) window
//! and pass them in. [`ReportEngine`](crate::engine::ReportEngine) does
//! that loading against a store.

pub mod bucket;
pub mod insights;
pub mod overview;
pub mod ranking;
pub mod timeseries;

pub use bucket::{aggregate, Bucket, BucketPoint, Reducer, TimedValue};
pub use insights::{most_edited, select_slip, MostEditedSlip, RevisionInsights, SelectedSlip};
pub use overview::{ItemSummary, ItemSummaryReport, OverviewKpis, OverviewReport};
pub use ranking::{
    revision_leaders, top_customers, top_items, top_n, top_vendors, CustomerRank, ItemRank,
    ItemRankMode, Ranked, RevisionLeader, VendorRank,
};
pub use timeseries::{build_series, TimeseriesMetric, TimeseriesReport};

use serde::Serialize;

use crate::types::ReportFilters;

/// A ranked report: normalized filters plus rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedReport<T> {
    /// Filters the report was computed with.
    pub filters: ReportFilters,
    /// Rows, best first.
    pub rows: Vec<T>,
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
