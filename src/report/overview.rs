//! Headline KPIs and item totals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::round_to;
use crate::types::{ReportFilters, RevisionRecord, SlipRecord};

/// Overview KPIs for the report window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewKpis {
    /// Slips in the window.
    pub total_slips: u32,
    /// Lines across those slips.
    pub total_lines: u32,
    /// Lines per slip (2 dp).
    pub avg_lines_per_slip: f64,
    /// Distinct customer names.
    pub unique_customers: u32,
    /// Distinct assigned vendors.
    pub unique_vendors: u32,
    /// Share of slips with a tracking number, in percent (1 dp).
    pub tracking_percent: f64,
    /// Revisions stored for those slips.
    pub total_revisions: u32,
    /// Revisions per slip (2 dp).
    pub avg_revisions_per_slip: f64,
}

impl OverviewKpis {
    /// Compute KPIs for `slips`. `revisions` belong to those slips.
    pub fn compute(slips: &[SlipRecord], revisions: &[RevisionRecord]) -> Self {
        let total_slips = count(slips.len());
        let total_lines = count(slips.iter().map(|s| s.lines.len()).sum());
        let unique_customers: BTreeSet<&str> =
            slips.iter().map(|s| s.customer_name.as_str()).collect();
        let unique_vendors: BTreeSet<i64> = slips.iter().filter_map(|s| s.vendor_id).collect();
        let tracked = slips.iter().filter(|s| s.has_tracking()).count();
        let total_revisions = count(revisions.len());

        Self {
            total_slips,
            total_lines,
            avg_lines_per_slip: ratio(f64::from(total_lines), total_slips, 2),
            unique_customers: count(unique_customers.len()),
            unique_vendors: count(unique_vendors.len()),
            tracking_percent: ratio(tracked as f64 * 100.0, total_slips, 1),
            total_revisions,
            avg_revisions_per_slip: ratio(f64::from(total_revisions), total_slips, 2),
        }
    }
}

/// Overview report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewReport {
    /// Filters the report was computed with.
    pub filters: ReportFilters,
    /// KPIs.
    pub kpis: OverviewKpis,
}

/// Shipped item totals for the report window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    /// Shipped quantity (2 dp).
    pub total_qty: f64,
    /// Shipped lines.
    pub line_count: u32,
    /// Slips with at least one line.
    pub slip_count: u32,
    /// Distinct catalog items.
    pub distinct_items: u32,
    /// Quantity per slip (2 dp).
    pub avg_qty_per_slip: f64,
    /// Quantity per line (2 dp).
    pub avg_qty_per_line: f64,
}

impl ItemSummary {
    /// Summarize the lines of `slips`.
    pub fn compute(slips: &[SlipRecord]) -> Self {
        let total_qty: f64 = slips.iter().map(SlipRecord::total_qty).sum();
        let line_count = count(slips.iter().map(|s| s.lines.len()).sum());
        let slip_count = count(slips.iter().filter(|s| !s.lines.is_empty()).count());
        let distinct_items: BTreeSet<i64> = slips
            .iter()
            .flat_map(|s| s.lines.iter().filter_map(|l| l.item_id))
            .collect();

        Self {
            total_qty: round_to(total_qty, 2),
            line_count,
            slip_count,
            distinct_items: count(distinct_items.len()),
            avg_qty_per_slip: ratio(total_qty, slip_count, 2),
            avg_qty_per_line: ratio(total_qty, line_count, 2),
        }
    }
}

/// Item summary report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummaryReport {
    /// Filters the report was computed with.
    pub filters: ReportFilters,
    /// Totals.
    pub summary: ItemSummary,
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn ratio(numerator: f64, denominator: u32, places: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round_to(numerator / f64::from(denominator), places)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SlipId, SlipLineRecord};
    use chrono::{TimeZone, Utc};

    fn fixture() -> Vec<SlipRecord> {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        vec![
            SlipRecord::new(SlipId::new(1), "PS-1", at, "Acme")
                .with_vendor(1, "Bolts Inc")
                .with_tracking("1Z1")
                .with_line(SlipLineRecord::new(1, Some(10), 4.0))
                .with_line(SlipLineRecord::new(2, Some(11), 1.0)),
            SlipRecord::new(SlipId::new(2), "PS-2", at, "Acme")
                .with_line(SlipLineRecord::new(3, Some(10), 2.0)),
            SlipRecord::new(SlipId::new(3), "PS-3", at, "Globex").with_vendor(1, "Bolts Inc"),
        ]
    }

    #[test]
    fn test_overview_kpis() {
        let slips = fixture();
        let revisions: Vec<RevisionRecord> = (1..=4)
            .map(|v| RevisionRecord::new(v, SlipId::new(1), v as u32, slips[0].slip_date, "{}"))
            .collect();

        let kpis = OverviewKpis::compute(&slips, &revisions);
        assert_eq!(kpis.total_slips, 3);
        assert_eq!(kpis.total_lines, 3);
        assert_eq!(kpis.avg_lines_per_slip, 1.0);
        assert_eq!(kpis.unique_customers, 2);
        assert_eq!(kpis.unique_vendors, 1);
        assert_eq!(kpis.tracking_percent, 33.3);
        assert_eq!(kpis.total_revisions, 4);
        assert_eq!(kpis.avg_revisions_per_slip, 1.33);
    }

    #[test]
    fn test_overview_empty_window() {
        assert_eq!(OverviewKpis::compute(&[], &[]), OverviewKpis::default());
    }

    #[test]
    fn test_item_summary() {
        let summary = ItemSummary::compute(&fixture());
        assert_eq!(summary.total_qty, 7.0);
        assert_eq!(summary.line_count, 3);
        assert_eq!(summary.slip_count, 2);
        assert_eq!(summary.distinct_items, 2);
        assert_eq!(summary.avg_qty_per_slip, 3.5);
        assert_eq!(summary.avg_qty_per_line, 2.33);
    }
}
