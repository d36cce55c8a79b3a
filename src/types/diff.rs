//! Structural diff between two snapshots of the same slip.
//!
//! Lines are first reduced to per-key aggregates (count and quantity sum),
//! then the aggregates are compared. The diff is therefore insensitive to
//! line order and to identical lines being split or merged between saves.
//! A line moved from one box to another shows up as one removal plus one
//! addition.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::snapshot::{LineKey, Snapshot, SnapshotLine};

/// Quantities closer than this are considered equal.
pub const QTY_TOLERANCE: f64 = 1e-6;

/// Aggregate of all lines sharing one [`LineKey`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineAggregate {
    /// Number of lines with this key.
    pub count: u32,
    /// Sum of their quantities.
    pub qty: f64,
}

/// Reduce a line list to per-key aggregates.
pub fn aggregate_lines(lines: &[SnapshotLine]) -> BTreeMap<LineKey, LineAggregate> {
    let mut map: BTreeMap<LineKey, LineAggregate> = BTreeMap::new();
    for line in lines {
        let entry = map.entry(line.key()).or_default();
        entry.count += 1;
        entry.qty += line.qty;
    }
    map
}

/// Summary of what changed between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    /// Lines present in the newer snapshot but not the older one.
    pub lines_added: u32,
    /// Lines present in the older snapshot but not the newer one.
    pub lines_removed: u32,
    /// Number of keys whose aggregate quantity changed.
    pub qty_changed: u32,
    /// Customer name changed (case-insensitive).
    pub customer_changed: bool,
    /// Tracking number changed (case-insensitive).
    pub tracking_changed: bool,
    /// Header box number changed (case-insensitive).
    pub box_changed: bool,
}

impl DiffSummary {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Compute the diff from `previous` to `current`.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> DiffSummary {
    let prev_map = aggregate_lines(&previous.lines);
    let next_map = aggregate_lines(&current.lines);

    let all_keys: BTreeSet<&LineKey> = prev_map.keys().chain(next_map.keys()).collect();

    let mut summary = DiffSummary::default();

    for key in all_keys {
        let prev = prev_map.get(key);
        let next = next_map.get(key);

        let prev_count = prev.map_or(0, |a| a.count);
        let next_count = next.map_or(0, |a| a.count);

        if next_count > prev_count {
            summary.lines_added += next_count - prev_count;
        }
        if prev_count > next_count {
            summary.lines_removed += prev_count - next_count;
        }

        if let (Some(prev), Some(next)) = (prev, next) {
            if (prev.qty - next.qty).abs() > QTY_TOLERANCE {
                summary.qty_changed += 1;
            }
        }
    }

    summary.customer_changed = differs_ignoring_case(&previous.customer_name, &current.customer_name);
    summary.tracking_changed =
        differs_ignoring_case(&previous.tracking_number, &current.tracking_number);
    summary.box_changed = differs_ignoring_case(&previous.box_number, &current.box_number);

    summary
}

fn differs_ignoring_case(a: &str, b: &str) -> bool {
    a.to_lowercase() != b.to_lowercase()
}

/// Running totals over a sequence of diffs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffTotals {
    /// Sum of `lines_added`.
    pub lines_added: u32,
    /// Sum of `lines_removed`.
    pub lines_removed: u32,
    /// Sum of `qty_changed`.
    pub qty_changed: u32,
    /// Number of diffs where the customer changed.
    pub customer_changed: u32,
    /// Number of diffs where the tracking number changed.
    pub tracking_changed: u32,
    /// Number of diffs where the box number changed.
    pub box_changed: u32,
}

impl DiffTotals {
    /// Fold one diff into the totals.
    pub fn accumulate(&mut self, diff: &DiffSummary) {
        self.lines_added += diff.lines_added;
        self.lines_removed += diff.lines_removed;
        self.qty_changed += diff.qty_changed;
        self.customer_changed += u32::from(diff.customer_changed);
        self.tracking_changed += u32::from(diff.tracking_changed);
        self.box_changed += u32::from(diff.box_changed);
    }
}
