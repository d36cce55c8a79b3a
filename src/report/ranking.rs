//! Top-N rankings.
//!
//! [`top_n`] groups records by a key, folds each group into a metrics
//! value, sorts groups by a `(primary, secondary)` key in descending
//! order, and truncates. The sort is stable and groups are created in
//! first-encounter order, so groups tied on both keys keep the order in
//! which they were first seen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use super::round_to;
use crate::types::{RevisionRecord, SlipId, SlipLineRecord, SlipRecord};

/// A ranked group.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<K, A> {
    /// Group key.
    pub key: K,
    /// Folded metrics.
    pub metrics: A,
}

/// Group, fold, sort descending and truncate.
///
/// - `group_key` returns `None` to leave a record out entirely
/// - `accumulate` folds one record into its group's metrics
/// - `sort_key` returns `(primary, secondary)`; both sort descending
pub fn top_n<R, K, A, FK, FA, FS>(
    records: impl IntoIterator<Item = R>,
    group_key: FK,
    mut accumulate: FA,
    sort_key: FS,
    limit: usize,
) -> Vec<Ranked<K, A>>
where
    K: Ord + Clone,
    A: Default,
    FK: Fn(&R) -> Option<K>,
    FA: FnMut(&mut A, &R),
    FS: Fn(&A) -> (f64, f64),
{
    let mut index: BTreeMap<K, usize> = BTreeMap::new();
    let mut groups: Vec<Ranked<K, A>> = Vec::new();

    for record in records {
        let Some(key) = group_key(&record) else {
            continue;
        };
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Ranked {
                    key,
                    metrics: A::default(),
                });
                groups.len() - 1
            }
        };
        accumulate(&mut groups[slot].metrics, &record);
    }

    groups.sort_by(|a, b| {
        let (a_primary, a_secondary) = sort_key(&a.metrics);
        let (b_primary, b_secondary) = sort_key(&b.metrics);
        b_primary
            .partial_cmp(&a_primary)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b_secondary.partial_cmp(&a_secondary).unwrap_or(Ordering::Equal))
    });
    groups.truncate(limit);
    groups
}

/// Shipped-line metrics shared by customer, vendor and item rankings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineTotals {
    slip_ids: BTreeSet<SlipId>,
    /// Sum of line quantities.
    pub total_qty: f64,
    /// Number of lines.
    pub line_count: u32,
}

impl LineTotals {
    /// Fold one line of a slip.
    pub fn add(&mut self, slip: &SlipRecord, line: &SlipLineRecord) {
        self.slip_ids.insert(slip.id);
        self.total_qty += line.qty;
        self.line_count += 1;
    }

    /// Number of distinct slips seen.
    pub fn slip_count(&self) -> u32 {
        u32::try_from(self.slip_ids.len()).unwrap_or(u32::MAX)
    }
}

/// Every (slip, line) pair, in slip then line order.
fn shipped_lines(slips: &[SlipRecord]) -> impl Iterator<Item = (&SlipRecord, &SlipLineRecord)> {
    slips
        .iter()
        .flat_map(|slip| slip.lines.iter().map(move |line| (slip, line)))
}

/// Customer ranking row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRank {
    /// Customer name.
    pub customer_name: String,
    /// Distinct slips.
    pub slip_count: u32,
    /// Shipped quantity (2 dp).
    pub total_qty: f64,
    /// Shipped lines.
    pub line_count: u32,
}

/// Rank customers by slip count, then shipped quantity.
///
/// Slips without lines do not count.
pub fn top_customers(slips: &[SlipRecord], limit: usize) -> Vec<CustomerRank> {
    top_n(
        shipped_lines(slips),
        |(slip, _)| Some(slip.customer_name.clone()),
        |totals: &mut LineTotals, (slip, line)| totals.add(slip, line),
        |t| (f64::from(t.slip_count()), t.total_qty),
        limit,
    )
    .into_iter()
    .map(|r| CustomerRank {
        customer_name: if r.key.is_empty() {
            "Unnamed customer".to_string()
        } else {
            r.key
        },
        slip_count: r.metrics.slip_count(),
        total_qty: round_to(r.metrics.total_qty, 2),
        line_count: r.metrics.line_count,
    })
    .collect()
}

/// Vendor ranking row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRank {
    /// Vendor id, `None` for slips without a vendor.
    pub vendor_id: Option<i64>,
    /// Vendor name.
    pub vendor_name: String,
    /// Distinct slips.
    pub slip_count: u32,
    /// Shipped quantity (2 dp).
    pub total_qty: f64,
    /// Shipped lines.
    pub line_count: u32,
}

#[derive(Debug, Default)]
struct VendorTotals {
    name: Option<String>,
    lines: LineTotals,
}

/// Rank vendors by slip count, then shipped quantity.
///
/// Slips without a vendor are grouped together only when
/// `include_unassigned` is set.
pub fn top_vendors(slips: &[SlipRecord], include_unassigned: bool, limit: usize) -> Vec<VendorRank> {
    top_n(
        shipped_lines(slips),
        |(slip, _)| match slip.vendor_id {
            Some(id) => Some(Some(id)),
            None if include_unassigned => Some(None),
            None => None,
        },
        |totals: &mut VendorTotals, (slip, line)| {
            if totals.name.is_none() {
                totals.name = slip.vendor_name.clone();
            }
            totals.lines.add(slip, line);
        },
        |t| (f64::from(t.lines.slip_count()), t.lines.total_qty),
        limit,
    )
    .into_iter()
    .map(|r| VendorRank {
        vendor_id: r.key,
        vendor_name: r
            .metrics
            .name
            .unwrap_or_else(|| "Unknown vendor".to_string()),
        slip_count: r.metrics.lines.slip_count(),
        total_qty: round_to(r.metrics.lines.total_qty, 2),
        line_count: r.metrics.lines.line_count,
    })
    .collect()
}

/// Ordering for the item ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRankMode {
    /// Shipped quantity, then line count.
    Qty,
    /// Line count, then shipped quantity.
    Freq,
}

impl ItemRankMode {
    /// Parse the `mode` parameter; anything but `freq` is `Qty`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("freq") => Self::Freq,
            _ => Self::Qty,
        }
    }
}

impl Default for ItemRankMode {
    fn default() -> Self {
        Self::Qty
    }
}

/// Item ranking row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRank {
    /// Item id.
    pub item_id: i64,
    /// SKU.
    pub sku: String,
    /// Item name.
    pub name: String,
    /// Unit.
    pub unit: String,
    /// Shipped quantity (2 dp).
    pub total_qty: f64,
    /// Shipped lines.
    pub line_count: u32,
    /// Distinct slips.
    pub slip_count: u32,
}

#[derive(Debug, Default)]
struct ItemTotals {
    sku: String,
    name: String,
    unit: String,
    lines: LineTotals,
}

/// Rank catalog items. Lines without an item id are left out.
pub fn top_items(slips: &[SlipRecord], mode: ItemRankMode, limit: usize) -> Vec<ItemRank> {
    top_n(
        shipped_lines(slips),
        |(_, line)| line.item_id,
        |totals: &mut ItemTotals, (slip, line)| {
            if totals.lines.line_count == 0 {
                totals.sku = line.sku.clone();
                totals.name = line.item_name.clone();
                totals.unit = line.unit.clone();
            }
            totals.lines.add(slip, line);
        },
        |t| {
            let qty = t.lines.total_qty;
            let lines = f64::from(t.lines.line_count);
            match mode {
                ItemRankMode::Qty => (qty, lines),
                ItemRankMode::Freq => (lines, qty),
            }
        },
        limit,
    )
    .into_iter()
    .map(|r| ItemRank {
        item_id: r.key,
        sku: r.metrics.sku,
        name: if r.metrics.name.is_empty() {
            format!("Item #{}", r.key)
        } else {
            r.metrics.name
        },
        unit: r.metrics.unit,
        total_qty: round_to(r.metrics.lines.total_qty, 2),
        line_count: r.metrics.lines.line_count,
        slip_count: r.metrics.lines.slip_count(),
    })
    .collect()
}

/// Revision ranking row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionLeader {
    /// Slip id.
    pub slip_id: SlipId,
    /// Slip number.
    pub slip_no: String,
    /// Number of stored revisions.
    pub revision_count: u32,
    /// Newest revision time.
    pub last_revision_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub(crate) struct RevisionTally {
    pub(crate) count: u32,
    pub(crate) last_at: Option<DateTime<Utc>>,
}

impl RevisionTally {
    fn add(&mut self, revision: &RevisionRecord) {
        self.count += 1;
        if self.last_at.map_or(true, |last| revision.created_at > last) {
            self.last_at = Some(revision.created_at);
        }
    }
}

/// Count revisions per slip for the given slips, most revised first.
///
/// `secondary` supplies the tie-break for equal counts.
pub(crate) fn tally_revisions<FS>(
    slips: &[SlipRecord],
    revisions: &[RevisionRecord],
    secondary: FS,
    limit: usize,
) -> Vec<Ranked<SlipId, RevisionTally>>
where
    FS: Fn(&RevisionTally) -> f64,
{
    let known: BTreeSet<SlipId> = slips.iter().map(|s| s.id).collect();
    top_n(
        revisions.iter(),
        |r| known.contains(&r.slip_id).then_some(r.slip_id),
        |tally: &mut RevisionTally, r| tally.add(r),
        |t| (f64::from(t.count), secondary(t)),
        limit,
    )
}

/// Slip number for display, `#id` when blank.
pub(crate) fn display_slip_no(slips: &[SlipRecord], id: SlipId) -> String {
    slips
        .iter()
        .find(|s| s.id == id)
        .map(|s| s.slip_no.clone())
        .filter(|no| !no.is_empty())
        .unwrap_or_else(|| format!("#{}", id))
}

/// Rank slips by revision count, then by most recent revision.
pub fn revision_leaders(
    slips: &[SlipRecord],
    revisions: &[RevisionRecord],
    limit: usize,
) -> Vec<RevisionLeader> {
    tally_revisions(
        slips,
        revisions,
        |t| t.last_at.map_or(f64::MIN, |at| at.timestamp_millis() as f64),
        limit,
    )
    .into_iter()
    .map(|r| RevisionLeader {
        slip_no: display_slip_no(slips, r.key),
        slip_id: r.key,
        revision_count: r.metrics.count,
        last_revision_at: r.metrics.last_at,
    })
    .collect()
}
