//! Revision insights: which slips get edited most and what changed.

use serde::Serialize;

use super::ranking::{display_slip_no, tally_revisions};
use crate::types::{
    build_timeline, DiffTotals, ReportFilters, RevisionRecord, SlipId, SlipRecord, TimelineEntry,
};

/// A slip ranked by how often it was revised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MostEditedSlip {
    /// Slip id.
    pub slip_id: SlipId,
    /// Slip number, `#id` when blank.
    pub slip_no: String,
    /// Customer name.
    pub customer_name: String,
    /// Stored revisions.
    pub revision_count: u32,
}

/// Slips with the most revisions, ties in first-seen order.
pub fn most_edited(
    slips: &[SlipRecord],
    revisions: &[RevisionRecord],
    limit: usize,
) -> Vec<MostEditedSlip> {
    tally_revisions(slips, revisions, |_| 0.0, limit)
        .into_iter()
        .map(|r| MostEditedSlip {
            slip_id: r.key,
            slip_no: display_slip_no(slips, r.key),
            customer_name: slips
                .iter()
                .find(|s| s.id == r.key)
                .map(|s| s.customer_name.clone())
                .unwrap_or_default(),
            revision_count: r.metrics.count,
        })
        .collect()
}

/// Timeline detail for one slip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedSlip {
    /// Slip id.
    pub slip_id: SlipId,
    /// Slip number, `#id` when blank.
    pub slip_no: String,
    /// Customer name.
    pub customer_name: String,
    /// Revisions walked.
    pub total_revisions: u32,
    /// Revisions whose snapshot could not be parsed.
    pub invalid_snapshots: u32,
    /// Totals over every diff in the timeline.
    pub summary: DiffTotals,
    /// Entries in ascending version order.
    pub timeline: Vec<TimelineEntry>,
}

impl SelectedSlip {
    /// Build the detail for `slip` from its revisions.
    pub fn build(slip: &SlipRecord, revisions: &[RevisionRecord]) -> Self {
        let timeline = build_timeline(revisions);
        Self {
            slip_id: slip.id,
            slip_no: if slip.slip_no.is_empty() {
                format!("#{}", slip.id)
            } else {
                slip.slip_no.clone()
            },
            customer_name: slip.customer_name.clone(),
            total_revisions: u32::try_from(timeline.entries.len()).unwrap_or(u32::MAX),
            invalid_snapshots: timeline.invalid_count,
            summary: timeline.totals,
            timeline: timeline.entries,
        }
    }
}

/// Revision insights report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInsights {
    /// Filters the report was computed with.
    pub filters: ReportFilters,
    /// Most revised slips.
    pub most_edited: Vec<MostEditedSlip>,
    /// Detail for the requested slip, or the most revised one.
    pub selected_slip: Option<SelectedSlip>,
}

/// The slip to detail: the requested one if it is in `slips`, otherwise
/// the most edited when nothing was requested.
pub fn select_slip<'a>(
    slips: &'a [SlipRecord],
    requested: Option<SlipId>,
    most_edited: &[MostEditedSlip],
) -> Option<&'a SlipRecord> {
    let id = match requested {
        Some(id) => id,
        None => most_edited.first()?.slip_id,
    };
    slips.iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const V1: &str = r#"{"customerName":"Acme","lines":[{"itemId":1,"qty":1}]}"#;
    const V2: &str = r#"{"customerName":"Acme","lines":[{"itemId":1,"qty":2},{"itemId":2,"qty":1}]}"#;

    fn fixture() -> (Vec<SlipRecord>, Vec<RevisionRecord>) {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let slips = vec![
            SlipRecord::new(SlipId::new(1), "PS-1", at, "Acme"),
            SlipRecord::new(SlipId::new(2), "", at, "Globex"),
        ];
        let revisions = vec![
            RevisionRecord::new(1, SlipId::new(1), 1, at, V1),
            RevisionRecord::new(2, SlipId::new(2), 1, at, V1),
            RevisionRecord::new(3, SlipId::new(2), 2, at, V2),
            RevisionRecord::new(4, SlipId::new(2), 3, at, "not json"),
        ];
        (slips, revisions)
    }

    #[test]
    fn test_most_edited_order() {
        let (slips, revisions) = fixture();
        let ranked = most_edited(&slips, &revisions, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].slip_id, SlipId::new(2));
        assert_eq!(ranked[0].slip_no, "#2");
        assert_eq!(ranked[0].customer_name, "Globex");
        assert_eq!(ranked[0].revision_count, 3);
    }

    #[test]
    fn test_selected_slip_detail() {
        let (slips, revisions) = fixture();
        let own: Vec<_> = revisions
            .iter()
            .filter(|r| r.slip_id == SlipId::new(2))
            .cloned()
            .collect();

        let selected = SelectedSlip::build(&slips[1], &own);
        assert_eq!(selected.total_revisions, 3);
        assert_eq!(selected.invalid_snapshots, 1);
        assert_eq!(selected.summary.lines_added, 1);
        assert_eq!(selected.summary.qty_changed, 1);
        assert_eq!(selected.timeline.len(), 3);
    }

    #[test]
    fn test_select_slip() {
        let (slips, revisions) = fixture();
        let ranked = most_edited(&slips, &revisions, 10);

        assert_eq!(select_slip(&slips, None, &ranked).map(|s| s.id), Some(SlipId::new(2)));
        assert_eq!(
            select_slip(&slips, Some(SlipId::new(1)), &ranked).map(|s| s.id),
            Some(SlipId::new(1))
        );
        assert!(select_slip(&slips, Some(SlipId::new(99)), &ranked).is_none());
        assert!(select_slip(&slips, None, &[]).is_none());
    }
}
