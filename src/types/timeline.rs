//! Revision timeline for one slip.
//!
//! Walks the slip's revisions in version order and diffs each parseable
//! snapshot against the last parseable one before it. An unparseable
//! snapshot is recorded as invalid and breaks the chain: the next valid
//! snapshot becomes a fresh baseline instead of being compared with an
//! older one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::diff::{diff, DiffSummary, DiffTotals};
use super::record::RevisionRecord;
use super::snapshot::Snapshot;

/// One revision's row in a timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    /// Revision id.
    pub revision_id: i64,
    /// Version number.
    pub version: u32,
    /// When the revision was written.
    pub created_at: DateTime<Utc>,
    /// The stored snapshot could not be parsed.
    pub invalid_snapshot: bool,
    /// Number of lines in the snapshot (0 when invalid).
    pub line_count: usize,
    /// Customer name in the snapshot (empty when invalid).
    pub customer_name: String,
    /// Diff against the previous valid snapshot, absent for baselines.
    pub diff_summary: Option<DiffSummary>,
}

/// Result of walking a slip's revisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    /// Entries in ascending version order.
    pub entries: Vec<TimelineEntry>,
    /// Totals over every computed diff.
    pub totals: DiffTotals,
    /// Number of revisions whose snapshot could not be parsed.
    pub invalid_count: u32,
}

/// Build the timeline for one slip's revisions.
///
/// Revisions are walked in ascending version order regardless of input
/// order; equal versions keep their input order.
pub fn build_timeline(revisions: &[RevisionRecord]) -> Timeline {
    let mut ordered: Vec<&RevisionRecord> = revisions.iter().collect();
    ordered.sort_by_key(|r| r.version);

    let mut timeline = Timeline::default();
    let mut last_valid: Option<Snapshot> = None;

    for revision in ordered {
        let snapshot = match Snapshot::parse(&revision.snapshot) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    revision_id = revision.id,
                    slip_id = %revision.slip_id,
                    version = revision.version,
                    error = %e,
                    "Skipping unparseable revision snapshot"
                );
                timeline.invalid_count += 1;
                last_valid = None;
                timeline.entries.push(TimelineEntry {
                    revision_id: revision.id,
                    version: revision.version,
                    created_at: revision.created_at,
                    invalid_snapshot: true,
                    line_count: 0,
                    customer_name: String::new(),
                    diff_summary: None,
                });
                continue;
            }
        };

        let diff_summary = match &last_valid {
            Some(previous) if revision.version > 1 => Some(diff(previous, &snapshot)),
            _ => None,
        };

        if let Some(d) = &diff_summary {
            timeline.totals.accumulate(d);
        }

        timeline.entries.push(TimelineEntry {
            revision_id: revision.id,
            version: revision.version,
            created_at: revision.created_at,
            invalid_snapshot: false,
            line_count: snapshot.line_count(),
            customer_name: snapshot.customer_name.clone(),
            diff_summary,
        });

        last_valid = Some(snapshot);
    }

    timeline
}
