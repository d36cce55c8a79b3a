//! Golden tests for snapshot diffing, revision timelines, bucketing and
//! ranking.
//!
//! These tests pin down the determinism and invariants that reports
//! depend on.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use slip_insights::report::top_customers;
use slip_insights::{
    aggregate, build_timeline, diff, Bucket, Reducer, RevisionRecord, SlipId, SlipLineRecord,
    SlipRecord, Snapshot, SnapshotLine, TimedValue,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn line(item: i64, box_name: &str, box_number: &str, qty: f64) -> SnapshotLine {
    SnapshotLine::new(Some(item), "", box_name, box_number, qty)
}

fn snapshot(customer: &str, lines: Vec<SnapshotLine>) -> Snapshot {
    Snapshot {
        customer_name: customer.to_string(),
        lines,
        ..Snapshot::default()
    }
}

fn revision(version: u32, blob: &str) -> RevisionRecord {
    RevisionRecord::new(
        i64::from(version),
        SlipId::new(1),
        version,
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, version).unwrap(),
        blob,
    )
}

fn arb_line() -> impl Strategy<Value = SnapshotLine> {
    (
        prop_oneof![Just(None), (1i64..5).prop_map(Some)],
        "[a-c]{0,2}",
        "[AB ]{0,2}",
        "[12]?",
        0u32..50,
    )
        .prop_map(|(item_id, name, box_name, box_number, qty)| {
            SnapshotLine::new(item_id, name, box_name, box_number, f64::from(qty))
        })
}

fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    (
        prop::sample::select(vec!["Acme", "ACME", "Globex"]),
        prop::sample::select(vec!["", "1Z1", "1z1"]),
        prop::collection::vec(arb_line(), 0..8),
    )
        .prop_map(|(customer, tracking, lines)| Snapshot {
            customer_name: customer.to_string(),
            tracking_number: tracking.to_string(),
            lines,
            ..Snapshot::default()
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Diff invariants
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn diff_ignores_line_order(a in arb_snapshot(), b in arb_snapshot(), seed in any::<u64>()) {
        let mut shuffled = a.clone();
        let n = shuffled.lines.len();
        if n > 1 {
            shuffled.lines.rotate_left((seed as usize) % n);
            shuffled.lines.reverse();
        }
        prop_assert_eq!(diff(&a, &b), diff(&shuffled, &b));
        prop_assert_eq!(diff(&b, &a), diff(&b, &shuffled));
    }

    #[test]
    fn added_and_removed_are_symmetric(a in arb_snapshot(), b in arb_snapshot()) {
        let forward = diff(&a, &b);
        let backward = diff(&b, &a);
        prop_assert_eq!(forward.lines_added, backward.lines_removed);
        prop_assert_eq!(forward.lines_removed, backward.lines_added);
        prop_assert_eq!(forward.qty_changed, backward.qty_changed);
    }

    #[test]
    fn diff_with_self_is_empty(a in arb_snapshot()) {
        prop_assert!(diff(&a, &a).is_empty());
    }
}

#[test]
fn test_split_line_with_same_key_matches_merged_line() {
    // Splitting one line in two changes the count for that key, so the
    // comparison is made between two snapshots that both carry the split.
    let merged = snapshot("Acme", vec![line(1, "A", "1", 10.0), line(1, "A", "1", 0.0)]);
    let split = snapshot("Acme", vec![line(1, "A", "1", 4.0), line(1, "A", "1", 6.0)]);
    let other = snapshot("Acme", vec![line(1, "A", "1", 7.0), line(2, "B", "1", 1.0)]);

    assert_eq!(diff(&merged, &other), diff(&split, &other));
    assert_eq!(diff(&other, &merged), diff(&other, &split));
    assert!(diff(&merged, &split).is_empty());
}

#[test]
fn test_quantity_change_scenario() {
    let prev = snapshot("Acme", vec![line(5, "A", "1", 10.0)]);
    let next = snapshot("Acme", vec![line(5, "A", "1", 12.0)]);

    let d = diff(&prev, &next);
    assert_eq!(d.lines_added, 0);
    assert_eq!(d.lines_removed, 0);
    assert_eq!(d.qty_changed, 1);
    assert!(!d.customer_changed);
    assert!(!d.tracking_changed);
    assert!(!d.box_changed);
}

#[test]
fn test_line_removed_scenario() {
    let prev = snapshot("Acme", vec![line(1, "A", "1", 1.0), line(2, "A", "1", 1.0)]);
    let next = snapshot("Acme", vec![line(1, "A", "1", 1.0)]);

    let d = diff(&prev, &next);
    assert_eq!(d.lines_removed, 1);
    assert_eq!(d.lines_added, 0);
}

#[test]
fn test_name_fallback_key_merges_same_named_items() {
    let prev = snapshot(
        "Acme",
        vec![
            SnapshotLine::new(None, "Bolt", "A", "1", 1.0),
            SnapshotLine::new(None, " bolt ", "A", "1", 1.0),
        ],
    );
    let next = snapshot("Acme", vec![SnapshotLine::new(None, "BOLT", "a", "1", 2.0)]);

    let d = diff(&prev, &next);
    assert_eq!(d.lines_removed, 1);
    assert_eq!(d.qty_changed, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Timeline invariants
// ─────────────────────────────────────────────────────────────────────────────

const V1: &str = r#"{"slipNo":"PS-1","customerName":"Acme","lines":[{"itemId":5,"boxName":"A","boxNumber":"1","qty":10}]}"#;
const V2: &str = r#"{"slipNo":"PS-1","customerName":"Acme","lines":[{"itemId":"5","boxName":"a ","boxNumber":"1","qty":"12"}]}"#;

#[test]
fn test_baseline_has_no_diff() {
    let timeline = build_timeline(&[revision(1, V1), revision(2, V2)]);
    assert!(timeline.entries[0].diff_summary.is_none());
    assert_eq!(timeline.entries[1].diff_summary.unwrap().qty_changed, 1);
}

#[test]
fn test_invalid_snapshot_breaks_chain() {
    let timeline = build_timeline(&[revision(1, V1), revision(2, "{\"lines\": ["), revision(3, V2)]);

    assert_eq!(timeline.invalid_count, 1);
    assert!(timeline.entries[1].invalid_snapshot);
    // v3 would differ from v1, but the chain restarts at v3
    assert!(timeline.entries[2].diff_summary.is_none());
    assert!(timeline.totals.qty_changed == 0);
}

#[test]
fn test_malformed_shapes_do_not_invalidate() {
    let blob = r#"{"customerName":42,"lines":[1,"x",{"qty":"abc","boxName":null}],"trackingNumber":["1Z"]}"#;
    let timeline = build_timeline(&[revision(1, blob)]);

    assert_eq!(timeline.invalid_count, 0);
    assert_eq!(timeline.entries[0].line_count, 1);
    assert_eq!(timeline.entries[0].customer_name, "");
}

#[test]
fn test_non_object_snapshots_are_invalid() {
    for blob in ["null", "[]", "\"text\"", "7", ""] {
        let timeline = build_timeline(&[revision(1, blob)]);
        assert_eq!(timeline.invalid_count, 1, "blob {:?} should be invalid", blob);
    }
}

#[test]
fn test_capture_round_trips_through_timeline() {
    let slip = SlipRecord::new(
        SlipId::new(1),
        "PS-000001",
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        "Acme",
    )
    .with_tracking("1Z999")
    .with_line(SlipLineRecord::new(1, Some(5), 3.0).with_box("A", "1"));

    let first = Snapshot::capture(&slip).to_json().unwrap();
    let mut edited = slip.clone();
    edited.tracking_number = "1Z000".to_string();
    let second = Snapshot::capture(&edited).to_json().unwrap();

    let timeline = build_timeline(&[revision(1, &first), revision(2, &second)]);
    let d = timeline.entries[1].diff_summary.unwrap();
    assert!(d.tracking_changed);
    assert_eq!(d.lines_added + d.lines_removed + d.qty_changed, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Bucketing and ranking
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_weekly_bucket_for_new_year_monday() {
    let points = aggregate(
        vec![TimedValue::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 1.0)],
        Bucket::Weekly,
        Reducer::Count,
    );
    assert_eq!(points[0].bucket, "2024-W01");
}

#[test]
fn test_customer_tie_break_on_quantity() {
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let slips = vec![
        SlipRecord::new(SlipId::new(1), "PS-1", at, "Small")
            .with_line(SlipLineRecord::new(1, Some(1), 2.0)),
        SlipRecord::new(SlipId::new(2), "PS-2", at, "Large")
            .with_line(SlipLineRecord::new(2, Some(1), 20.0)),
    ];

    let ranked = top_customers(&slips, 10);
    assert_eq!(ranked[0].customer_name, "Large");
    assert_eq!(ranked[1].customer_name, "Small");
}
