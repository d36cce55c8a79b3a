//! Core types for slip reporting.

pub mod record;
pub mod snapshot;
pub mod diff;
pub mod timeline;
pub mod filters;

pub use record::{SlipId, SlipLineRecord, SlipRecord, RevisionRecord};
pub use snapshot::{ItemRef, LineKey, Snapshot, SnapshotError, SnapshotLine};
pub use diff::{aggregate_lines, diff, DiffSummary, DiffTotals, LineAggregate, QTY_TOLERANCE};
pub use timeline::{build_timeline, Timeline, TimelineEntry};
pub use filters::{ReportFilters, SlipFilter, DEFAULT_LIMIT, DEFAULT_WINDOW_DAYS, MAX_LIMIT};
