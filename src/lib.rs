//! # slip-insights
//!
//! Reporting kernel for packing slips.
//!
//! The crate answers two kinds of questions about a slip business:
//!
//! > What was shipped, to whom, and when?
//!
//! > Which slips keep getting edited, and what changes between saves?
//!
//! ## Architecture
//!
//! ```text
//! Query params → ReportFilters → ReportEngine → report::* → JSON
//!                                     ↓
//!                    ReportStore (Postgres or Memory)
//! ```
//!
//! Revisions are stored as opaque JSON snapshots written on every save.
//! They are parsed on read; a snapshot that cannot be parsed is flagged and
//! skipped, never fatal.
//!
//! ## Determinism Guarantees
//!
//! - Diffs ignore line order; lines sharing an item and box are merged
//! - Timelines walk revisions in version order regardless of input order
//! - Rankings break full ties by first appearance
//! - Bucket keys are computed in UTC

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod report;
pub mod cache;
pub mod store;
pub mod engine;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    SlipId, SlipLineRecord, SlipRecord, RevisionRecord,
    ItemRef, LineKey, Snapshot, SnapshotError, SnapshotLine,
    aggregate_lines, diff, DiffSummary, DiffTotals, LineAggregate, QTY_TOLERANCE,
    build_timeline, Timeline, TimelineEntry,
    ReportFilters, SlipFilter, DEFAULT_LIMIT, MAX_LIMIT,
};
pub use report::{
    aggregate, Bucket, BucketPoint, Reducer, TimedValue,
    top_n, Ranked, RankedReport, ItemRankMode,
    TimeseriesMetric, OverviewKpis, ItemSummary, RevisionInsights,
};
pub use cache::{CacheConfig, CacheLookup, CacheStats, ReportCache};
pub use store::{ReportStore, InMemoryReportStore};
#[cfg(feature = "postgres")]
pub use store::PostgresReportStore;
pub use engine::{ReportEngine, ReportError};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for all report response types.
/// Increment on breaking changes to any response shape.
pub const SLIP_INSIGHTS_SCHEMA_VERSION: &str = "1.0.0";
