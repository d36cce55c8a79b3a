//! Slip and revision storage backends.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use crate::types::{RevisionRecord, SlipFilter, SlipId, SlipRecord};

/// Trait for report storage backends.
///
/// Implementations must guarantee deterministic ordering of results.
/// All methods are async to support async database access.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch a slip with its lines.
    async fn get_slip(&self, id: SlipId) -> Result<Option<SlipRecord>, Self::Error>;

    /// Fetch every slip matching the filter, with lines (ordered by SlipId).
    async fn find_slips(&self, filter: &SlipFilter) -> Result<Vec<SlipRecord>, Self::Error>;

    /// Fetch one slip's revisions (ordered by version).
    async fn get_revisions(&self, slip_id: SlipId) -> Result<Vec<RevisionRecord>, Self::Error>;

    /// Fetch the revisions of several slips (ordered by SlipId, then version).
    async fn get_revisions_for(
        &self,
        slip_ids: &[SlipId],
    ) -> Result<Vec<RevisionRecord>, Self::Error>;

    /// Fetch revisions of one slip or of all slips, newest first.
    async fn list_revisions(
        &self,
        slip_id: Option<SlipId>,
    ) -> Result<Vec<RevisionRecord>, Self::Error>;

    /// Store a new snapshot for a slip as version `max(existing) + 1`.
    async fn append_revision(
        &self,
        slip_id: SlipId,
        snapshot: String,
    ) -> Result<RevisionRecord, Self::Error>;

    /// Check if the backend is reachable.
    async fn is_healthy(&self) -> bool {
        true
    }
}

pub use memory::{InMemoryError, InMemoryReportStore};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresError, PostgresReportStore};
