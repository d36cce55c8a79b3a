//! In-memory report store for testing.

use std::collections::{BTreeMap, BTreeSet};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::types::{RevisionRecord, SlipFilter, SlipId, SlipRecord};
use super::ReportStore;

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Slip not found.
    #[error("Slip not found: {0}")]
    SlipNotFound(SlipId),
}

/// In-memory report store for testing.
///
/// Uses BTreeMap for deterministic iteration order. Revisions sit behind
/// a lock so they can be appended through `&self`.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    /// Slips by ID.
    slips: BTreeMap<SlipId, SlipRecord>,
    /// Slip -> revisions, ordered by version.
    revisions: RwLock<BTreeMap<SlipId, Vec<RevisionRecord>>>,
}

impl InMemoryReportStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slip to the store, replacing one with the same id.
    pub fn add_slip(&mut self, slip: SlipRecord) {
        self.slips.insert(slip.id, slip);
    }

    /// Add a stored revision as is.
    pub fn add_revision(&mut self, revision: RevisionRecord) {
        let list = self.revisions.get_mut().entry(revision.slip_id).or_default();
        list.push(revision);
        list.sort_by_key(|r| r.version);
    }

    /// Get number of revisions.
    pub fn num_revisions(&self) -> usize {
        self.revisions.read().values().map(Vec::len).sum()
    }

    fn next_revision_id(revisions: &BTreeMap<SlipId, Vec<RevisionRecord>>) -> i64 {
        revisions
            .values()
            .flatten()
            .map(|r| r.id)
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    type Error = InMemoryError;

    async fn get_slip(&self, id: SlipId) -> Result<Option<SlipRecord>, Self::Error> {
        Ok(self.slips.get(&id).cloned())
    }

    async fn find_slips(&self, filter: &SlipFilter) -> Result<Vec<SlipRecord>, Self::Error> {
        Ok(self
            .slips
            .values()
            .filter(|slip| filter.matches(slip))
            .cloned()
            .collect())
    }

    async fn get_revisions(&self, slip_id: SlipId) -> Result<Vec<RevisionRecord>, Self::Error> {
        Ok(self
            .revisions
            .read()
            .get(&slip_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_revisions_for(
        &self,
        slip_ids: &[SlipId],
    ) -> Result<Vec<RevisionRecord>, Self::Error> {
        let wanted: BTreeSet<SlipId> = slip_ids.iter().copied().collect();
        let revisions = self.revisions.read();
        Ok(wanted
            .iter()
            .filter_map(|id| revisions.get(id))
            .flatten()
            .cloned()
            .collect())
    }

    async fn list_revisions(
        &self,
        slip_id: Option<SlipId>,
    ) -> Result<Vec<RevisionRecord>, Self::Error> {
        let revisions = self.revisions.read();
        let mut list: Vec<RevisionRecord> = match slip_id {
            Some(id) => revisions.get(&id).cloned().unwrap_or_default(),
            None => revisions.values().flatten().cloned().collect(),
        };
        // Newest first; id breaks ties so equal timestamps stay deterministic
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn append_revision(
        &self,
        slip_id: SlipId,
        snapshot: String,
    ) -> Result<RevisionRecord, Self::Error> {
        if !self.slips.contains_key(&slip_id) {
            return Err(InMemoryError::SlipNotFound(slip_id));
        }

        let mut revisions = self.revisions.write();
        let id = Self::next_revision_id(&revisions);
        let list = revisions.entry(slip_id).or_default();
        let version = list.iter().map(|r| r.version).max().unwrap_or(0) + 1;

        let revision = RevisionRecord::new(id, slip_id, version, Utc::now(), snapshot);
        list.push(revision.clone());
        Ok(revision)
    }
}
