//! Report engine: loads slips and revisions from a store and runs the
//! report computations over them.
//!
//! Every report is scoped by a [`ReportFilters`] window. Revision-based
//! reports only see revisions of slips inside that window.

use std::sync::Arc;

use crate::report::{
    build_series, most_edited, revision_leaders, select_slip, top_customers, top_items,
    top_vendors, CustomerRank, ItemRank, ItemRankMode, ItemSummary, ItemSummaryReport,
    OverviewKpis, OverviewReport, RankedReport, RevisionInsights, RevisionLeader, SelectedSlip,
    TimeseriesMetric, TimeseriesReport, VendorRank,
};
use crate::store::ReportStore;
use crate::types::{ReportFilters, RevisionRecord, SlipId, SlipRecord, Snapshot};

/// Errors from report computation.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The store failed.
    #[error("Store error: {0}")]
    Store(String),
    /// The slip does not exist.
    #[error("Slip not found: {0}")]
    SlipNotFound(SlipId),
    /// A snapshot could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReportError {
    /// Wrap a store error.
    pub fn from_store<E: std::error::Error>(error: E) -> Self {
        Self::Store(error.to_string())
    }
}

/// Composes a [`ReportStore`] with the report computations.
pub struct ReportEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for ReportEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ReportStore> ReportEngine<S> {
    /// Create an engine over a store.
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    async fn load_slips(&self, filters: &ReportFilters) -> Result<Vec<SlipRecord>, ReportError> {
        self.store
            .find_slips(&filters.slip_filter())
            .await
            .map_err(ReportError::from_store)
    }

    async fn load_revisions(
        &self,
        slips: &[SlipRecord],
    ) -> Result<Vec<RevisionRecord>, ReportError> {
        let ids: Vec<SlipId> = slips.iter().map(|s| s.id).collect();
        self.store
            .get_revisions_for(&ids)
            .await
            .map_err(ReportError::from_store)
    }

    /// Headline KPIs.
    pub async fn overview(&self, filters: &ReportFilters) -> Result<OverviewReport, ReportError> {
        let slips = self.load_slips(filters).await?;
        let revisions = self.load_revisions(&slips).await?;
        let kpis = OverviewKpis::compute(&slips, &revisions);

        tracing::debug!(
            total_slips = kpis.total_slips,
            total_revisions = kpis.total_revisions,
            "Computed overview"
        );

        Ok(OverviewReport {
            filters: filters.clone(),
            kpis,
        })
    }

    /// Bucketed series for `filters.metric`.
    pub async fn timeseries(
        &self,
        filters: &ReportFilters,
    ) -> Result<TimeseriesReport, ReportError> {
        let slips = self.load_slips(filters).await?;
        let revisions = match filters.metric {
            TimeseriesMetric::Revisions => self.load_revisions(&slips).await?,
            _ => Vec::new(),
        };
        let points = build_series(&slips, &revisions, filters.bucket, filters.metric);

        tracing::debug!(
            bucket = ?filters.bucket,
            metric = ?filters.metric,
            points = points.len(),
            "Computed timeseries"
        );

        Ok(TimeseriesReport {
            filters: filters.clone(),
            points,
        })
    }

    /// Customers ranked by slips, then quantity.
    pub async fn top_customers(
        &self,
        filters: &ReportFilters,
    ) -> Result<RankedReport<CustomerRank>, ReportError> {
        let slips = self.load_slips(filters).await?;
        let rows = top_customers(&slips, filters.limit);
        tracing::debug!(rows = rows.len(), "Ranked customers");
        Ok(RankedReport {
            filters: filters.clone(),
            rows,
        })
    }

    /// Vendors ranked by slips, then quantity.
    ///
    /// Unassigned slips are grouped when `include_unassigned` is set or a
    /// vendor filter is present.
    pub async fn top_vendors(
        &self,
        filters: &ReportFilters,
        include_unassigned: bool,
    ) -> Result<RankedReport<VendorRank>, ReportError> {
        let slips = self.load_slips(filters).await?;
        let include = include_unassigned || filters.vendor_id.is_some();
        let rows = top_vendors(&slips, include, filters.limit);
        tracing::debug!(rows = rows.len(), include_unassigned = include, "Ranked vendors");
        Ok(RankedReport {
            filters: filters.clone(),
            rows,
        })
    }

    /// Items ranked by quantity or frequency.
    pub async fn top_items(
        &self,
        filters: &ReportFilters,
        mode: ItemRankMode,
    ) -> Result<RankedReport<ItemRank>, ReportError> {
        let slips = self.load_slips(filters).await?;
        let rows = top_items(&slips, mode, filters.limit);
        tracing::debug!(rows = rows.len(), mode = ?mode, "Ranked items");
        Ok(RankedReport {
            filters: filters.clone(),
            rows,
        })
    }

    /// Shipped item totals.
    pub async fn item_summary(
        &self,
        filters: &ReportFilters,
    ) -> Result<ItemSummaryReport, ReportError> {
        let slips = self.load_slips(filters).await?;
        Ok(ItemSummaryReport {
            filters: filters.clone(),
            summary: ItemSummary::compute(&slips),
        })
    }

    /// Slips ranked by revision count, then recency.
    pub async fn revision_leaders(
        &self,
        filters: &ReportFilters,
    ) -> Result<RankedReport<RevisionLeader>, ReportError> {
        let slips = self.load_slips(filters).await?;
        let revisions = self.load_revisions(&slips).await?;
        let rows = revision_leaders(&slips, &revisions, filters.limit);
        tracing::debug!(rows = rows.len(), "Ranked revision leaders");
        Ok(RankedReport {
            filters: filters.clone(),
            rows,
        })
    }

    /// Most edited slips plus the timeline of the selected one.
    ///
    /// The selection is `filters.slip_id` when set, else the most edited
    /// slip. A requested slip outside the filter window selects nothing.
    /// The echoed filters carry the id of the slip actually selected.
    pub async fn revision_insights(
        &self,
        filters: &ReportFilters,
    ) -> Result<RevisionInsights, ReportError> {
        let slips = self.load_slips(filters).await?;
        let revisions = self.load_revisions(&slips).await?;
        let most_edited = most_edited(&slips, &revisions, filters.limit);

        let selected_slip = match select_slip(&slips, filters.slip_id, &most_edited) {
            Some(slip) => {
                let own = self
                    .store
                    .get_revisions(slip.id)
                    .await
                    .map_err(ReportError::from_store)?;
                Some(SelectedSlip::build(slip, &own))
            }
            None => None,
        };

        if let Some(selected) = &selected_slip {
            tracing::debug!(
                slip_id = %selected.slip_id,
                revisions = selected.total_revisions,
                invalid_snapshots = selected.invalid_snapshots,
                "Built revision timeline"
            );
        }

        Ok(RevisionInsights {
            filters: ReportFilters {
                slip_id: selected_slip.as_ref().map(|s| s.slip_id),
                ..filters.clone()
            },
            most_edited,
            selected_slip,
        })
    }

    /// Raw revisions for one slip or all slips, newest first.
    pub async fn revision_history(
        &self,
        slip_id: Option<SlipId>,
    ) -> Result<Vec<RevisionRecord>, ReportError> {
        self.store
            .list_revisions(slip_id)
            .await
            .map_err(ReportError::from_store)
    }

    /// Snapshot the slip's current state as its next revision.
    pub async fn capture_revision(&self, slip_id: SlipId) -> Result<RevisionRecord, ReportError> {
        let slip = self
            .store
            .get_slip(slip_id)
            .await
            .map_err(ReportError::from_store)?
            .ok_or(ReportError::SlipNotFound(slip_id))?;

        let snapshot = Snapshot::capture(&slip).to_json()?;
        let revision = self
            .store
            .append_revision(slip_id, snapshot)
            .await
            .map_err(ReportError::from_store)?;

        tracing::info!(
            slip_id = %slip_id,
            version = revision.version,
            lines = slip.lines.len(),
            "Captured slip revision"
        );
        Ok(revision)
    }

    /// Whether the store is reachable.
    pub async fn is_healthy(&self) -> bool {
        self.store.is_healthy().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryReportStore;
    use crate::types::SlipLineRecord;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn engine() -> ReportEngine<InMemoryReportStore> {
        let mut store = InMemoryReportStore::new();
        store.add_slip(
            SlipRecord::new(
                SlipId::new(1),
                "PS-000001",
                Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
                "Acme",
            )
            .with_line(SlipLineRecord::new(1, Some(1), 5.0).with_box("A", "1")),
        );
        ReportEngine::new(store)
    }

    fn january() -> ReportFilters {
        ReportFilters::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_capture_revision_versions_and_snapshot() {
        let engine = engine();

        let first = engine.capture_revision(SlipId::new(1)).await.unwrap();
        let second = engine.capture_revision(SlipId::new(1)).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);

        let snapshot = Snapshot::parse(&second.snapshot).unwrap();
        assert_eq!(snapshot.slip_no, "PS-000001");
        assert_eq!(snapshot.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_capture_missing_slip() {
        let result = engine().capture_revision(SlipId::new(42)).await;
        assert!(matches!(result, Err(ReportError::SlipNotFound(_))));
    }

    #[tokio::test]
    async fn test_unchanged_captures_diff_empty() {
        let engine = engine();
        engine.capture_revision(SlipId::new(1)).await.unwrap();
        engine.capture_revision(SlipId::new(1)).await.unwrap();

        let insights = engine.revision_insights(&january()).await.unwrap();
        let selected = insights.selected_slip.unwrap();
        assert_eq!(selected.total_revisions, 2);
        assert!(selected.timeline[1].diff_summary.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insights_echo_selected_slip() {
        let engine = engine();
        engine.capture_revision(SlipId::new(1)).await.unwrap();

        let insights = engine.revision_insights(&january()).await.unwrap();
        assert_eq!(january().slip_id, None);
        assert_eq!(insights.filters.slip_id, Some(SlipId::new(1)));
    }

    #[tokio::test]
    async fn test_selected_slip_outside_window() {
        let engine = engine();
        engine.capture_revision(SlipId::new(1)).await.unwrap();

        let february = ReportFilters {
            slip_id: Some(SlipId::new(1)),
            ..ReportFilters::new(
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            )
        };
        let insights = engine.revision_insights(&february).await.unwrap();
        assert!(insights.most_edited.is_empty());
        assert!(insights.selected_slip.is_none());
        assert_eq!(insights.filters.slip_id, None);
    }
}
