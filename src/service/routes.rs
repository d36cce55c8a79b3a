//! Axum routes for the slip report service.

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{query_key, CacheStats};
use crate::engine::ReportError;
use crate::report::ItemRankMode;
use crate::store::ReportStore;
use crate::types::filters::parse_positive_int;
use crate::types::{ReportFilters, RevisionRecord, SlipId};
use crate::SLIP_INSIGHTS_SCHEMA_VERSION;

use super::middleware::record_report_metric;
use super::state::ServiceState;

/// Type alias for the service state with PostgresReportStore.
#[cfg(feature = "postgres")]
pub type AppState = ServiceState<crate::store::PostgresReportStore>;

type Params = Query<BTreeMap<String, String>>;

/// Response header carrying the cache outcome (`hit` or `miss`) of a
/// cached report.
pub const REPORT_CACHE_HEADER: &str = "x-report-cache";

// ============================================================================
// Response Types
// ============================================================================

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    /// Store connectivity status.
    pub database: bool,
    /// Report cache occupancy, absent when caching is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheHealth>,
}

/// Report cache occupancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheHealth {
    pub entries: usize,
    pub capacity: usize,
}

impl From<CacheStats> for CacheHealth {
    fn from(stats: CacheStats) -> Self {
        Self {
            entries: stats.len,
            capacity: stats.cap,
        }
    }
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: bool,
    pub details: Option<String>,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    #[serde(skip)]
    status: u16,
}

impl ErrorResponse {
    /// Create a new error response with code and message (status 500).
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }

    /// Error for a report that could not be computed.
    ///
    /// The cause goes to the log, not to the client.
    fn report_failure(what: &str, cause: ReportError) -> Self {
        tracing::error!(report = what, error = %cause, "Report computation failed");
        Self::new("REPORT_FAILED", format!("Unable to load {}.", what))
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!(
            code = %self.code,
            error = %self.error,
            "Request error"
        );
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

fn parse_filters(params: &BTreeMap<String, String>) -> ReportFilters {
    ReportFilters::from_params(params, Utc::now().date_naive())
}

/// Number of rows in a report body, for metrics.
fn row_count(body: &Value) -> usize {
    ["rows", "points", "mostEdited"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_array))
        .map_or(1, Vec::len)
}

/// Serve a report through the cache.
///
/// Bodies are cached as JSON values under the canonical query; failed
/// computations are not cached.
async fn cached_report<S, T, F, Fut>(
    state: &ServiceState<S>,
    path: &str,
    params: &BTreeMap<String, String>,
    what: &str,
    compute: F,
) -> Result<Response, ErrorResponse>
where
    S: ReportStore + 'static,
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ReportError>>,
{
    let start = Instant::now();
    let key = query_key(path, params);

    let lookup = state
        .cache
        .get_or_try_compute(&key, || async {
            let report = compute().await?;
            Ok::<_, ReportError>(serde_json::to_value(report)?)
        })
        .await
        .map_err(|e| ErrorResponse::report_failure(what, e))?;

    record_report_metric(
        path,
        row_count(&lookup.value),
        lookup.cache_hit,
        start.elapsed().as_millis() as u64,
    );
    let outcome = if lookup.cache_hit { "hit" } else { "miss" };
    Ok(([(REPORT_CACHE_HEADER, outcome)], Json(lookup.value)).into_response())
}

/// Headline KPIs.
async fn overview_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(params): Params,
) -> Result<Response, ErrorResponse> {
    let filters = parse_filters(&params);
    cached_report(&state, "/api/reports/overview", &params, "overview report", || {
        state.engine.overview(&filters)
    })
    .await
}

/// Bucketed series.
async fn timeseries_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(params): Params,
) -> Result<Response, ErrorResponse> {
    let filters = parse_filters(&params);
    cached_report(&state, "/api/reports/timeseries", &params, "timeseries report", || {
        state.engine.timeseries(&filters)
    })
    .await
}

/// Top customers.
async fn top_customers_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(params): Params,
) -> Result<Response, ErrorResponse> {
    let filters = parse_filters(&params);
    cached_report(&state, "/api/reports/customers/top", &params, "top customers report", || {
        state.engine.top_customers(&filters)
    })
    .await
}

/// Top vendors; `includeNullVendor=1` groups unassigned slips.
async fn top_vendors_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(params): Params,
) -> Result<Response, ErrorResponse> {
    let filters = parse_filters(&params);
    let include_unassigned = params.get("includeNullVendor").map(String::as_str) == Some("1");
    cached_report(&state, "/api/reports/vendors/top", &params, "top vendors report", || {
        state.engine.top_vendors(&filters, include_unassigned)
    })
    .await
}

/// Top items; `mode=freq` ranks by line count.
async fn top_items_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(params): Params,
) -> Result<Response, ErrorResponse> {
    let filters = parse_filters(&params);
    let mode = ItemRankMode::from_param(params.get("mode").map(String::as_str));
    cached_report(&state, "/api/reports/items/top", &params, "top shipped items", || {
        state.engine.top_items(&filters, mode)
    })
    .await
}

/// Shipped item totals.
async fn item_summary_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(params): Params,
) -> Result<Response, ErrorResponse> {
    let filters = parse_filters(&params);
    cached_report(&state, "/api/reports/items/summary", &params, "shipped item summary", || {
        state.engine.item_summary(&filters)
    })
    .await
}

/// Most revised slips.
async fn revision_leaders_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(params): Params,
) -> Result<Response, ErrorResponse> {
    let filters = parse_filters(&params);
    cached_report(&state, "/api/reports/revisions/top", &params, "revision leaders", || {
        state.engine.revision_leaders(&filters)
    })
    .await
}

/// Most edited slips plus one slip's timeline.
async fn revision_insights_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(params): Params,
) -> Result<Response, ErrorResponse> {
    let filters = parse_filters(&params);
    cached_report(&state, "/api/reports/revision-insights", &params, "revision insights", || {
        state.engine.revision_insights(&filters)
    })
    .await
}

/// Raw revision history, newest first. Not cached.
async fn revision_history_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    Query(params): Params,
) -> Result<Json<Vec<RevisionRecord>>, ErrorResponse> {
    let slip_id = parse_positive_int(params.get("slipId").map(String::as_str)).map(SlipId::new);
    state
        .engine
        .revision_history(slip_id)
        .await
        .map(Json)
        .map_err(|e| ErrorResponse::report_failure("history", e))
}

/// Health check endpoint (detailed).
async fn health_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<HealthResponse> {
    let db_healthy = state.engine.is_healthy().await;

    Json(HealthResponse {
        status: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: SLIP_INSIGHTS_SCHEMA_VERSION.to_string(),
        database: db_healthy,
        cache: state.cache.stats().map(CacheHealth::from),
    })
}

/// Liveness probe endpoint.
///
/// Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the store is reachable, 503 otherwise.
async fn readiness_handler<S: ReportStore + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.engine.is_healthy().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            database: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                database: false,
                details: Some("Database connection failed".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the report service.
pub fn create_router<S: ReportStore + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Reports
        .route("/api/reports/overview", get(overview_handler::<S>))
        .route("/api/reports/timeseries", get(timeseries_handler::<S>))
        .route("/api/reports/customers/top", get(top_customers_handler::<S>))
        .route("/api/reports/vendors/top", get(top_vendors_handler::<S>))
        .route("/api/reports/items/top", get(top_items_handler::<S>))
        .route("/api/reports/items/summary", get(item_summary_handler::<S>))
        .route("/api/reports/revisions/top", get(revision_leaders_handler::<S>))
        .route("/api/reports/revision-insights", get(revision_insights_handler::<S>))
        // History
        .route("/api/packing-slips/revisions", get(revision_history_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .with_state(state)
}
