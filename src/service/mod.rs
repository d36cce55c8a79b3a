//! Slip Report REST Service
//!
//! Exposes the report engine as a read-only JSON API with a read-through
//! cache in front of every report.
//!
//! ## Endpoints
//!
//! - `GET /api/reports/overview` - Headline KPIs
//! - `GET /api/reports/timeseries` - Bucketed series (`bucket`, `metric`)
//! - `GET /api/reports/customers/top` - Top customers
//! - `GET /api/reports/vendors/top` - Top vendors (`includeNullVendor`)
//! - `GET /api/reports/items/top` - Top items (`mode=qty|freq`)
//! - `GET /api/reports/items/summary` - Shipped item totals
//! - `GET /api/reports/revisions/top` - Most revised slips
//! - `GET /api/reports/revision-insights` - Most edited slips and a timeline (`slipId`)
//! - `GET /api/packing-slips/revisions` - Raw revision history (`slipId`)
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod config;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{LogFormat, ServiceConfig};
pub use middleware::{metrics_middleware, record_report_metric};
pub use routes::{create_router, ErrorResponse, REPORT_CACHE_HEADER};
#[cfg(feature = "postgres")]
pub use routes::AppState;
pub use state::ServiceState;
