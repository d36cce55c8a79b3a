//! Service middleware for request metrics.
//!
//! ## Metrics Exposed
//!
//! - `request_metric` - One event per request by path pattern, method, status, latency
//! - `report_metric` - One event per report with row count and cache outcome

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing events; aggregate them from the logs.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "slip_insights::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces every all-digit segment with `:id`. Report routes take ids as
/// query parameters, but this layer also sees unmatched paths, and those
/// must not mint one metric series per id.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Record one computed report.
pub fn record_report_metric(report: &str, rows: usize, cache_hit: bool, latency_ms: u64) {
    let cache = if cache_hit { "hit" } else { "miss" };
    info!(
        target: "slip_insights::metrics",
        metric_type = "report",
        report = report,
        rows = rows,
        cache = cache,
        latency_ms = latency_ms,
        "report_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_ids() {
        assert_eq!(normalize_path("/api/packing-slips/42"), "/api/packing-slips/:id");
        assert_eq!(
            normalize_path("/api/packing-slips/42/revisions"),
            "/api/packing-slips/:id/revisions"
        );
    }

    #[test]
    fn test_normalize_path_adjacent_ids() {
        assert_eq!(normalize_path("/api/packing-slips/1/2"), "/api/packing-slips/:id/:id");
        assert_eq!(normalize_path("/api/v2/7x"), "/api/v2/7x");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/api/reports/items/top"), "/api/reports/items/top");
    }
}
