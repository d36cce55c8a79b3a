//! Slip report service.
//!
//! Serves the packing-slip reports over HTTP from a PostgreSQL store.
//!
//! ## Configuration
//!
//! - `ServiceConfig`: `HOST`, `PORT` (8002), `LOG_FORMAT` (`json` or
//!   `pretty`), `RUN_MIGRATIONS` (`1` to create missing tables),
//!   `DB_STARTUP_TIMEOUT_SECS` (30)
//! - `PostgresConfig`: `DATABASE_URL`, `DB_*` pool settings
//! - `CacheConfig`: `REPORT_CACHE_MAX_ENTRIES`, `REPORT_CACHE_TTL_SECS`,
//!   `REPORT_CACHE_ENABLED`
//! - `RUST_LOG`: log filter (default: info)
//!
//! ```bash
//! DATABASE_URL=postgresql://... cargo run --bin slip_report_service --features service
//! ```

use std::time::Instant;

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slip_insights::service::{
    create_router, metrics_middleware, LogFormat, ServiceConfig, ServiceState,
    REPORT_CACHE_HEADER,
};
use slip_insights::PostgresReportStore;

const REQUEST_ID_HEADER: &str = "x-request-id";

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "slip_report_service=info,slip_insights=info,sqlx=warn".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init(),
    }
}

/// Access log: one event per request with its id and the report cache
/// outcome, and the request id echoed back to the caller.
async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!("request", request_id = %request_id);
    let mut response = next.run(request).instrument(span).await;

    let cache = response
        .headers()
        .get(REPORT_CACHE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_string();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    info!(
        target: "slip_report_service::access",
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        cache = %cache,
        latency_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );
    response
}

async fn connect_store(
    config: &ServiceConfig,
) -> Result<PostgresReportStore, Box<dyn std::error::Error>> {
    let started = Instant::now();
    let store = tokio::time::timeout(config.startup_timeout, PostgresReportStore::from_env())
        .await
        .map_err(|_| {
            format!(
                "database connection timed out after {}s",
                config.startup_timeout.as_secs()
            )
        })??;

    if config.run_migrations {
        store.migrate().await?;
    }

    let pool = store.pool_stats();
    info!(
        latency_ms = started.elapsed().as_millis() as u64,
        pool_size = pool.size,
        pool_idle = pool.idle,
        pool_max = pool.max,
        migrated = config.run_migrations,
        "Report store ready"
    );
    Ok(store)
}

/// Resolves on Ctrl+C or SIGTERM. A signal that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "ctrl_c",
        _ = terminate => "sigterm",
    };
    info!(signal = signal, "Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env();
    init_tracing(config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        build_sha = option_env!("BUILD_SHA").unwrap_or("dev"),
        "Starting slip report service"
    );

    let store = connect_store(&config).await.map_err(|e| {
        error!(error = %e, "Report store unavailable");
        e
    })?;

    let app = create_router(ServiceState::from_env(store))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(access_log))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = config.addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}
