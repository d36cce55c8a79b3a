//! PostgreSQL report store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Schema
//!
//! [`SCHEMA_STATEMENTS`] creates the tables if they are missing. Revision
//! snapshots are stored as opaque `TEXT` and parsed on read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{RevisionRecord, SlipFilter, SlipId, SlipLineRecord, SlipRecord};
use super::ReportStore;

/// DDL for the reporting tables, applied in order by [`PostgresReportStore::migrate`].
pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS vendors (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id BIGSERIAL PRIMARY KEY,
        sku TEXT NOT NULL DEFAULT '',
        name TEXT NOT NULL,
        unit TEXT NOT NULL DEFAULT '',
        notes TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS packing_slips (
        id BIGSERIAL PRIMARY KEY,
        slip_no TEXT NOT NULL,
        slip_date TIMESTAMPTZ NOT NULL,
        customer_name TEXT NOT NULL DEFAULT '',
        ship_to TEXT NOT NULL DEFAULT '',
        vendor_id BIGINT REFERENCES vendors(id) ON DELETE SET NULL,
        po_number TEXT NOT NULL DEFAULT '',
        box_number TEXT NOT NULL DEFAULT '',
        tracking_number TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS packing_slips_slip_date_idx ON packing_slips (slip_date)",
    r#"
    CREATE TABLE IF NOT EXISTS packing_slip_lines (
        id BIGSERIAL PRIMARY KEY,
        slip_id BIGINT NOT NULL REFERENCES packing_slips(id) ON DELETE CASCADE,
        item_id BIGINT REFERENCES items(id) ON DELETE SET NULL,
        qty DOUBLE PRECISION NOT NULL DEFAULT 0,
        box_name TEXT NOT NULL DEFAULT '',
        box_number TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS packing_slip_lines_slip_id_idx ON packing_slip_lines (slip_id)",
    r#"
    CREATE TABLE IF NOT EXISTS packing_slip_revisions (
        id BIGSERIAL PRIMARY KEY,
        slip_id BIGINT NOT NULL REFERENCES packing_slips(id) ON DELETE CASCADE,
        version INTEGER NOT NULL,
        snapshot TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE (slip_id, version)
    )
    "#,
];

const SLIP_COLUMNS: &str = r#"
    s.id, s.slip_no, s.slip_date, s.customer_name, s.ship_to, s.vendor_id,
    v.name AS vendor_name, s.po_number, s.box_number, s.tracking_number
"#;

/// Configuration for PostgreSQL connection pool.
///
/// Pool size is modest: report queries are few and read-heavy.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/packing_slips".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// PostgreSQL report store.
///
/// Reads slips, lines and revisions from the packing-slip database.
pub struct PostgresReportStore {
    pool: PgPool,
}

impl PostgresReportStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Create missing tables and indexes.
    pub async fn migrate(&self) -> Result<(), PostgresError> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!(statements = SCHEMA_STATEMENTS.len(), "Report schema applied");
        Ok(())
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    /// Parse a slip header from a database row.
    fn parse_slip_row(row: &PgRow) -> Result<SlipRecord, sqlx::Error> {
        let id: i64 = row.try_get("id")?;
        let slip_date: DateTime<Utc> = row.try_get("slip_date")?;
        let vendor_id: Option<i64> = row.try_get("vendor_id")?;
        let vendor_name: Option<String> = row.try_get("vendor_name")?;

        let mut slip = SlipRecord::new(
            SlipId::new(id),
            row.try_get::<String, _>("slip_no")?,
            slip_date,
            row.try_get::<String, _>("customer_name")?,
        );
        slip.ship_to = row.try_get("ship_to")?;
        slip.vendor_id = vendor_id;
        // A dangling vendor id reads as unnamed
        slip.vendor_name = vendor_id.and(vendor_name);
        slip.po_number = row.try_get("po_number")?;
        slip.box_number = row.try_get("box_number")?;
        slip.tracking_number = row.try_get("tracking_number")?;
        Ok(slip)
    }

    fn parse_line_row(row: &PgRow) -> Result<(SlipId, SlipLineRecord), sqlx::Error> {
        let slip_id: i64 = row.try_get("slip_id")?;
        let mut line = SlipLineRecord::new(
            row.try_get("id")?,
            row.try_get("item_id")?,
            row.try_get("qty")?,
        )
        .with_box(
            row.try_get::<String, _>("box_name")?,
            row.try_get::<String, _>("box_number")?,
        );
        line.sku = row.try_get::<Option<String>, _>("sku")?.unwrap_or_default();
        line.item_name = row.try_get::<Option<String>, _>("item_name")?.unwrap_or_default();
        line.unit = row.try_get::<Option<String>, _>("unit")?.unwrap_or_default();
        line.notes = row.try_get::<Option<String>, _>("notes")?.unwrap_or_default();
        Ok((SlipId::new(slip_id), line))
    }

    fn parse_revision_row(row: &PgRow) -> Result<RevisionRecord, sqlx::Error> {
        let version: i32 = row.try_get("version")?;
        Ok(RevisionRecord::new(
            row.try_get("id")?,
            SlipId::new(row.try_get("slip_id")?),
            u32::try_from(version).unwrap_or(0),
            row.try_get("created_at")?,
            row.try_get::<String, _>("snapshot")?,
        ))
    }

    /// Load lines for the given slips and attach them, ordered by line id.
    async fn attach_lines(&self, slips: &mut [SlipRecord]) -> Result<(), PostgresError> {
        if slips.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = slips.iter().map(|s| s.id.as_i64()).collect();
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.slip_id, l.item_id, l.qty, l.box_name, l.box_number,
                   i.sku, i.name AS item_name, i.unit, i.notes
            FROM packing_slip_lines l
            LEFT JOIN items i ON i.id = l.item_id
            WHERE l.slip_id = ANY($1)
            ORDER BY l.slip_id, l.id
            "#
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_slip: BTreeMap<SlipId, Vec<SlipLineRecord>> = BTreeMap::new();
        for row in &rows {
            let (slip_id, line) = Self::parse_line_row(row)?;
            by_slip.entry(slip_id).or_default().push(line);
        }
        for slip in slips.iter_mut() {
            slip.lines = by_slip.remove(&slip.id).unwrap_or_default();
        }
        Ok(())
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Revision appended for a slip that does not exist.
    #[error("Slip not found: {0}")]
    SlipNotFound(SlipId),
}

#[async_trait]
impl ReportStore for PostgresReportStore {
    type Error = PostgresError;

    async fn get_slip(&self, id: SlipId) -> Result<Option<SlipRecord>, Self::Error> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SLIP_COLUMNS}
            FROM packing_slips s
            LEFT JOIN vendors v ON v.id = s.vendor_id
            WHERE s.id = $1
            "#
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => {
                let mut slips = vec![Self::parse_slip_row(r)?];
                self.attach_lines(&mut slips).await?;
                Ok(slips.pop())
            }
            None => Ok(None),
        }
    }

    async fn find_slips(&self, filter: &SlipFilter) -> Result<Vec<SlipRecord>, Self::Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SLIP_COLUMNS}
            FROM packing_slips s
            LEFT JOIN vendors v ON v.id = s.vendor_id
            WHERE s.slip_date >= $1 AND s.slip_date < $2
              AND ($3::BIGINT IS NULL OR s.vendor_id = $3)
              AND ($4 = '' OR POSITION(LOWER($4) IN LOWER(s.customer_name)) > 0)
            ORDER BY s.id
            "#
        ))
        .bind(filter.from)
        .bind(filter.to_exclusive)
        .bind(filter.vendor_id)
        .bind(&filter.customer)
        .fetch_all(&self.pool)
        .await?;

        let mut slips = rows
            .iter()
            .map(Self::parse_slip_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_lines(&mut slips).await?;
        Ok(slips)
    }

    async fn get_revisions(&self, slip_id: SlipId) -> Result<Vec<RevisionRecord>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, slip_id, version, created_at, snapshot
            FROM packing_slip_revisions
            WHERE slip_id = $1
            ORDER BY version, id
            "#
        )
        .bind(slip_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::parse_revision_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn get_revisions_for(
        &self,
        slip_ids: &[SlipId],
    ) -> Result<Vec<RevisionRecord>, Self::Error> {
        if slip_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = slip_ids.iter().map(|id| id.as_i64()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, slip_id, version, created_at, snapshot
            FROM packing_slip_revisions
            WHERE slip_id = ANY($1)
            ORDER BY slip_id, version, id
            "#
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::parse_revision_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn list_revisions(
        &self,
        slip_id: Option<SlipId>,
    ) -> Result<Vec<RevisionRecord>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, slip_id, version, created_at, snapshot
            FROM packing_slip_revisions
            WHERE $1::BIGINT IS NULL OR slip_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        )
        .bind(slip_id.map(|id| id.as_i64()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::parse_revision_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn append_revision(
        &self,
        slip_id: SlipId,
        snapshot: String,
    ) -> Result<RevisionRecord, Self::Error> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent saves of the same slip
        let locked = sqlx::query("SELECT id FROM packing_slips WHERE id = $1 FOR UPDATE")
            .bind(slip_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(PostgresError::SlipNotFound(slip_id));
        }

        let next: i32 = sqlx::query(
            "SELECT COALESCE(MAX(version), 0) + 1 AS next FROM packing_slip_revisions WHERE slip_id = $1",
        )
        .bind(slip_id.as_i64())
        .fetch_one(&mut *tx)
        .await?
        .try_get("next")?;

        let row = sqlx::query(
            r#"
            INSERT INTO packing_slip_revisions (slip_id, version, snapshot)
            VALUES ($1, $2, $3)
            RETURNING id, slip_id, version, created_at, snapshot
            "#
        )
        .bind(slip_id.as_i64())
        .bind(next)
        .bind(&snapshot)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let revision = Self::parse_revision_row(&row)?;
        tracing::debug!(
            slip_id = %slip_id,
            version = revision.version,
            "Stored slip revision"
        );
        Ok(revision)
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
