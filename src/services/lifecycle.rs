//! Chunk lifecycle: monthly partitioning, compression and retention.
//!
//! Time-series tables are declared as chunked ("hypertable") in a small
//! catalog; chunks are fixed one-calendar-month buckets of the table's
//! time column. Policies are rows in a policy catalog and are applied by
//! an explicit maintenance pass: compression marks old chunks read-mostly
//! (recording the segment key), retention physically drops chunk rows.
//!
//! Every administrative operation is idempotent and returns a typed
//! outcome. A failed policy is a warning, never a fatal error —
//! compression and retention are optimizations on top of a correct
//! store.

use chrono::NaiveDate;
use sqlx::Row;
use tracing::{info, warn};

use crate::constants::CHUNK_INTERVAL_MONTHS;
use crate::error::Result;
use crate::services::database::StockStore;
use crate::utils::{month_start, months_back};

/// Result of one administrative policy call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// Declared for the first time
    Applied,
    /// Identical declaration already present (if-not-exists semantics)
    AlreadySet,
    /// Declaration rejected; reason is logged and setup continues
    Failed(String),
}

impl PolicyOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, PolicyOutcome::Failed(_))
    }
}

/// Chunks touched by one maintenance pass, per table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub compressed_chunks: Vec<(String, NaiveDate)>,
    pub dropped_chunks: Vec<(String, NaiveDate)>,
}

const CATALOG_DDL: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS hypertables (
        table_name TEXT PRIMARY KEY,
        time_column TEXT NOT NULL,
        chunk_interval_months INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lifecycle_policies (
        table_name TEXT NOT NULL,
        kind TEXT NOT NULL CHECK (kind IN ('compression', 'retention')),
        segment_by TEXT,
        older_than_months INTEGER NOT NULL,
        PRIMARY KEY (table_name, kind)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunk_catalog (
        table_name TEXT NOT NULL,
        chunk_start DATE NOT NULL,
        compressed INTEGER NOT NULL DEFAULT 0,
        segment_by TEXT,
        PRIMARY KEY (table_name, chunk_start)
    )
    "#,
];

async fn ensure_catalog(store: &StockStore) -> Result<()> {
    for ddl in CATALOG_DDL {
        sqlx::query(ddl).execute(store.pool()).await?;
    }
    Ok(())
}

/// True if `table` exists in the schema (guards dynamic table names: only
/// names verified against sqlite_master are ever spliced into SQL)
async fn table_exists(store: &StockStore, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(table)
            .fetch_one(store.pool())
            .await?;
    Ok(count > 0)
}

async fn hypertable_time_column(store: &StockStore, table: &str) -> Result<Option<String>> {
    let column = sqlx::query_scalar("SELECT time_column FROM hypertables WHERE table_name = ?1")
        .bind(table)
        .fetch_optional(store.pool())
        .await?;
    Ok(column)
}

/// Declare `table` time-partitioned into fixed monthly chunks.
///
/// Idempotent: repeated declarations are `AlreadySet`, never an error.
pub async fn partition_table(
    store: &StockStore,
    table: &str,
    time_column: &str,
    chunk_interval_months: u32,
) -> Result<PolicyOutcome> {
    ensure_catalog(store).await?;

    if !table_exists(store, table).await? {
        let reason = format!("table '{}' does not exist", table);
        warn!(table, %reason, "Partition declaration failed");
        return Ok(PolicyOutcome::Failed(reason));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO hypertables (table_name, time_column, chunk_interval_months)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(table_name) DO NOTHING
        "#,
    )
    .bind(table)
    .bind(time_column)
    .bind(chunk_interval_months)
    .execute(store.pool())
    .await?;

    if result.rows_affected() > 0 {
        info!(table, time_column, chunk_interval_months, "Table partitioned into monthly chunks");
        Ok(PolicyOutcome::Applied)
    } else {
        Ok(PolicyOutcome::AlreadySet)
    }
}

/// Mark chunks of `table` older than `older_than_months` eligible for
/// columnar compression, segmented by `segment_by` so per-entity scans
/// stay cheap after compression.
///
/// Failure (e.g., the table was never partitioned) is non-fatal: logged
/// as a warning, and initialization continues for the remaining tables.
pub async fn set_compression_policy(
    store: &StockStore,
    table: &str,
    segment_by: &str,
    older_than_months: u32,
) -> Result<PolicyOutcome> {
    ensure_catalog(store).await?;

    if hypertable_time_column(store, table).await?.is_none() {
        let reason = format!("'{}' is not a partitioned table", table);
        warn!(table, %reason, "Compression policy failed");
        return Ok(PolicyOutcome::Failed(reason));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO lifecycle_policies (table_name, kind, segment_by, older_than_months)
        VALUES (?1, 'compression', ?2, ?3)
        ON CONFLICT(table_name, kind) DO NOTHING
        "#,
    )
    .bind(table)
    .bind(segment_by)
    .bind(older_than_months)
    .execute(store.pool())
    .await?;

    if result.rows_affected() > 0 {
        info!(table, segment_by, older_than_months, "Compression policy set");
        Ok(PolicyOutcome::Applied)
    } else {
        Ok(PolicyOutcome::AlreadySet)
    }
}

/// Schedule automatic deletion of chunks older than `older_than_months`.
/// Non-fatal on failure, same as compression.
pub async fn set_retention_policy(
    store: &StockStore,
    table: &str,
    older_than_months: u32,
) -> Result<PolicyOutcome> {
    ensure_catalog(store).await?;

    if hypertable_time_column(store, table).await?.is_none() {
        let reason = format!("'{}' is not a partitioned table", table);
        warn!(table, %reason, "Retention policy failed");
        return Ok(PolicyOutcome::Failed(reason));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO lifecycle_policies (table_name, kind, segment_by, older_than_months)
        VALUES (?1, 'retention', NULL, ?2)
        ON CONFLICT(table_name, kind) DO NOTHING
        "#,
    )
    .bind(table)
    .bind(older_than_months)
    .execute(store.pool())
    .await?;

    if result.rows_affected() > 0 {
        info!(table, older_than_months, "Retention policy set");
        Ok(PolicyOutcome::Applied)
    } else {
        Ok(PolicyOutcome::AlreadySet)
    }
}

/// Apply all registered policies as of `today`.
///
/// Refreshes the chunk catalog from the data, marks chunks past the
/// compression threshold read-mostly, then drops chunks past the
/// retention threshold (rows and catalog entry both).
pub async fn run_maintenance(store: &StockStore, today: NaiveDate) -> Result<MaintenanceReport> {
    ensure_catalog(store).await?;
    let mut report = MaintenanceReport::default();

    let hypertables = sqlx::query("SELECT table_name, time_column FROM hypertables")
        .fetch_all(store.pool())
        .await?;

    for row in hypertables {
        let table: String = row.try_get("table_name").map_err(|e| crate::error::AppError::Database(e.to_string()))?;
        let time_column: String = row.try_get("time_column").map_err(|e| crate::error::AppError::Database(e.to_string()))?;

        refresh_chunk_catalog(store, &table, &time_column).await?;

        if let Some((segment_by, older_than)) = policy(store, &table, "compression").await? {
            let boundary = months_back(today, older_than);
            let chunks = chunks_before(store, &table, boundary, false).await?;
            for chunk_start in chunks {
                sqlx::query(
                    "UPDATE chunk_catalog SET compressed = 1, segment_by = ?3 WHERE table_name = ?1 AND chunk_start = ?2",
                )
                .bind(&table)
                .bind(chunk_start)
                .bind(segment_by.as_deref())
                .execute(store.pool())
                .await?;
                info!(table = %table, chunk = %chunk_start, "Chunk compressed");
                report.compressed_chunks.push((table.clone(), chunk_start));
            }
        }

        if let Some((_, older_than)) = policy(store, &table, "retention").await? {
            let boundary = months_back(today, older_than);
            let chunks = chunks_before_any(store, &table, boundary).await?;
            for chunk_start in chunks {
                drop_chunk(store, &table, &time_column, chunk_start).await?;
                info!(table = %table, chunk = %chunk_start, "Chunk dropped by retention");
                report.dropped_chunks.push((table.clone(), chunk_start));
            }
        }
    }

    Ok(report)
}

/// Insert any month buckets present in the data but missing from the
/// chunk catalog
async fn refresh_chunk_catalog(store: &StockStore, table: &str, time_column: &str) -> Result<()> {
    // table/column names come from our own verified catalog
    let sql = format!(
        "SELECT DISTINCT date({table}.{col}, 'start of month') FROM {table}",
        table = table,
        col = time_column,
    );
    let months: Vec<NaiveDate> = sqlx::query_scalar(&sql).fetch_all(store.pool()).await?;

    for chunk_start in months {
        sqlx::query(
            r#"
            INSERT INTO chunk_catalog (table_name, chunk_start)
            VALUES (?1, ?2)
            ON CONFLICT(table_name, chunk_start) DO NOTHING
            "#,
        )
        .bind(table)
        .bind(month_start(chunk_start))
        .execute(store.pool())
        .await?;
    }
    Ok(())
}

async fn policy(
    store: &StockStore,
    table: &str,
    kind: &str,
) -> Result<Option<(Option<String>, u32)>> {
    let row = sqlx::query(
        "SELECT segment_by, older_than_months FROM lifecycle_policies WHERE table_name = ?1 AND kind = ?2",
    )
    .bind(table)
    .bind(kind)
    .fetch_optional(store.pool())
    .await?;

    match row {
        Some(row) => {
            let segment_by: Option<String> = row
                .try_get("segment_by")
                .map_err(|e| crate::error::AppError::Database(e.to_string()))?;
            let older_than: i64 = row
                .try_get("older_than_months")
                .map_err(|e| crate::error::AppError::Database(e.to_string()))?;
            Ok(Some((segment_by, older_than as u32)))
        }
        None => Ok(None),
    }
}

/// Uncompressed chunks strictly before `boundary` (or all when
/// `include_compressed`)
async fn chunks_before(
    store: &StockStore,
    table: &str,
    boundary: NaiveDate,
    include_compressed: bool,
) -> Result<Vec<NaiveDate>> {
    let sql = if include_compressed {
        "SELECT chunk_start FROM chunk_catalog WHERE table_name = ?1 AND chunk_start < ?2 ORDER BY chunk_start"
    } else {
        "SELECT chunk_start FROM chunk_catalog WHERE table_name = ?1 AND chunk_start < ?2 AND compressed = 0 ORDER BY chunk_start"
    };
    let chunks = sqlx::query_scalar(sql)
        .bind(table)
        .bind(boundary)
        .fetch_all(store.pool())
        .await?;
    Ok(chunks)
}

async fn chunks_before_any(
    store: &StockStore,
    table: &str,
    boundary: NaiveDate,
) -> Result<Vec<NaiveDate>> {
    chunks_before(store, table, boundary, true).await
}

/// Delete a chunk's rows and its catalog entry in one transaction
async fn drop_chunk(
    store: &StockStore,
    table: &str,
    time_column: &str,
    chunk_start: NaiveDate,
) -> Result<()> {
    let next_chunk = chunk_start + chrono::Months::new(CHUNK_INTERVAL_MONTHS);
    let sql = format!(
        "DELETE FROM {table} WHERE {col} >= ?1 AND {col} < ?2",
        table = table,
        col = time_column,
    );

    let mut tx = store.pool().begin().await?;
    sqlx::query(&sql)
        .bind(chunk_start)
        .bind(next_chunk)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunk_catalog WHERE table_name = ?1 AND chunk_start = ?2")
        .bind(table)
        .bind(chunk_start)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Chunk states for the status command
pub async fn chunk_summary(store: &StockStore) -> Result<Vec<(String, i64, i64)>> {
    ensure_catalog(store).await?;
    let rows = sqlx::query(
        r#"
        SELECT table_name, COUNT(*) AS chunks, SUM(compressed) AS compressed
        FROM chunk_catalog GROUP BY table_name ORDER BY table_name
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    rows.iter()
        .map(|row| {
            let table: String = row
                .try_get("table_name")
                .map_err(|e| crate::error::AppError::Database(e.to_string()))?;
            let chunks: i64 = row
                .try_get("chunks")
                .map_err(|e| crate::error::AppError::Database(e.to_string()))?;
            let compressed: i64 = row
                .try_get::<Option<i64>, _>("compressed")
                .map_err(|e| crate::error::AppError::Database(e.to_string()))?
                .unwrap_or(0);
            Ok((table, chunks, compressed))
        })
        .collect()
}
