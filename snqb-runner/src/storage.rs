//! Metric storage
//!
//! Persists metric records into the `data_snqb` table of a SQLite file.
//! `(project_name, variable_name)` is the primary key, so re-persisting a
//! metric overwrites its value.

use anyhow::{Context, Result};
use async_trait::async_trait;
use snqb_core::domain::metric::MetricRecord;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Destination of the records produced by a pipeline
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Stores `records` as one batch and returns the number of rows written
    async fn persist(&self, records: &[MetricRecord]) -> Result<u64>;
}

/// SQLite-backed metric store
#[derive(Debug, Clone)]
pub struct MetricStore {
    pool: SqlitePool,
}

impl MetricStore {
    /// Opens (and creates if missing) the database file at `path`
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        Ok(Self { pool })
    }

    /// Creates the metrics table if it does not exist
    pub async fn create_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS data_snqb (
                project_name TEXT,
                variable_name TEXT,
                value TEXT,
                PRIMARY KEY (project_name, variable_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::debug!("Metric table ready");
        Ok(())
    }

    /// Upserts `records` inside one transaction
    pub async fn upsert_batch(&self, records: &[MetricRecord]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO data_snqb (project_name, variable_name, value)
                VALUES (?1, ?2, ?3)
                ON CONFLICT (project_name, variable_name) DO UPDATE SET
                    value = excluded.value
                "#,
            )
            .bind(&record.project_id)
            .bind(&record.metric_name)
            .bind(&record.value)
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    /// All stored metrics of a project, ordered by metric name
    #[cfg(test)]
    pub async fn find_by_project(&self, project_id: &str) -> Result<Vec<MetricRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, MetricRow>(
            r#"
            SELECT project_name, variable_name, value
            FROM data_snqb
            WHERE project_name = ?1
            ORDER BY variable_name ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Every stored metric, ordered by project then metric name
    #[cfg(test)]
    pub async fn list_all(&self) -> Result<Vec<MetricRecord>, sqlx::Error> {
        let rows = sqlx::query_as::<_, MetricRow>(
            r#"
            SELECT project_name, variable_name, value
            FROM data_snqb
            ORDER BY project_name ASC, variable_name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Number of stored metrics
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM data_snqb")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MetricSink for MetricStore {
    async fn persist(&self, records: &[MetricRecord]) -> Result<u64> {
        self.upsert_batch(records)
            .await
            .context("Failed to persist metric batch")
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[cfg(test)]
#[derive(sqlx::FromRow)]
struct MetricRow {
    project_name: String,
    variable_name: String,
    value: String,
}

#[cfg(test)]
impl From<MetricRow> for MetricRecord {
    fn from(row: MetricRow) -> Self {
        MetricRecord {
            project_id: row.project_name,
            metric_name: row.variable_name,
            value: row.value,
        }
    }
}
