//! Persistent storage for performance metrics
//!
//! SQLite-backed write-behind log so the in-memory tracker can be refilled
//! after a restart. The tracker stays authoritative for reads.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::PerformanceMetric;
use crate::error::{Error, Result};

/// SQL to create the performance metrics table
pub const CREATE_PERFORMANCE_METRICS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS performance_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    task_type TEXT NOT NULL,
    latency_ms INTEGER NOT NULL DEFAULT 0,
    input_tokens INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    cost REAL NOT NULL DEFAULT 0.0,
    success INTEGER NOT NULL DEFAULT 1,
    error_kind TEXT,
    user_rating INTEGER,
    timestamp_ms INTEGER NOT NULL,
    session_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_performance_metrics_ts ON performance_metrics(timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_performance_metrics_provider ON performance_metrics(provider, task_type);
"#;

const INSERT_METRIC_SQL: &str = r#"
INSERT INTO performance_metrics (
    provider, model, task_type, latency_ms, input_tokens, output_tokens,
    cost, success, error_kind, user_rating, timestamp_ms, session_id
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

/// Store for persisting performance metrics
#[derive(Debug, Clone)]
pub struct MetricStore {
    pool: SqlitePool,
}

impl MetricStore {
    /// Create a new store from an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new store and connect to the database
    pub async fn connect(database_path: &Path) -> Result<Self> {
        let url = format!("sqlite://{}?mode=rwc", database_path.display());

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(Error::DatabaseError)?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_PERFORMANCE_METRICS_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseError)?;

        info!("Performance metrics table initialized");
        Ok(())
    }

    /// Append one metric
    pub async fn save_metric(&self, metric: &PerformanceMetric) -> Result<()> {
        bind_metric(sqlx::query(INSERT_METRIC_SQL), metric)
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseError)?;

        debug!(
            provider = %metric.provider,
            task_type = %metric.task_type,
            "Saved performance metric"
        );
        Ok(())
    }

    /// Append several metrics atomically
    pub async fn save_all(&self, metrics: &[PerformanceMetric]) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(Error::DatabaseError)?;

        for metric in metrics {
            bind_metric(sqlx::query(INSERT_METRIC_SQL), metric)
                .execute(&mut *tx)
                .await
                .map_err(Error::DatabaseError)?;
        }

        tx.commit().await.map_err(Error::DatabaseError)?;

        info!(count = metrics.len(), "Saved batch of performance metrics");
        Ok(())
    }

    /// Load the newest `limit` metrics, returned oldest first
    pub async fn load_recent(&self, limit: usize) -> Result<Vec<PerformanceMetric>> {
        let rows = sqlx::query(
            r#"
            SELECT provider, model, task_type, latency_ms, input_tokens, output_tokens,
                   cost, success, error_kind, user_rating, timestamp_ms, session_id
            FROM performance_metrics
            ORDER BY timestamp_ms DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::DatabaseError)?;

        let mut metrics = Vec::with_capacity(rows.len());
        for row in rows {
            match metric_from_row(&row) {
                Ok(metric) => metrics.push(metric),
                Err(e) => warn!(error = %e, "Skipping unreadable performance metric row"),
            }
        }
        metrics.reverse();

        debug!(count = metrics.len(), "Loaded performance metrics");
        Ok(metrics)
    }

    /// Delete metrics recorded before the cutoff
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM performance_metrics WHERE timestamp_ms < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseError)?;

        let deleted = result.rows_affected();
        info!(deleted = deleted, "Pruned performance metrics");
        Ok(deleted)
    }

    /// Number of stored metrics
    pub async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM performance_metrics")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::DatabaseError)?;

        Ok(row.get::<i64, _>("n") as u64)
    }
}

/// Drain a tracker sink into the store until every sender is dropped
pub fn spawn_writer(
    store: MetricStore,
    mut rx: UnboundedReceiver<PerformanceMetric>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(metric) = rx.recv().await {
            if let Err(e) = store.save_metric(&metric).await {
                warn!(error = %e, "Failed to persist performance metric");
            }
        }
        debug!("Metric writer stopped");
    })
}

fn bind_metric<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    metric: &'q PerformanceMetric,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(metric.provider.as_str())
        .bind(&metric.model)
        .bind(metric.task_type.as_str())
        .bind(metric.latency_ms as i64)
        .bind(metric.input_tokens as i64)
        .bind(metric.output_tokens as i64)
        .bind(metric.cost)
        .bind(metric.success)
        .bind(metric.error_kind.as_deref())
        .bind(metric.user_rating.map(i64::from))
        .bind(metric.timestamp.timestamp_millis())
        .bind(&metric.session_id)
}

fn metric_from_row(row: &SqliteRow) -> Result<PerformanceMetric> {
    let provider: String = row.get("provider");
    let task_type: String = row.get("task_type");
    let timestamp_ms: i64 = row.get("timestamp_ms");

    let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .ok_or_else(|| Error::TrackingFailed(format!("invalid timestamp {timestamp_ms}")))?;

    Ok(PerformanceMetric {
        provider: provider.parse()?,
        model: row.get("model"),
        task_type: task_type.parse().map_err(Error::TrackingFailed)?,
        latency_ms: row.get::<i64, _>("latency_ms").max(0) as u64,
        input_tokens: row.get::<i64, _>("input_tokens").max(0) as u64,
        output_tokens: row.get::<i64, _>("output_tokens").max(0) as u64,
        cost: row.get("cost"),
        success: row.get("success"),
        error_kind: row.get("error_kind"),
        user_rating: row
            .get::<Option<i64>, _>("user_rating")
            .map(|r| r.clamp(1, 5) as u8),
        timestamp,
        session_id: row.get("session_id"),
    })
}
