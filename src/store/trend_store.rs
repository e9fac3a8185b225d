//! Trend-metric and event persistence backing the Trend Metrics Worker and
//! Event Detector (§4.H, §4.I).
use async_trait::async_trait;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::{ClusterId, ClusterRunId, Event, EventSeverity, TrendMetric};

#[async_trait]
pub(crate) trait TrendStore: Send + Sync {
    /// Append-only; one row per cluster per tick (§4.H).
    async fn append_metric(&self, metric: &TrendMetric) -> Result<()>;

    /// Most recent TrendMetric for `(cluster_id, run_id)` with
    /// `since <= ts < before`, used to compute acceleration (§4.H).
    async fn previous_metric(
        &self,
        cluster_id: ClusterId,
        run_id: ClusterRunId,
        since: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Option<TrendMetric>>;

    /// Most recent metric per cluster with `ts >= since`, the Event Detector's
    /// input window (§4.I).
    async fn latest_metrics_since(&self, since: DateTime<Utc>) -> Result<Vec<TrendMetric>>;

    /// Whether a cooldown-blocking Event already exists for `cluster_id`
    /// (`detected_at >= since`) (§4.I).
    async fn recent_event(&self, cluster_id: ClusterId, since: DateTime<Utc>) -> Result<Option<Event>>;

    #[allow(clippy::too_many_arguments)]
    async fn insert_event(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        score: f64,
        severity: EventSeverity,
        label: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Event>;
}

#[derive(Debug, Clone)]
pub(crate) struct PgTrendStore {
    pool: PgPool,
}

impl PgTrendStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_metric(row: sqlx::postgres::PgRow) -> Result<TrendMetric> {
    Ok(TrendMetric {
        ts: row.try_get("ts").context("ts")?,
        cluster_id: row.try_get("cluster_id").context("cluster_id")?,
        run_id: row.try_get("run_id").context("run_id")?,
        doc_count: row.try_get("doc_count").context("doc_count")?,
        unique_sources: row.try_get("unique_sources").context("unique_sources")?,
        velocity: row.try_get("velocity").context("velocity")?,
        acceleration: row.try_get("acceleration").context("acceleration")?,
        novelty: row.try_get("novelty").context("novelty")?,
        locality: row.try_get("locality").context("locality")?,
    })
}

fn severity_from_str(s: &str) -> Result<EventSeverity> {
    Ok(match s {
        "low" => EventSeverity::Low,
        "medium" => EventSeverity::Medium,
        "high" => EventSeverity::High,
        "critical" => EventSeverity::Critical,
        other => anyhow::bail!("unknown event severity: {other}"),
    })
}

fn row_to_event(row: sqlx::postgres::PgRow) -> Result<Event> {
    let severity_str: String = row.try_get("severity").context("severity")?;
    Ok(Event {
        id: row.try_get("id").context("id")?,
        run_id: row.try_get("run_id").context("run_id")?,
        cluster_id: row.try_get("cluster_id").context("cluster_id")?,
        detected_at: row.try_get("detected_at").context("detected_at")?,
        score: row.try_get("score").context("score")?,
        severity: severity_from_str(&severity_str)?,
        label: row.try_get("label").context("label")?,
        window_start: row.try_get("window_start").context("window_start")?,
        window_end: row.try_get("window_end").context("window_end")?,
    })
}

#[async_trait]
impl TrendStore for PgTrendStore {
    async fn append_metric(&self, metric: &TrendMetric) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO trend_metrics
                (ts, cluster_id, run_id, doc_count, unique_sources, velocity,
                 acceleration, novelty, locality)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(metric.ts)
        .bind(metric.cluster_id)
        .bind(metric.run_id)
        .bind(metric.doc_count)
        .bind(metric.unique_sources)
        .bind(metric.velocity)
        .bind(metric.acceleration)
        .bind(metric.novelty)
        .bind(metric.locality)
        .execute(&self.pool)
        .await
        .context("append trend metric")?;
        Ok(())
    }

    async fn previous_metric(
        &self,
        cluster_id: ClusterId,
        run_id: ClusterRunId,
        since: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Option<TrendMetric>> {
        let row = sqlx::query(
            r"
            SELECT * FROM trend_metrics
            WHERE cluster_id = $1 AND run_id = $2 AND ts >= $3 AND ts < $4
            ORDER BY ts DESC
            LIMIT 1
            ",
        )
        .bind(cluster_id)
        .bind(run_id)
        .bind(since)
        .bind(before)
        .fetch_optional(&self.pool)
        .await
        .context("previous trend metric")?;

        row.map(row_to_metric).transpose()
    }

    async fn latest_metrics_since(&self, since: DateTime<Utc>) -> Result<Vec<TrendMetric>> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT ON (cluster_id) *
            FROM trend_metrics
            WHERE ts >= $1
            ORDER BY cluster_id, ts DESC
            ",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("latest metrics since")?;

        rows.into_iter().map(row_to_metric).collect()
    }

    async fn recent_event(&self, cluster_id: ClusterId, since: DateTime<Utc>) -> Result<Option<Event>> {
        let row = sqlx::query(
            r"
            SELECT * FROM events
            WHERE cluster_id = $1 AND detected_at >= $2
            ORDER BY detected_at DESC
            LIMIT 1
            ",
        )
        .bind(cluster_id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .context("recent event")?;

        row.map(row_to_event).transpose()
    }

    async fn insert_event(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        score: f64,
        severity: EventSeverity,
        label: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Event> {
        let row = sqlx::query(
            r"
            INSERT INTO events
                (run_id, cluster_id, detected_at, score, severity, label, window_start, window_end)
            VALUES ($1, $2, NOW(), $3, $4, $5, $6, $7)
            RETURNING *
            ",
        )
        .bind(run_id)
        .bind(cluster_id)
        .bind(score)
        .bind(severity.as_str())
        .bind(label)
        .bind(window_start)
        .bind(window_end)
        .fetch_one(&self.pool)
        .await
        .context("insert event")?;

        row_to_event(row)
    }
}
