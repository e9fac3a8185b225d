//! Cluster summary persistence: versioned LLM output with an active-summary
//! swap invariant (§4.K).
use async_trait::async_trait;
use anyhow::{Context, Result};
use sqlx::{PgPool, Row};

use crate::domain::{ClusterId, ClusterSummary};

#[async_trait]
pub(crate) trait SummaryStore: Send + Sync {
    async fn active_summary(&self, cluster_id: ClusterId) -> Result<Option<ClusterSummary>>;

    /// Assigns `version = max(existing) + 1`, sets `is_active = true` on the
    /// new row, and `is_active = false` on every other row of the cluster,
    /// atomically (§4.K persistence contract).
    #[allow(clippy::too_many_arguments)]
    async fn publish_summary(
        &self,
        cluster_id: ClusterId,
        language: &str,
        summary_md: &str,
        bias_md: &str,
        timeline_md: &str,
        model_name: &str,
    ) -> Result<ClusterSummary>;
}

#[derive(Debug, Clone)]
pub(crate) struct PgSummaryStore {
    pool: PgPool,
}

impl PgSummaryStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_summary(row: sqlx::postgres::PgRow) -> Result<ClusterSummary> {
    Ok(ClusterSummary {
        cluster_id: row.try_get("cluster_id").context("cluster_id")?,
        version: row.try_get("version").context("version")?,
        is_active: row.try_get("is_active").context("is_active")?,
        language: row.try_get("language").context("language")?,
        summary_md: row.try_get("summary_md").context("summary_md")?,
        bias_md: row.try_get("bias_md").context("bias_md")?,
        timeline_md: row.try_get("timeline_md").context("timeline_md")?,
        model_name: row.try_get("model_name").context("model_name")?,
        generated_at: row.try_get("generated_at").context("generated_at")?,
    })
}

#[async_trait]
impl SummaryStore for PgSummaryStore {
    async fn active_summary(&self, cluster_id: ClusterId) -> Result<Option<ClusterSummary>> {
        let row = sqlx::query(
            "SELECT * FROM cluster_summaries WHERE cluster_id = $1 AND is_active = true",
        )
        .bind(cluster_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch active summary")?;

        row.map(row_to_summary).transpose()
    }

    async fn publish_summary(
        &self,
        cluster_id: ClusterId,
        language: &str,
        summary_md: &str,
        bias_md: &str,
        timeline_md: &str,
        model_name: &str,
    ) -> Result<ClusterSummary> {
        let mut tx = self.pool.begin().await.context("begin summary publish tx")?;

        let next_version: i32 = sqlx::query(
            "SELECT COALESCE(MAX(version), 0) + 1 AS next FROM cluster_summaries WHERE cluster_id = $1",
        )
        .bind(cluster_id)
        .fetch_one(&mut *tx)
        .await
        .context("compute next summary version")?
        .try_get("next")
        .context("next")?;

        sqlx::query("UPDATE cluster_summaries SET is_active = false WHERE cluster_id = $1")
            .bind(cluster_id)
            .execute(&mut *tx)
            .await
            .context("deactivate prior summaries")?;

        let row = sqlx::query(
            r"
            INSERT INTO cluster_summaries
                (cluster_id, version, is_active, language, summary_md, bias_md, timeline_md,
                 model_name, generated_at)
            VALUES ($1, $2, true, $3, $4, $5, $6, $7, NOW())
            RETURNING *
            ",
        )
        .bind(cluster_id)
        .bind(next_version)
        .bind(language)
        .bind(summary_md)
        .bind(bias_md)
        .bind(timeline_md)
        .bind(model_name)
        .fetch_one(&mut *tx)
        .await
        .context("insert new active summary")?;

        let summary = row_to_summary(row)?;
        tx.commit().await.context("commit summary publish tx")?;
        Ok(summary)
    }
}
