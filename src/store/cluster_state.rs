//! Active cluster run, clusters, and article-to-cluster assignments (§4.D).
use async_trait::async_trait;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::{ArticleId, Cluster, ClusterId, ClusterRun, ClusterRunId, ClusterRunStatus, EmbeddingSpaceId};

#[async_trait]
pub(crate) trait ClusterState: Send + Sync {
    /// The caller is responsible for handling absence by skipping assignment
    /// (§4.D, §4.G Phase 2 step 1).
    async fn active_run(&self, space_id: EmbeddingSpaceId) -> Result<Option<ClusterRun>>;

    async fn create_cluster(
        &self,
        run_id: ClusterRunId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<ClusterId>;

    /// Idempotent under the composite primary key `(run_id, cluster_id,
    /// article_id)`; a second attempt for the same triple is a no-op.
    async fn assign(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        article_id: ArticleId,
        similarity: f64,
    ) -> Result<()>;

    async fn cluster_of(&self, run_id: ClusterRunId, article_id: ArticleId) -> Result<Option<ClusterId>>;

    async fn member_count(&self, cluster_id: ClusterId) -> Result<i64>;

    /// Clusters created on or after `since`, under `run_id` — the candidate
    /// set for a trend-metrics tick (§4.H).
    async fn clusters_since(&self, run_id: ClusterRunId, since: DateTime<Utc>) -> Result<Vec<Cluster>>;

    /// Count of assignments to `cluster_id` under `run_id` whose article was
    /// created within `[since, now]`; used for velocity/novelty (§4.H).
    async fn assignment_count_since(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        since: DateTime<Utc>,
    ) -> Result<i64>;

    /// Distinct `Article.source_id` among assignments to `cluster_id` under
    /// `run_id` (§4.H unique_sources).
    async fn unique_source_count(&self, run_id: ClusterRunId, cluster_id: ClusterId) -> Result<i64>;

    /// Member articles of `cluster_id`, most recently published first; the
    /// Summarisation Collaborator's input ordering (§4.K).
    async fn member_article_ids(&self, cluster_id: ClusterId) -> Result<Vec<ArticleId>>;
}

#[derive(Debug, Clone)]
pub(crate) struct PgClusterState {
    pool: PgPool,
}

impl PgClusterState {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_run(row: sqlx::postgres::PgRow) -> Result<ClusterRun> {
    let status_str: String = row.try_get("status").context("status")?;
    let status = match status_str.as_str() {
        "running" => ClusterRunStatus::Running,
        "complete" => ClusterRunStatus::Complete,
        "failed" => ClusterRunStatus::Failed,
        other => anyhow::bail!("unknown cluster run status: {other}"),
    };

    Ok(ClusterRun {
        id: row.try_get("id").context("id")?,
        space_id: row.try_get("space_id").context("space_id")?,
        algorithm: row.try_get("algorithm").context("algorithm")?,
        params: row.try_get("params").context("params")?,
        started_at: row.try_get("started_at").context("started_at")?,
        finished_at: row.try_get("finished_at").context("finished_at")?,
        status,
        is_active: row.try_get("is_active").context("is_active")?,
    })
}

fn row_to_cluster(row: sqlx::postgres::PgRow) -> Result<Cluster> {
    Ok(Cluster {
        id: row.try_get("id").context("id")?,
        run_id: row.try_get("run_id").context("run_id")?,
        label: row.try_get("label").context("label")?,
        window_start: row.try_get("window_start").context("window_start")?,
        window_end: row.try_get("window_end").context("window_end")?,
        created_at: row.try_get("created_at").context("created_at")?,
    })
}

#[async_trait]
impl ClusterState for PgClusterState {
    async fn active_run(&self, space_id: EmbeddingSpaceId) -> Result<Option<ClusterRun>> {
        let row = sqlx::query(
            "SELECT * FROM cluster_runs WHERE space_id = $1 AND is_active = true",
        )
        .bind(space_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch active run")?;

        row.map(row_to_run).transpose()
    }

    async fn create_cluster(
        &self,
        run_id: ClusterRunId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<ClusterId> {
        let row = sqlx::query(
            r"
            INSERT INTO clusters (run_id, window_start, window_end, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id
            ",
        )
        .bind(run_id)
        .bind(window_start)
        .bind(window_end)
        .fetch_one(&self.pool)
        .await
        .context("create cluster")?;

        row.try_get("id").context("id")
    }

    async fn assign(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        article_id: ArticleId,
        similarity: f64,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO article_clusters (run_id, cluster_id, article_id, similarity, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (run_id, article_id) DO NOTHING
            ",
        )
        .bind(run_id)
        .bind(cluster_id)
        .bind(article_id)
        .bind(similarity)
        .execute(&self.pool)
        .await
        .context("assign article to cluster")?;
        Ok(())
    }

    async fn cluster_of(&self, run_id: ClusterRunId, article_id: ArticleId) -> Result<Option<ClusterId>> {
        let row = sqlx::query(
            "SELECT cluster_id FROM article_clusters WHERE run_id = $1 AND article_id = $2",
        )
        .bind(run_id)
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch cluster_of")?;

        row.map(|row| row.try_get("cluster_id").context("cluster_id"))
            .transpose()
    }

    async fn member_count(&self, cluster_id: ClusterId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM article_clusters WHERE cluster_id = $1")
            .bind(cluster_id)
            .fetch_one(&self.pool)
            .await
            .context("member count")?;

        row.try_get("count").context("count")
    }

    async fn clusters_since(&self, run_id: ClusterRunId, since: DateTime<Utc>) -> Result<Vec<Cluster>> {
        let rows = sqlx::query("SELECT * FROM clusters WHERE run_id = $1 AND created_at >= $2")
            .bind(run_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .context("clusters since")?;

        rows.into_iter().map(row_to_cluster).collect()
    }

    async fn assignment_count_since(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count
            FROM article_clusters ac
            JOIN articles a ON a.id = ac.article_id
            WHERE ac.run_id = $1 AND ac.cluster_id = $2 AND a.created_at >= $3
            ",
        )
        .bind(run_id)
        .bind(cluster_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("assignment count since")?;

        row.try_get("count").context("count")
    }

    async fn unique_source_count(&self, run_id: ClusterRunId, cluster_id: ClusterId) -> Result<i64> {
        let row = sqlx::query(
            r"
            SELECT COUNT(DISTINCT a.source_id) as count
            FROM article_clusters ac
            JOIN articles a ON a.id = ac.article_id
            WHERE ac.run_id = $1 AND ac.cluster_id = $2
            ",
        )
        .bind(run_id)
        .bind(cluster_id)
        .fetch_one(&self.pool)
        .await
        .context("unique source count")?;

        row.try_get("count").context("count")
    }

    async fn member_article_ids(&self, cluster_id: ClusterId) -> Result<Vec<ArticleId>> {
        let rows = sqlx::query(
            r"
            SELECT ac.article_id
            FROM article_clusters ac
            JOIN articles a ON a.id = ac.article_id
            WHERE ac.cluster_id = $1
            ORDER BY a.published_at DESC NULLS LAST, a.created_at DESC
            ",
        )
        .bind(cluster_id)
        .fetch_all(&self.pool)
        .await
        .context("member article ids")?;

        rows.into_iter()
            .map(|row| row.try_get("article_id").context("article_id"))
            .collect()
    }
}
