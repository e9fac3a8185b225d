//! In-memory test doubles for the store traits.
#![cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::article_store::ArticleStore;
use super::cluster_state::ClusterState;
use super::embedding_store::EmbeddingStore;
use super::source_store::SourceStore;
use super::summary_store::SummaryStore;
use super::trend_store::TrendStore;
use crate::domain::{
    Article, ArticleId, Cluster, ClusterId, ClusterRun, ClusterRunId, ClusterRunStatus,
    ClusterSummary, EmbeddingSpace, EmbeddingSpaceId, Event, EventSeverity, InsertArticleOutcome,
    Source, SourceId, TrendMetric,
};
use crate::fingerprint::is_near_duplicate;
use crate::util::vector::cosine_similarity;

#[derive(Default)]
pub(crate) struct MockArticleStore {
    articles: Mutex<Vec<Article>>,
}

#[async_trait]
impl ArticleStore for MockArticleStore {
    async fn insert_article(
        &self,
        source_id: SourceId,
        url: &str,
        canonical_url: Option<&str>,
        title: Option<&str>,
        author: Option<&str>,
        language: Option<&str>,
        published_at: Option<DateTime<Utc>>,
        text: &str,
        content_hash: i64,
        simhash: i64,
        quality_score: Option<f64>,
    ) -> Result<InsertArticleOutcome> {
        let mut articles = self.articles.lock().unwrap();

        if let Some(existing) = articles.iter().find(|a| a.url == url) {
            return Ok(InsertArticleOutcome::DuplicateOf(existing.id));
        }

        if let Some(existing) = articles
            .iter()
            .find(|a| a.source_id == source_id && is_near_duplicate(a.simhash, simhash))
        {
            return Ok(InsertArticleOutcome::DuplicateOf(existing.id));
        }

        let article = Article {
            id: Uuid::now_v7(),
            source_id,
            url: url.to_string(),
            canonical_url: canonical_url.map(str::to_string),
            title: title.map(str::to_string),
            author: author.map(str::to_string),
            language: language.map(str::to_string),
            published_at,
            text: text.to_string(),
            content_hash,
            simhash,
            quality_score,
            created_at: Utc::now(),
        };
        let id = article.id;
        articles.push(article);
        Ok(InsertArticleOutcome::Inserted(id))
    }

    async fn list_source_simhashes(&self, source_id: SourceId) -> Result<Vec<(ArticleId, i64)>> {
        Ok(self
            .articles
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.source_id == source_id)
            .map(|a| (a.id, a.simhash))
            .collect())
    }

    async fn get_article(&self, article_id: ArticleId) -> Result<Option<Article>> {
        Ok(self
            .articles
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == article_id)
            .cloned())
    }
}

struct StoredEmbedding {
    space_id: EmbeddingSpaceId,
    article_id: ArticleId,
    vector: Vec<f32>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct MockEmbeddingStore {
    spaces: Mutex<Vec<EmbeddingSpace>>,
    embeddings: Mutex<Vec<StoredEmbedding>>,
}

#[async_trait]
impl EmbeddingStore for MockEmbeddingStore {
    async fn get_or_create_space(
        &self,
        name: &str,
        provider: &str,
        dimension: u32,
        version: i32,
    ) -> Result<EmbeddingSpace> {
        let mut spaces = self.spaces.lock().unwrap();
        if let Some(existing) = spaces.iter().find(|s| s.name == name && s.version == version) {
            return Ok(existing.clone());
        }
        let space = EmbeddingSpace {
            id: spaces.len() as i32 + 1,
            name: name.to_string(),
            provider: provider.to_string(),
            dimension: dimension as i32,
            version,
        };
        spaces.push(space.clone());
        Ok(space)
    }

    async fn update_space_dimension(&self, space_id: EmbeddingSpaceId, dimension: u32) -> Result<()> {
        let mut spaces = self.spaces.lock().unwrap();
        if let Some(space) = spaces.iter_mut().find(|s| s.id == space_id) {
            space.dimension = dimension as i32;
        }
        Ok(())
    }

    async fn get_embedding(
        &self,
        space_id: EmbeddingSpaceId,
        article_id: ArticleId,
    ) -> Result<Option<Vec<f32>>> {
        Ok(self
            .embeddings
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.space_id == space_id && e.article_id == article_id)
            .map(|e| e.vector.clone()))
    }

    async fn put_embedding(
        &self,
        space_id: EmbeddingSpaceId,
        article_id: ArticleId,
        vector: &[f32],
    ) -> Result<()> {
        let mut embeddings = self.embeddings.lock().unwrap();
        if embeddings
            .iter()
            .any(|e| e.space_id == space_id && e.article_id == article_id)
        {
            return Ok(());
        }
        embeddings.push(StoredEmbedding {
            space_id,
            article_id,
            vector: vector.to_vec(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn knn(
        &self,
        space_id: EmbeddingSpaceId,
        vector: &[f32],
        since: DateTime<Utc>,
        exclude_article_id: ArticleId,
        k: u32,
    ) -> Result<Vec<(ArticleId, f64)>> {
        let embeddings = self.embeddings.lock().unwrap();
        let mut candidates: Vec<(ArticleId, f64)> = embeddings
            .iter()
            .filter(|e| {
                e.space_id == space_id && e.article_id != exclude_article_id && e.created_at >= since
            })
            .map(|e| (e.article_id, f64::from(cosine_similarity(vector, &e.vector))))
            .collect();

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(k as usize);
        Ok(candidates)
    }
}

#[derive(Default)]
pub(crate) struct MockClusterState {
    runs: Mutex<Vec<ClusterRun>>,
    clusters: Mutex<Vec<Cluster>>,
    assignments: Mutex<Vec<(ClusterRunId, ClusterId, ArticleId, f64, DateTime<Utc>, SourceId)>>,
    next_cluster_id: Mutex<ClusterId>,
}

impl MockClusterState {
    pub(crate) fn with_active_run(run: ClusterRun) -> Self {
        let state = Self {
            next_cluster_id: Mutex::new(1),
            ..Self::default()
        };
        state.runs.lock().unwrap().push(run);
        state
    }

    pub(crate) fn assign_with_source(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        article_id: ArticleId,
        similarity: f64,
        source_id: SourceId,
    ) {
        self.assignments.lock().unwrap().push((
            run_id,
            cluster_id,
            article_id,
            similarity,
            Utc::now(),
            source_id,
        ));
    }
}

#[async_trait]
impl ClusterState for MockClusterState {
    async fn active_run(&self, space_id: EmbeddingSpaceId) -> Result<Option<ClusterRun>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.space_id == space_id && r.is_active)
            .cloned())
    }

    async fn create_cluster(
        &self,
        run_id: ClusterRunId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<ClusterId> {
        let mut next_id = self.next_cluster_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        self.clusters.lock().unwrap().push(Cluster {
            id,
            run_id,
            label: None,
            window_start,
            window_end,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn assign(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        article_id: ArticleId,
        similarity: f64,
    ) -> Result<()> {
        let mut assignments = self.assignments.lock().unwrap();
        if assignments
            .iter()
            .any(|(r, _, a, _, _, _)| *r == run_id && *a == article_id)
        {
            return Ok(());
        }
        assignments.push((run_id, cluster_id, article_id, similarity, Utc::now(), Uuid::nil()));
        Ok(())
    }

    async fn cluster_of(&self, run_id: ClusterRunId, article_id: ArticleId) -> Result<Option<ClusterId>> {
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .iter()
            .find(|(r, _, a, _, _, _)| *r == run_id && *a == article_id)
            .map(|(_, c, _, _, _, _)| *c))
    }

    async fn member_count(&self, cluster_id: ClusterId) -> Result<i64> {
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c, _, _, _, _)| *c == cluster_id)
            .count() as i64)
    }

    async fn clusters_since(&self, run_id: ClusterRunId, since: DateTime<Utc>) -> Result<Vec<Cluster>> {
        Ok(self
            .clusters
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.run_id == run_id && c.created_at >= since)
            .cloned()
            .collect())
    }

    async fn assignment_count_since(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, c, _, _, ts, _)| *r == run_id && *c == cluster_id && *ts >= since)
            .count() as i64)
    }

    async fn member_article_ids(&self, cluster_id: ClusterId) -> Result<Vec<ArticleId>> {
        let mut members: Vec<(DateTime<Utc>, ArticleId)> = self
            .assignments
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c, _, _, _, _)| *c == cluster_id)
            .map(|(_, _, article_id, _, created_at, _)| (*created_at, *article_id))
            .collect();
        members.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(members.into_iter().map(|(_, article_id)| article_id).collect())
    }

    async fn unique_source_count(&self, run_id: ClusterRunId, cluster_id: ClusterId) -> Result<i64> {
        let assignments = self.assignments.lock().unwrap();
        let mut sources: Vec<SourceId> = assignments
            .iter()
            .filter(|(r, c, _, _, _, _)| *r == run_id && *c == cluster_id)
            .map(|(_, _, _, _, _, s)| *s)
            .collect();
        sources.sort();
        sources.dedup();
        Ok(sources.len() as i64)
    }
}

#[derive(Default)]
pub(crate) struct MockTrendStore {
    metrics: Mutex<Vec<TrendMetric>>,
    events: Mutex<Vec<Event>>,
    next_event_id: Mutex<i32>,
}

#[async_trait]
impl TrendStore for MockTrendStore {
    async fn append_metric(&self, metric: &TrendMetric) -> Result<()> {
        self.metrics.lock().unwrap().push(metric.clone());
        Ok(())
    }

    async fn previous_metric(
        &self,
        cluster_id: ClusterId,
        run_id: ClusterRunId,
        since: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Option<TrendMetric>> {
        Ok(self
            .metrics
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.cluster_id == cluster_id && m.run_id == run_id && m.ts >= since && m.ts < before
            })
            .max_by_key(|m| m.ts)
            .cloned())
    }

    async fn latest_metrics_since(&self, since: DateTime<Utc>) -> Result<Vec<TrendMetric>> {
        let metrics = self.metrics.lock().unwrap();
        let mut by_cluster: std::collections::HashMap<ClusterId, TrendMetric> =
            std::collections::HashMap::new();
        for metric in metrics.iter().filter(|m| m.ts >= since) {
            by_cluster
                .entry(metric.cluster_id)
                .and_modify(|existing| {
                    if metric.ts > existing.ts {
                        *existing = metric.clone();
                    }
                })
                .or_insert_with(|| metric.clone());
        }
        Ok(by_cluster.into_values().collect())
    }

    async fn recent_event(&self, cluster_id: ClusterId, since: DateTime<Utc>) -> Result<Option<Event>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.cluster_id == cluster_id && e.detected_at >= since)
            .cloned())
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
        let mut next_id = self.next_event_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;

        let event = Event {
            id,
            run_id,
            cluster_id,
            detected_at: Utc::now(),
            score,
            severity,
            label: label.to_string(),
            window_start,
            window_end,
        };
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }
}

#[derive(Default)]
pub(crate) struct MockSummaryStore {
    summaries: Mutex<Vec<ClusterSummary>>,
}

#[async_trait]
impl SummaryStore for MockSummaryStore {
    async fn active_summary(&self, cluster_id: ClusterId) -> Result<Option<ClusterSummary>> {
        Ok(self
            .summaries
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.cluster_id == cluster_id && s.is_active)
            .cloned())
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
        let mut summaries = self.summaries.lock().unwrap();
        let next_version = summaries
            .iter()
            .filter(|s| s.cluster_id == cluster_id)
            .map(|s| s.version)
            .max()
            .unwrap_or(0)
            + 1;

        for existing in summaries.iter_mut().filter(|s| s.cluster_id == cluster_id) {
            existing.is_active = false;
        }

        let summary = ClusterSummary {
            cluster_id,
            version: next_version,
            is_active: true,
            language: language.to_string(),
            summary_md: summary_md.to_string(),
            bias_md: bias_md.to_string(),
            timeline_md: timeline_md.to_string(),
            model_name: model_name.to_string(),
            generated_at: Utc::now(),
        };
        summaries.push(summary.clone());
        Ok(summary)
    }
}

#[derive(Default)]
pub(crate) struct MockSourceStore {
    sources: Mutex<Vec<Source>>,
}

impl MockSourceStore {
    pub(crate) fn with_sources(sources: Vec<Source>) -> Self {
        Self {
            sources: Mutex::new(sources),
        }
    }
}

#[async_trait]
impl SourceStore for MockSourceStore {
    async fn active_sources(&self) -> Result<Vec<Source>> {
        Ok(self
            .sources
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s.status, crate::domain::SourceStatus::Active))
            .cloned()
            .collect())
    }

    async fn get_source(&self, source_id: SourceId) -> Result<Option<Source>> {
        Ok(self
            .sources
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == source_id)
            .cloned())
    }

    async fn record_fetch_result(&self, source_id: SourceId, succeeded: bool) -> Result<()> {
        let mut sources = self.sources.lock().unwrap();
        if let Some(source) = sources.iter_mut().find(|s| s.id == source_id) {
            source.last_fetched_at = Some(Utc::now());
            let delta = if succeeded { 0.0 } else { 1.0 };
            source.error_rate = source.error_rate * 0.95 + delta * 0.05;
        }
        Ok(())
    }
}

#[allow(dead_code)]
pub(crate) fn running_active_run(space_id: EmbeddingSpaceId, threshold: f64) -> ClusterRun {
    ClusterRun {
        id: 1,
        space_id,
        algorithm: "online-first-fit".to_string(),
        params: serde_json::json!({ "threshold": threshold }),
        started_at: Utc::now(),
        finished_at: None,
        status: ClusterRunStatus::Running,
        is_active: true,
    }
}
