//! SummariseCluster job body (§4.K): builds the ordered article view the
//! summariser collaborator expects and publishes the resulting draft.
use anyhow::Context;
use tracing::{debug, info};

use crate::clients::ArticleRef;
use crate::domain::ClusterId;
use crate::pipeline::PipelineDeps;

pub(crate) async fn summarise_cluster(deps: &PipelineDeps, cluster_id: ClusterId) -> anyhow::Result<()> {
    let member_ids = deps
        .cluster_state
        .member_article_ids(cluster_id)
        .await
        .context("failed to list cluster members")?;

    if member_ids.is_empty() {
        debug!(cluster_id, "cluster has no members, skipping summarisation");
        return Ok(());
    }

    let mut articles = Vec::with_capacity(member_ids.len());
    for article_id in member_ids {
        let Some(article) = deps.article_store.get_article(article_id).await? else {
            continue;
        };
        let source_name = deps
            .source_store
            .get_source(article.source_id)
            .await?
            .map_or_else(|| "unknown".to_string(), |source| source.name);

        articles.push(ArticleRef {
            title: article.title,
            text: article.text,
            published_at: article.published_at,
            source_name,
        });
    }

    if articles.is_empty() {
        debug!(cluster_id, "no resolvable member articles, skipping summarisation");
        return Ok(());
    }

    let draft = deps
        .summariser
        .summarise(&articles)
        .await
        .context("summarisation request failed")?;

    deps.summary_store
        .publish_summary(
            cluster_id,
            &draft.language,
            &draft.summary_md,
            &draft.bias_md,
            &draft.timeline_md,
            &draft.model_name,
        )
        .await
        .context("failed to publish cluster summary")?;

    info!(cluster_id, articles = articles.len(), "cluster summary published");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::clients::mock::{MockArticleExtractor, MockEmbedder, MockFeedFetcher, MockSummariser};
    use crate::clients::{LoggingSearchSink, SummaryDraft};
    use crate::domain::{InsertArticleOutcome, Source, SourceKind, SourceScope, SourceStatus, TrustTier};
    use crate::pipeline::test_support::test_deps;
    use crate::store::mock::{running_active_run, MockClusterState, MockSourceStore};

    fn sample_source(id: Uuid) -> Source {
        Source {
            id,
            url: "https://example.com/feed.xml".to_string(),
            name: "Example Wire".to_string(),
            kind: SourceKind::Feed,
            country: None,
            default_language: None,
            trust_tier: TrustTier::A,
            scope: SourceScope::National,
            status: SourceStatus::Active,
            last_fetched_at: None,
            error_rate: 0.0,
        }
    }

    fn deps_with_draft() -> (PipelineDeps, Arc<crate::queue::mock::MockJobEnqueuer>) {
        let source = sample_source(Uuid::now_v7());
        let source_store = Arc::new(MockSourceStore::with_sources(vec![source]));
        test_deps(
            Arc::new(MockFeedFetcher::default()),
            Arc::new(MockArticleExtractor::default()),
            Arc::new(MockEmbedder::default()),
            Arc::new(MockSummariser {
                draft: Some(SummaryDraft {
                    language: "en".to_string(),
                    summary_md: "Summary.".to_string(),
                    bias_md: "Balanced.".to_string(),
                    timeline_md: "- day one".to_string(),
                    model_name: "test-model".to_string(),
                }),
            }),
            Arc::new(LoggingSearchSink),
            source_store,
        )
    }

    #[tokio::test]
    async fn cluster_with_no_members_is_a_no_op() {
        let (deps, _queue_probe) = deps_with_draft();
        summarise_cluster(&deps, 1).await.expect("no-op succeeds");
        assert!(deps.summary_store.active_summary(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn publishes_a_summary_for_a_populated_cluster() {
        let (deps, _queue_probe) = deps_with_draft();
        let run = running_active_run(1, 0.80);
        let cluster_state = Arc::new(MockClusterState::with_active_run(run.clone()));
        let cluster_id = cluster_state
            .create_cluster(run.id, Utc::now(), Utc::now())
            .await
            .expect("create cluster");

        let source_id = *deps
            .source_store
            .active_sources()
            .await
            .expect("active sources")
            .first()
            .map(|s| &s.id)
            .expect("seeded source");

        let article_id = match deps
            .article_store
            .insert_article(
                source_id,
                "https://example.com/a",
                None,
                Some("Headline"),
                None,
                None,
                Some(Utc::now()),
                "Body text.",
                1,
                2,
                None,
            )
            .await
            .expect("insert article")
        {
            InsertArticleOutcome::Inserted(id) => id,
            InsertArticleOutcome::DuplicateOf(id) => id,
        };
        cluster_state
            .assign(run.id, cluster_id, article_id, 0.9)
            .await
            .expect("assign succeeds");

        let mut deps = deps;
        deps.cluster_state = cluster_state;

        summarise_cluster(&deps, cluster_id).await.expect("summarise succeeds");

        let summary = deps
            .summary_store
            .active_summary(cluster_id)
            .await
            .expect("lookup succeeds")
            .expect("summary published");
        assert_eq!(summary.summary_md, "Summary.");
        assert_eq!(summary.version, 1);
    }
}
