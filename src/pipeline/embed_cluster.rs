//! Embed-and-Cluster Worker (§4.G): the centrepiece job. Phase 1 embeds the
//! article (idempotently), Phase 2 assigns it to a cluster by online
//! first-fit kNN, Phase 3 best-effort triggers summarisation.
use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info};

use crate::domain::ArticleId;
use crate::pipeline::{downstream_job_ttl_seconds, PipelineDeps};
use crate::queue::{JobPayload, NewQueuedJob};
use crate::util::text::embedding_input;

pub(crate) async fn embed_and_cluster(deps: &PipelineDeps, article_id: ArticleId) -> anyhow::Result<()> {
    let timer = deps.metrics.embed_cluster_duration_seconds.start_timer();
    let result = embed_and_cluster_inner(deps, article_id).await;
    timer.observe_duration();
    result
}

async fn embed_and_cluster_inner(deps: &PipelineDeps, article_id: ArticleId) -> anyhow::Result<()> {
    let Some(article) = deps.article_store.get_article(article_id).await? else {
        debug!(article_id = %article_id, "article missing, skipping embed-and-cluster");
        return Ok(());
    };
    if article.text.trim().is_empty() {
        debug!(article_id = %article_id, "article has empty text, skipping embed-and-cluster");
        return Ok(());
    }

    let space = deps
        .embedding_store
        .get_or_create_space(
            deps.config.embedding_space_name(),
            deps.config.embedding_provider(),
            deps.config.embedding_default_dimension(),
            1,
        )
        .await
        .context("failed to resolve embedding space")?;

    let vector = match deps.embedding_store.get_embedding(space.id, article_id).await? {
        Some(vector) => vector,
        None => {
            let input = embedding_input(article.title.as_deref(), &article.text);
            if input.is_empty() {
                debug!(article_id = %article_id, "empty embedding input, skipping embed-and-cluster");
                return Ok(());
            }

            let vector = deps
                .embedder
                .embed(&input)
                .await
                .context("embedding request failed")?;

            if vector.len() as u32 != space.dimension as u32 {
                deps.embedding_store
                    .update_space_dimension(space.id, vector.len() as u32)
                    .await
                    .context("failed to update embedding space dimension")?;
            }

            deps.embedding_store
                .put_embedding(space.id, article_id, &vector)
                .await
                .context("failed to persist embedding")?;
            vector
        }
    };

    let Some(run) = deps.cluster_state.active_run(space.id).await? else {
        info!(article_id = %article_id, "no active cluster run, embedding only");
        return Ok(());
    };

    let threshold = run.threshold(deps.config.cluster_similarity_threshold());
    let since = Utc::now() - deps.config.cluster_knn_window();
    let neighbours = deps
        .embedding_store
        .knn(space.id, &vector, since, article_id, deps.config.cluster_knn_k())
        .await
        .context("knn query failed")?;

    let mut assigned = None;
    for (neighbour_id, similarity) in neighbours {
        if similarity < threshold {
            continue;
        }
        if let Some(cluster_id) = deps.cluster_state.cluster_of(run.id, neighbour_id).await? {
            assigned = Some((cluster_id, similarity));
            break;
        }
    }

    let (cluster_id, similarity) = match assigned {
        Some(found) => found,
        None => {
            let window = article.created_at;
            let cluster_id = deps
                .cluster_state
                .create_cluster(run.id, window, window)
                .await
                .context("failed to create cluster")?;
            deps.metrics.clusters_created_total.inc();
            (cluster_id, 1.0)
        }
    };

    deps.cluster_state
        .assign(run.id, cluster_id, article_id, similarity)
        .await
        .context("failed to assign article to cluster")?;
    deps.metrics.assignments_created_total.inc();

    info!(article_id = %article_id, cluster_id, similarity, "article assigned to cluster");

    maybe_trigger_summarisation(deps, cluster_id).await
}

async fn maybe_trigger_summarisation(deps: &PipelineDeps, cluster_id: crate::domain::ClusterId) -> anyhow::Result<()> {
    let member_count = deps.cluster_state.member_count(cluster_id).await?;
    if member_count < i64::from(deps.config.summary_trigger_member_count()) {
        return Ok(());
    }
    if deps.summary_store.active_summary(cluster_id).await?.is_some() {
        return Ok(());
    }

    let ttl_seconds = downstream_job_ttl_seconds(&deps.config);
    let max_retries = deps.config.queue_max_retries();
    deps.queue
        .enqueue(NewQueuedJob::new(
            JobPayload::SummariseCluster { cluster_id },
            ttl_seconds,
            max_retries,
        ))
        .await
        .context("failed to enqueue summarise-cluster job")?;

    info!(cluster_id, member_count, "triggered cluster summarisation");
    Ok(())
}
