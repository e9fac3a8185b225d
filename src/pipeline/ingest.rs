//! Ingestion Dispatcher job body (§4.E): downloads one source's feed and
//! fans out a Article Processor job per entry with a non-empty link.
use anyhow::Context;
use tracing::{info, warn};

use crate::domain::SourceId;
use crate::pipeline::PipelineDeps;
use crate::queue::{JobPayload, NewQueuedJob};

pub(crate) async fn fetch_source(deps: &PipelineDeps, source_id: SourceId, url: &str) -> anyhow::Result<()> {
    let entries = match deps.feed_fetcher.fetch(url).await {
        Ok(entries) => {
            let _ = deps.source_store.record_fetch_result(source_id, true).await;
            entries
        }
        Err(error) => {
            let _ = deps.source_store.record_fetch_result(source_id, false).await;
            // Best-effort bookkeeping only; the next ingest tick re-submits
            // this source regardless, so the job is dropped rather than
            // retried by the queue (§5, "report failure and return").
            warn!(source_id = %source_id, url, %error, "feed fetch failed, dropping job");
            return Ok(());
        }
    };

    let ttl_seconds = deps.config.ingest_job_ttl().as_secs() as i64;
    let max_retries = deps.config.queue_max_retries();

    let mut submitted = 0usize;
    for entry in entries {
        if entry.link.trim().is_empty() {
            continue;
        }
        let payload = JobPayload::ProcessArticle {
            source_id,
            url: entry.link,
        };
        deps.queue
            .enqueue(NewQueuedJob::new(payload, ttl_seconds, max_retries))
            .await
            .context("failed to enqueue process-article job")?;
        deps.metrics.articles_fetched_total.inc();
        submitted += 1;
    }

    info!(source_id = %source_id, submitted, "fetched source feed");
    Ok(())
}
