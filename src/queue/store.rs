use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};

use super::types::{JobPayload, NewQueuedJob, QueuedJob, QueuedJobId};

#[derive(Debug, Clone)]
pub(crate) struct QueueStore {
    pool: PgPool,
}

impl QueueStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) async fn enqueue(&self, job: NewQueuedJob) -> Result<QueuedJobId> {
        let payload_json =
            serde_json::to_value(&job.payload).context("failed to serialize job payload")?;

        let row = sqlx::query(
            r"
            INSERT INTO job_queue (kind, payload, status, max_retries, expires_at)
            VALUES ($1, $2, 'pending', $3, NOW() + make_interval(secs => $4))
            RETURNING id
            ",
        )
        .bind(job.payload.kind().as_str())
        .bind(payload_json)
        .bind(job.max_retries)
        .bind(job.ttl_seconds as f64)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert queued job")?;

        let id: QueuedJobId = row.try_get("id").context("failed to get job id")?;
        Ok(id)
    }

    /// Claims the oldest eligible pending job, skipping rows locked by
    /// another worker and rows whose deadline has already passed.
    pub(crate) async fn claim_next(&self) -> Result<Option<QueuedJob>> {
        let mut tx = self.pool.begin().await.context("failed to start claim transaction")?;

        let row = sqlx::query(
            r"
            SELECT id, kind, payload, retry_count, max_retries, expires_at
            FROM job_queue
            WHERE status = 'pending'
              AND expires_at > NOW()
            ORDER BY created_at ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            ",
        )
        .fetch_optional(&mut *tx)
        .await
        .context("failed to claim next job")?;

        let Some(row) = row else {
            tx.rollback().await.context("failed to rollback empty claim")?;
            return Ok(None);
        };

        let job = Self::row_to_job(row)?;

        sqlx::query("UPDATE job_queue SET status = 'running', started_at = NOW() WHERE id = $1")
            .bind(job.id)
            .execute(&mut *tx)
            .await
            .context("failed to mark job as running")?;

        tx.commit().await.context("failed to commit job claim")?;

        Ok(Some(job))
    }

    pub(crate) async fn mark_completed(&self, job_id: QueuedJobId) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue SET status = 'completed', completed_at = NOW() WHERE id = $1",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .context("failed to mark job as completed")?;

        Ok(())
    }

    /// Re-queues a job for retry with the given backoff delay, or marks it
    /// permanently failed once `max_retries` is exhausted.
    pub(crate) async fn mark_failed(
        &self,
        job: &QueuedJob,
        error: &str,
        backoff: std::time::Duration,
    ) -> Result<bool> {
        let will_retry = job.retry_count < job.max_retries;

        if will_retry {
            sqlx::query(
                r"
                UPDATE job_queue
                SET status = 'pending',
                    retry_count = retry_count + 1,
                    error_message = $2,
                    created_at = NOW() + make_interval(secs => $3)
                WHERE id = $1
                ",
            )
            .bind(job.id)
            .bind(error)
            .bind(backoff.as_secs_f64())
            .execute(&self.pool)
            .await
            .context("failed to requeue job for retry")?;
        } else {
            sqlx::query(
                r"
                UPDATE job_queue
                SET status = 'failed', error_message = $2, completed_at = NOW()
                WHERE id = $1
                ",
            )
            .bind(job.id)
            .bind(error)
            .execute(&self.pool)
            .await
            .context("failed to mark job as permanently failed")?;
        }

        Ok(will_retry)
    }

    /// Drops jobs that never started before their TTL elapsed (ingest jobs
    /// that miss their window are simply re-submitted on the next tick).
    pub(crate) async fn reap_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE job_queue
            SET status = 'expired', completed_at = NOW()
            WHERE status = 'pending' AND expires_at <= NOW()
            ",
        )
        .execute(&self.pool)
        .await
        .context("failed to reap expired jobs")?;

        Ok(result.rows_affected())
    }

    fn row_to_job(row: sqlx::postgres::PgRow) -> Result<QueuedJob> {
        let id: QueuedJobId = row.try_get("id").context("failed to get id")?;
        let payload_json: Value = row.try_get("payload").context("failed to get payload")?;
        let retry_count: i32 = row
            .try_get("retry_count")
            .context("failed to get retry_count")?;
        let max_retries: i32 = row
            .try_get("max_retries")
            .context("failed to get max_retries")?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .context("failed to get expires_at")?;

        let payload: JobPayload =
            serde_json::from_value(payload_json).context("failed to deserialize job payload")?;

        Ok(QueuedJob {
            id,
            payload,
            retry_count,
            max_retries,
            expires_at,
        })
    }
}
