//! In-memory `JobEnqueuer` test double used by pipeline stage tests.
#![cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;
use anyhow::Result;

use super::{JobEnqueuer, JobPayload, NewQueuedJob, QueuedJobId};

#[derive(Default)]
pub(crate) struct MockJobEnqueuer {
    enqueued: Mutex<Vec<JobPayload>>,
}

impl MockJobEnqueuer {
    /// Returns and clears everything enqueued so far.
    pub(crate) fn drain(&self) -> Vec<JobPayload> {
        std::mem::take(&mut self.enqueued.lock().unwrap())
    }
}

#[async_trait]
impl JobEnqueuer for MockJobEnqueuer {
    async fn enqueue(&self, job: NewQueuedJob) -> Result<QueuedJobId> {
        self.enqueued.lock().unwrap().push(job.payload);
        Ok(0)
    }
}
