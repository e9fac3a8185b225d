//! Trend tick (§4.H, §4.I, §5): every `trend_tick_interval`, scores active
//! clusters and raises Events. Run in-process rather than via the job
//! queue — there is no downstream fan-out, just a bounded unit of work —
//! so `trend_job_ttl` is applied as the tick's own `tokio::time::timeout`
//! deadline instead of a queue row TTL.
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::trend::TrendEngine;

pub(crate) fn spawn(
    engine: Arc<TrendEngine>,
    tick_interval: Duration,
    tick_deadline: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick_interval);
        loop {
            ticker.tick().await;
            match tokio::time::timeout(tick_deadline, engine.tick()).await {
                Ok(Ok(outcome)) => {
                    tracing::debug!(?outcome, "trend tick complete");
                }
                Ok(Err(error)) => error!(%error, "trend tick failed"),
                Err(_) => warn!(deadline_secs = tick_deadline.as_secs(), "trend tick exceeded its deadline"),
            }
        }
    })
}
