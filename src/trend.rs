//! Trend Metrics Worker and Event Detector (§4.H, §4.I): the periodic tick
//! that scores every active cluster and raises anomaly Events onto the
//! broadcaster's `"events"` topic.
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::broadcast::EventBroadcaster;
use crate::domain::{ClusterId, ClusterRunId, EmbeddingSpaceId, EventMessage, EventSeverity, TrendMetric};
use crate::observability::metrics::Metrics;
use crate::store::{ClusterState, TrendStore};

fn chrono_duration(std: StdDuration) -> Duration {
    Duration::from_std(std).unwrap_or_else(|_| Duration::zero())
}

/// One tick's outcome, surfaced to the scheduler for logging/metrics.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TrendTickOutcome {
    pub(crate) metrics_appended: usize,
    pub(crate) events_emitted: usize,
    pub(crate) events_suppressed_cooldown: usize,
}

pub(crate) struct TrendEngine {
    cluster_state: Arc<dyn ClusterState>,
    trend_store: Arc<dyn TrendStore>,
    broadcaster: EventBroadcaster,
    space_id: EmbeddingSpaceId,
    cluster_lookback: Duration,
    event_cooldown: Duration,
    event_min_doc_count: i64,
    event_velocity_threshold: f64,
    event_acceleration_threshold: f64,
    metrics: Arc<Metrics>,
}

impl TrendEngine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cluster_state: Arc<dyn ClusterState>,
        trend_store: Arc<dyn TrendStore>,
        broadcaster: EventBroadcaster,
        space_id: EmbeddingSpaceId,
        cluster_lookback: StdDuration,
        event_cooldown: StdDuration,
        event_min_doc_count: u32,
        event_velocity_threshold: f64,
        event_acceleration_threshold: f64,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            cluster_state,
            trend_store,
            broadcaster,
            space_id,
            cluster_lookback: chrono_duration(cluster_lookback),
            event_cooldown: chrono_duration(event_cooldown),
            event_min_doc_count: i64::from(event_min_doc_count),
            event_velocity_threshold,
            event_acceleration_threshold,
            metrics,
        }
    }

    /// Computes and appends one TrendMetric per active cluster, then runs
    /// the Event Detector over the resulting window (§4.H, §4.I).
    pub(crate) async fn tick(&self) -> anyhow::Result<TrendTickOutcome> {
        let timer = self.metrics.trend_tick_duration_seconds.start_timer();
        let result = self.tick_inner().await;
        timer.observe_duration();
        result
    }

    async fn tick_inner(&self) -> anyhow::Result<TrendTickOutcome> {
        let Some(run) = self.cluster_state.active_run(self.space_id).await? else {
            debug!(space_id = self.space_id, "no active cluster run, skipping trend tick");
            return Ok(TrendTickOutcome::default());
        };

        let now = Utc::now();
        let since = now - self.cluster_lookback;
        let clusters = self.cluster_state.clusters_since(run.id, since).await?;

        let mut outcome = TrendTickOutcome::default();
        for cluster in &clusters {
            let metric = self.compute_metric(run.id, cluster.id, now).await?;
            self.trend_store.append_metric(&metric).await?;
            outcome.metrics_appended += 1;
        }

        let detector_outcome = self.detect_events(now).await?;
        outcome.events_emitted = detector_outcome.events_emitted;
        outcome.events_suppressed_cooldown = detector_outcome.events_suppressed_cooldown;

        info!(
            clusters = clusters.len(),
            metrics_appended = outcome.metrics_appended,
            events_emitted = outcome.events_emitted,
            "trend tick complete"
        );
        Ok(outcome)
    }

    async fn compute_metric(
        &self,
        run_id: ClusterRunId,
        cluster_id: ClusterId,
        ts: DateTime<Utc>,
    ) -> anyhow::Result<TrendMetric> {
        let doc_count = self.cluster_state.member_count(cluster_id).await?;
        let unique_sources = self.cluster_state.unique_source_count(run_id, cluster_id).await?;
        let velocity = self
            .cluster_state
            .assignment_count_since(run_id, cluster_id, ts - Duration::hours(1))
            .await? as f64;
        let novel_count = self
            .cluster_state
            .assignment_count_since(run_id, cluster_id, ts - Duration::hours(6))
            .await?;
        let novelty = if doc_count == 0 {
            0.0
        } else {
            novel_count as f64 / doc_count as f64
        };

        let previous = self
            .trend_store
            .previous_metric(cluster_id, run_id, ts - Duration::hours(2), ts)
            .await?;
        let acceleration = previous
            .map(|prev| {
                let delta_t_hours = (ts - prev.ts).num_seconds() as f64 / 3600.0;
                if delta_t_hours > 0.0 {
                    (velocity - prev.velocity) / delta_t_hours
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0);

        Ok(TrendMetric {
            ts,
            cluster_id,
            run_id,
            doc_count,
            unique_sources,
            velocity,
            acceleration,
            novelty,
            locality: None,
        })
    }

    async fn detect_events(&self, now: DateTime<Utc>) -> anyhow::Result<TrendTickOutcome> {
        let mut outcome = TrendTickOutcome::default();
        let metrics = self.trend_store.latest_metrics_since(now - Duration::hours(1)).await?;

        for metric in metrics {
            if metric.doc_count < self.event_min_doc_count {
                continue;
            }

            let is_anomaly = metric.velocity >= self.event_velocity_threshold
                || metric.acceleration >= self.event_acceleration_threshold;
            if !is_anomaly {
                continue;
            }

            let cooldown_since = now - self.event_cooldown;
            if self
                .trend_store
                .recent_event(metric.cluster_id, cooldown_since)
                .await?
                .is_some()
            {
                outcome.events_suppressed_cooldown += 1;
                self.metrics.events_suppressed_cooldown_total.inc();
                continue;
            }

            let score = metric.velocity + 2.0 * metric.acceleration.abs();
            let severity = EventSeverity::from_velocity(metric.velocity);
            let label = format!("Trending: {:.0} articles/h", metric.velocity);
            let window_start = metric.ts - Duration::hours(1);
            let window_end = metric.ts;

            let event = self
                .trend_store
                .insert_event(
                    metric.run_id,
                    metric.cluster_id,
                    score,
                    severity,
                    &label,
                    window_start,
                    window_end,
                )
                .await?;

            warn!(
                cluster_id = metric.cluster_id,
                score, severity = severity.as_str(), "event detected"
            );
            self.broadcaster.publish(EventMessage::from(&event));
            outcome.events_emitted += 1;
            self.metrics.events_emitted_total.inc();
        }

        Ok(outcome)
    }
}
