//! Prometheus metric definitions (§4.L').
use std::sync::Arc;

use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};

/// Process-wide Prometheus metrics collector.
#[derive(Debug, Clone)]
pub struct Metrics {
    pub articles_fetched_total: Counter,
    pub articles_deduplicated_total: Counter,
    pub clusters_created_total: Counter,
    pub assignments_created_total: Counter,
    pub events_emitted_total: Counter,
    pub events_suppressed_cooldown_total: Counter,
    pub jobs_completed_total: Counter,
    pub jobs_failed_total: Counter,

    pub article_processing_duration_seconds: Histogram,
    pub embed_cluster_duration_seconds: Histogram,
    pub trend_tick_duration_seconds: Histogram,

    pub active_jobs: Gauge,
}

impl Metrics {
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            articles_fetched_total: register_counter_with_registry!(
                "articles_fetched_total",
                "Total number of articles fetched from sources",
                registry
            )?,
            articles_deduplicated_total: register_counter_with_registry!(
                "articles_deduplicated_total",
                "Total number of articles dropped as URL or near-duplicates",
                registry
            )?,
            clusters_created_total: register_counter_with_registry!(
                "clusters_created_total",
                "Total number of clusters created by the online clustering worker",
                registry
            )?,
            assignments_created_total: register_counter_with_registry!(
                "assignments_created_total",
                "Total number of article-to-cluster assignments",
                registry
            )?,
            events_emitted_total: register_counter_with_registry!(
                "events_emitted_total",
                "Total number of trend events raised by the anomaly detector",
                registry
            )?,
            events_suppressed_cooldown_total: register_counter_with_registry!(
                "events_suppressed_cooldown_total",
                "Total number of anomalies suppressed by the per-cluster cooldown",
                registry
            )?,
            jobs_completed_total: register_counter_with_registry!(
                "jobs_completed_total",
                "Total number of queued jobs that completed successfully",
                registry
            )?,
            jobs_failed_total: register_counter_with_registry!(
                "jobs_failed_total",
                "Total number of queued jobs that exhausted their retries",
                registry
            )?,
            article_processing_duration_seconds: register_histogram_with_registry!(
                "article_processing_duration_seconds",
                "Duration of the Article Processor job (fetch, extract, fingerprint, insert)",
                registry
            )?,
            embed_cluster_duration_seconds: register_histogram_with_registry!(
                "embed_cluster_duration_seconds",
                "Duration of the Embed-and-Cluster Worker job",
                registry
            )?,
            trend_tick_duration_seconds: register_histogram_with_registry!(
                "trend_tick_duration_seconds",
                "Duration of a single trend metrics and event-detection tick",
                registry
            )?,
            active_jobs: register_gauge_with_registry!(
                "active_jobs",
                "Number of jobs currently claimed and running",
                registry
            )?,
        })
    }
}
