//! Persisted entity shapes shared by the store, pipeline, and trend modules.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type SourceId = Uuid;
pub type ArticleId = Uuid;
pub type EmbeddingSpaceId = i32;
pub type ClusterRunId = i32;
pub type ClusterId = i32;
pub type EventId = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Feed,
    Site,
    Social,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    A,
    B,
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceScope {
    Local,
    Regional,
    National,
    International,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Active,
    Paused,
    Retired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub url: String,
    pub name: String,
    pub kind: SourceKind,
    pub country: Option<String>,
    pub default_language: Option<String>,
    pub trust_tier: TrustTier,
    pub scope: SourceScope,
    pub status: SourceStatus,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub source_id: SourceId,
    pub url: String,
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub text: String,
    pub content_hash: i64,
    pub simhash: i64,
    pub quality_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an article store insertion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertArticleOutcome {
    Inserted(ArticleId),
    DuplicateOf(ArticleId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSpace {
    pub id: EmbeddingSpaceId,
    pub name: String,
    pub provider: String,
    pub dimension: i32,
    pub version: i32,
}

#[derive(Debug, Clone)]
pub struct ArticleEmbedding {
    pub space_id: EmbeddingSpaceId,
    pub article_id: ArticleId,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterRunStatus {
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRun {
    pub id: ClusterRunId,
    pub space_id: EmbeddingSpaceId,
    pub algorithm: String,
    pub params: Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: ClusterRunStatus,
    pub is_active: bool,
}

impl ClusterRun {
    /// `run.params.threshold`, falling back to `default` (the operator's
    /// `CLUSTER_SIMILARITY_THRESHOLD`, itself 0.80 absent configuration) when
    /// the active run's params omit one (§4.G Phase 2 step 2).
    #[must_use]
    pub fn threshold(&self, default: f64) -> f64 {
        self.params.get("threshold").and_then(Value::as_f64).unwrap_or(default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub run_id: ClusterRunId,
    pub label: Option<String>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleCluster {
    pub run_id: ClusterRunId,
    pub cluster_id: ClusterId,
    pub article_id: ArticleId,
    pub similarity: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: ClusterId,
    pub version: i32,
    pub is_active: bool,
    pub language: String,
    pub summary_md: String,
    pub bias_md: String,
    pub timeline_md: String,
    pub model_name: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendMetric {
    pub ts: DateTime<Utc>,
    pub cluster_id: ClusterId,
    pub run_id: ClusterRunId,
    pub doc_count: i64,
    pub unique_sources: i64,
    pub velocity: f64,
    pub acceleration: f64,
    pub novelty: f64,
    pub locality: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EventSeverity {
    /// Severity tiers by velocity (§4.I).
    #[must_use]
    pub fn from_velocity(velocity: f64) -> Self {
        if velocity >= 30.0 {
            Self::Critical
        } else if velocity >= 15.0 {
            Self::High
        } else if velocity >= 7.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub run_id: ClusterRunId,
    pub cluster_id: ClusterId,
    pub detected_at: DateTime<Utc>,
    pub score: f64,
    pub severity: EventSeverity,
    pub label: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Wire payload published on the `events` topic (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub event_id: EventId,
    pub cluster_id: ClusterId,
    pub severity: String,
    pub label: String,
    pub score: f64,
    pub detected_at: DateTime<Utc>,
}

impl From<&Event> for EventMessage {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.id,
            cluster_id: event.cluster_id,
            severity: event.severity.as_str().to_string(),
            label: event.label.clone(),
            score: event.score,
            detected_at: event.detected_at,
        }
    }
}
