//! Job kinds and payloads carried by the durable queue (§4.M′).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ArticleId, ClusterId, SourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum JobKind {
    FetchSource,
    ProcessArticle,
    EmbedAndCluster,
    SummariseCluster,
}

impl JobKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::FetchSource => "fetch_source",
            Self::ProcessArticle => "process_article",
            Self::EmbedAndCluster => "embed_and_cluster",
            Self::SummariseCluster => "summarise_cluster",
        }
    }

    pub(crate) fn from_str(s: &str) -> Option<Self> {
        match s {
            "fetch_source" => Some(Self::FetchSource),
            "process_article" => Some(Self::ProcessArticle),
            "embed_and_cluster" => Some(Self::EmbedAndCluster),
            "summarise_cluster" => Some(Self::SummariseCluster),
            _ => None,
        }
    }
}

/// Strongly-typed job payload; persisted as `payload` JSONB alongside the
/// `kind` text column (§6: "Persisted state layout").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum JobPayload {
    FetchSource {
        source_id: SourceId,
        url: String,
    },
    ProcessArticle {
        source_id: SourceId,
        url: String,
    },
    EmbedAndCluster {
        article_id: ArticleId,
    },
    SummariseCluster {
        cluster_id: ClusterId,
    },
}

impl JobPayload {
    pub(crate) fn kind(&self) -> JobKind {
        match self {
            Self::FetchSource { .. } => JobKind::FetchSource,
            Self::ProcessArticle { .. } => JobKind::ProcessArticle,
            Self::EmbedAndCluster { .. } => JobKind::EmbedAndCluster,
            Self::SummariseCluster { .. } => JobKind::SummariseCluster,
        }
    }
}

pub(crate) type QueuedJobId = i64;

#[derive(Debug, Clone)]
pub(crate) struct QueuedJob {
    pub(crate) id: QueuedJobId,
    pub(crate) payload: JobPayload,
    pub(crate) retry_count: i32,
    pub(crate) max_retries: i32,
    pub(crate) expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct NewQueuedJob {
    pub(crate) payload: JobPayload,
    pub(crate) ttl_seconds: i64,
    pub(crate) max_retries: i32,
}

impl NewQueuedJob {
    pub(crate) fn new(payload: JobPayload, ttl_seconds: i64, max_retries: i32) -> Self {
        Self {
            payload,
            ttl_seconds,
            max_retries,
        }
    }
}
