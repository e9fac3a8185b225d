//! LLM-summariser collaborator (§1, §4.K): `articles -> markdown sections`,
//! reached only through `Summariser`.
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

/// Ordered-by-recency article view passed to the summariser (§4.K: "ordered
/// list of Articles of a cluster, most recent first").
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ArticleRef {
    pub(crate) title: Option<String>,
    pub(crate) text: String,
    pub(crate) published_at: Option<DateTime<Utc>>,
    pub(crate) source_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SummaryDraft {
    pub(crate) language: String,
    pub(crate) summary_md: String,
    pub(crate) bias_md: String,
    pub(crate) timeline_md: String,
    pub(crate) model_name: String,
}

#[async_trait]
pub(crate) trait Summariser: Send + Sync {
    async fn summarise(&self, articles: &[ArticleRef]) -> Result<SummaryDraft>;
}

#[derive(Serialize)]
struct SummariseRequest<'a> {
    articles: &'a [ArticleRef],
}

#[derive(Debug, Clone)]
pub(crate) struct HttpSummariser {
    client: Client,
    base_url: Url,
}

impl HttpSummariser {
    pub(crate) fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build summariser client")?;
        let base_url = Url::parse(&base_url.into()).context("invalid summariser base URL")?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl Summariser for HttpSummariser {
    async fn summarise(&self, articles: &[ArticleRef]) -> Result<SummaryDraft> {
        let endpoint = self
            .base_url
            .join("summarise")
            .context("failed to build summariser endpoint URL")?;

        let draft = self
            .client
            .post(endpoint)
            .json(&SummariseRequest { articles })
            .send()
            .await
            .context("summarisation request failed")?
            .error_for_status()
            .context("summariser returned error status")?
            .json::<SummaryDraft>()
            .await
            .context("malformed summariser response")?;

        Ok(draft)
    }
}
