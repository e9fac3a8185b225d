//! Content-extraction collaborator (§1, §4.F step 2): HTML boilerplate
//! stripping lives entirely behind this fixed contract (§9, "dynamic dispatch
//! ... recoded as a fixed extractor contract"); unknown upstream fields are
//! ignored by `serde`'s default field handling.
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ExtractedArticle {
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) authors: Vec<String>,
    #[serde(default)]
    pub(crate) date: Option<String>,
    #[serde(default)]
    pub(crate) date_publish: Option<String>,
    #[serde(default)]
    pub(crate) date_modify: Option<String>,
    #[serde(default)]
    pub(crate) canonical_link: Option<String>,
    #[serde(default)]
    pub(crate) language: Option<String>,
}

impl ExtractedArticle {
    /// `date`, `date_publish`, `date_modify` in the order §4.F step 3 checks
    /// them. The caller picks the first one that actually *parses*, not
    /// just the first one that's present — a malformed leading field must
    /// not shadow a valid one behind it.
    #[must_use]
    pub(crate) fn date_candidates(&self) -> [Option<&str>; 3] {
        [self.date.as_deref(), self.date_publish.as_deref(), self.date_modify.as_deref()]
    }
}

#[async_trait]
pub(crate) trait ArticleExtractor: Send + Sync {
    async fn extract(&self, url: &str, html: &str) -> Result<ExtractedArticle>;
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
    html: &'a str,
}

#[derive(Debug, Clone)]
pub(crate) struct HttpArticleExtractor {
    client: Client,
    base_url: Url,
}

impl HttpArticleExtractor {
    pub(crate) fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build article extractor client")?;
        let base_url = Url::parse(&base_url.into()).context("invalid article extractor base URL")?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ArticleExtractor for HttpArticleExtractor {
    async fn extract(&self, url: &str, html: &str) -> Result<ExtractedArticle> {
        let endpoint = self
            .base_url
            .join("extract")
            .context("failed to build extractor endpoint URL")?;

        let extracted = self
            .client
            .post(endpoint)
            .json(&ExtractRequest { url, html })
            .send()
            .await
            .context("article extraction request failed")?
            .error_for_status()
            .context("article extractor returned error status")?
            .json::<ExtractedArticle>()
            .await
            .context("malformed article extractor response")?;

        Ok(extracted)
    }
}
