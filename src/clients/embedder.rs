//! Embedding-provider collaborator (§1, §4.G Phase 1): a black-box
//! `text -> vector[D]` function reached only through `Embedder`.
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

#[async_trait]
pub(crate) trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub(crate) struct HttpEmbedder {
    client: Client,
    base_url: Url,
    model: String,
}

impl HttpEmbedder {
    pub(crate) fn new(base_url: impl Into<String>, api_key: &str, model: impl Into<String>) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("invalid embedder api key header value")?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build embedder client")?;
        let base_url = Url::parse(&base_url.into()).context("invalid embedder base URL")?;

        Ok(Self {
            client,
            base_url,
            model: model.into(),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let endpoint = self
            .base_url
            .join("v1/embeddings")
            .context("failed to build embedder endpoint URL")?;

        let response: EmbedResponse = self
            .client
            .post(endpoint)
            .timeout(Duration::from_secs(30))
            .json(&EmbedRequest {
                model: &self.model,
                input: [text],
            })
            .send()
            .await
            .context("embedding request failed")?
            .error_for_status()
            .context("embedder returned error status")?
            .json()
            .await
            .context("malformed embedder response")?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .context("embedder response contained no vectors")?;

        if vector.is_empty() {
            bail!("embedder returned a zero-length vector");
        }

        Ok(vector)
    }
}
