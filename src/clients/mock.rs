//! In-memory test doubles for the external-collaborator traits.
#![cfg(test)]
use std::sync::Mutex;

use async_trait::async_trait;
use anyhow::Result;

use super::article_extractor::{ArticleExtractor, ExtractedArticle};
use super::embedder::Embedder;
use super::feed_fetcher::{FeedEntry, FeedFetcher};
use super::search_sink::{SearchDocument, SearchSink};
use super::summariser::{ArticleRef, SummaryDraft, Summariser};

#[derive(Default)]
pub(crate) struct MockFeedFetcher {
    pub(crate) entries: Mutex<Vec<FeedEntry>>,
    pub(crate) fail: bool,
}

impl MockFeedFetcher {
    pub(crate) fn with_links(links: &[&str]) -> Self {
        Self {
            entries: Mutex::new(
                links
                    .iter()
                    .map(|link| FeedEntry { link: (*link).to_string() })
                    .collect(),
            ),
            fail: false,
        }
    }

    pub(crate) fn with_link_strings(links: Vec<String>) -> Self {
        Self {
            entries: Mutex::new(links.into_iter().map(|link| FeedEntry { link }).collect()),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl FeedFetcher for MockFeedFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<FeedEntry>> {
        if self.fail {
            anyhow::bail!("mock feed fetcher configured to fail");
        }
        Ok(self.entries.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub(crate) struct MockArticleExtractor {
    pub(crate) response: ExtractedArticle,
    pub(crate) fail: bool,
}

impl MockArticleExtractor {
    pub(crate) fn with_response(response: ExtractedArticle) -> Self {
        Self { response, fail: false }
    }

    pub(crate) fn failing() -> Self {
        Self {
            response: ExtractedArticle::default(),
            fail: true,
        }
    }
}

#[async_trait]
impl ArticleExtractor for MockArticleExtractor {
    async fn extract(&self, _url: &str, _html: &str) -> Result<ExtractedArticle> {
        if self.fail {
            anyhow::bail!("mock article extractor configured to fail");
        }
        Ok(self.response.clone())
    }
}

#[derive(Default)]
pub(crate) struct MockEmbedder {
    pub(crate) vector: Vec<f32>,
    pub(crate) fail: bool,
}

impl MockEmbedder {
    pub(crate) fn with_vector(vector: Vec<f32>) -> Self {
        Self { vector, fail: false }
    }

    pub(crate) fn failing() -> Self {
        Self {
            vector: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if self.fail {
            anyhow::bail!("mock embedder configured to fail");
        }
        Ok(self.vector.clone())
    }
}

#[derive(Default)]
pub(crate) struct MockSummariser {
    pub(crate) draft: Option<SummaryDraft>,
}

#[async_trait]
impl Summariser for MockSummariser {
    async fn summarise(&self, _articles: &[ArticleRef]) -> Result<SummaryDraft> {
        self.draft
            .clone()
            .ok_or_else(|| anyhow::anyhow!("mock summariser has no configured draft"))
    }
}

#[derive(Default)]
pub(crate) struct MockSearchSink {
    pub(crate) indexed: Mutex<Vec<SearchDocument>>,
}

#[async_trait]
impl SearchSink for MockSearchSink {
    async fn index(&self, document: &SearchDocument) -> Result<()> {
        self.indexed.lock().unwrap().push(document.clone());
        Ok(())
    }
}
