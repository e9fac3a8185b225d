//! Narrow, timeout-bounded wrappers around the system's external
//! collaborators (§4.O′): feed fetcher, article extractor, embedder,
//! summariser, search sink. Each is a `Send + Sync` trait with one production
//! HTTP implementation and, under `#[cfg(test)]`, an in-memory double.
pub(crate) mod article_extractor;
pub(crate) mod embedder;
pub(crate) mod feed_fetcher;
#[cfg(test)]
pub(crate) mod mock;
pub(crate) mod search_sink;
pub(crate) mod summariser;

pub(crate) use article_extractor::{ArticleExtractor, ExtractedArticle, HttpArticleExtractor};
pub(crate) use embedder::{Embedder, HttpEmbedder};
pub(crate) use feed_fetcher::{FeedEntry, FeedFetcher, HttpFeedFetcher};
pub(crate) use search_sink::{LoggingSearchSink, SearchDocument, SearchSink};
pub(crate) use summariser::{ArticleRef, HttpSummariser, SummaryDraft, Summariser};
