//! Full-text search sink (§1: explicitly out of scope beyond this interface).
//! Kept as a trivial trait with a logging-only default implementation since
//! indexing internals are not part of this system.
use async_trait::async_trait;
use anyhow::Result;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct SearchDocument {
    pub(crate) article_id: Uuid,
    pub(crate) url: String,
    pub(crate) title: Option<String>,
    pub(crate) text: String,
}

#[async_trait]
pub(crate) trait SearchSink: Send + Sync {
    async fn index(&self, document: &SearchDocument) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LoggingSearchSink;

#[async_trait]
impl SearchSink for LoggingSearchSink {
    async fn index(&self, document: &SearchDocument) -> Result<()> {
        debug!(article_id = %document.article_id, url = %document.url, "search-index fan-out (logging sink)");
        Ok(())
    }
}
