pub(crate) mod article_store;
pub(crate) mod cluster_state;
pub(crate) mod embedding_store;
#[cfg(test)]
pub(crate) mod mock;
pub(crate) mod source_store;
pub(crate) mod summary_store;
pub(crate) mod trend_store;

pub(crate) use article_store::{ArticleStore, PgArticleStore};
pub(crate) use cluster_state::{ClusterState, PgClusterState};
pub(crate) use embedding_store::{EmbeddingStore, PgEmbeddingStore};
pub(crate) use source_store::{PgSourceStore, SourceStore};
pub(crate) use summary_store::{PgSummaryStore, SummaryStore};
pub(crate) use trend_store::{PgTrendStore, TrendStore};
