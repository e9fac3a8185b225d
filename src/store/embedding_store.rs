//! Embedding persistence and the windowed k-nearest-neighbour hot path (§4.C).
use async_trait::async_trait;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{ArticleId, EmbeddingSpace, EmbeddingSpaceId};

#[async_trait]
pub(crate) trait EmbeddingStore: Send + Sync {
    /// Resolve the named embedding space, creating it if absent. A benign race
    /// between two creators is resolved by catching the `(name, version)`
    /// unique-constraint violation and re-fetching (§5).
    async fn get_or_create_space(
        &self,
        name: &str,
        provider: &str,
        dimension: u32,
        version: i32,
    ) -> Result<EmbeddingSpace>;

    /// First-writer-wins drift tolerance: if the embedder returns a dimension
    /// different from the registry's declared dimension, update the registry
    /// (§4.G Phase 1 step 3c).
    async fn update_space_dimension(&self, space_id: EmbeddingSpaceId, dimension: u32) -> Result<()>;

    async fn get_embedding(
        &self,
        space_id: EmbeddingSpaceId,
        article_id: ArticleId,
    ) -> Result<Option<Vec<f32>>>;

    /// Idempotent on the composite `(space_id, article_id)` key.
    async fn put_embedding(
        &self,
        space_id: EmbeddingSpaceId,
        article_id: ArticleId,
        vector: &[f32],
    ) -> Result<()>;

    /// Up to `k` neighbours among articles created on or after `since`,
    /// ordered by ascending cosine distance (descending similarity).
    /// Similarity is reported as `1 - cosine_distance`.
    async fn knn(
        &self,
        space_id: EmbeddingSpaceId,
        vector: &[f32],
        since: DateTime<Utc>,
        exclude_article_id: ArticleId,
        k: u32,
    ) -> Result<Vec<(ArticleId, f64)>>;
}

#[derive(Debug, Clone)]
pub(crate) struct PgEmbeddingStore {
    pool: PgPool,
}

impl PgEmbeddingStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_space(row: sqlx::postgres::PgRow) -> Result<EmbeddingSpace> {
    Ok(EmbeddingSpace {
        id: row.try_get("id").context("id")?,
        name: row.try_get("name").context("name")?,
        provider: row.try_get("provider").context("provider")?,
        dimension: row.try_get("dimension").context("dimension")?,
        version: row.try_get("version").context("version")?,
    })
}

#[async_trait]
impl EmbeddingStore for PgEmbeddingStore {
    async fn get_or_create_space(
        &self,
        name: &str,
        provider: &str,
        dimension: u32,
        version: i32,
    ) -> Result<EmbeddingSpace> {
        let row = sqlx::query(
            r"
            INSERT INTO embedding_spaces (name, provider, dimension, version)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name, version) DO UPDATE
            SET provider = embedding_spaces.provider
            RETURNING id, name, provider, dimension, version
            ",
        )
        .bind(name)
        .bind(provider)
        .bind(dimension as i32)
        .bind(version)
        .fetch_one(&self.pool)
        .await
        .context("get or create embedding space")?;

        row_to_space(row)
    }

    async fn update_space_dimension(&self, space_id: EmbeddingSpaceId, dimension: u32) -> Result<()> {
        sqlx::query("UPDATE embedding_spaces SET dimension = $2 WHERE id = $1")
            .bind(space_id)
            .bind(dimension as i32)
            .execute(&self.pool)
            .await
            .context("update embedding space dimension")?;
        Ok(())
    }

    async fn get_embedding(
        &self,
        space_id: EmbeddingSpaceId,
        article_id: ArticleId,
    ) -> Result<Option<Vec<f32>>> {
        let row = sqlx::query(
            "SELECT embedding FROM article_embeddings WHERE space_id = $1 AND article_id = $2",
        )
        .bind(space_id)
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await
        .context("get embedding")?;

        row.map(|row| {
            row.try_get::<Vector, _>("embedding")
                .context("embedding")
                .map(Vector::to_vec)
        })
        .transpose()
    }

    async fn put_embedding(
        &self,
        space_id: EmbeddingSpaceId,
        article_id: ArticleId,
        vector: &[f32],
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO article_embeddings (space_id, article_id, embedding)
            VALUES ($1, $2, $3)
            ON CONFLICT (space_id, article_id) DO NOTHING
            ",
        )
        .bind(space_id)
        .bind(article_id)
        .bind(Vector::from(vector.to_vec()))
        .execute(&self.pool)
        .await
        .context("put embedding")?;
        Ok(())
    }

    /// Pushes the nearest-neighbour ordering into SQL over the `vector`
    /// column's cosine-distance (`<=>`) operator, so the index backing that
    /// column (spec.md §6, "a cosine-distance index") is actually used
    /// instead of a full window scan scored in Rust (§4.C).
    async fn knn(
        &self,
        space_id: EmbeddingSpaceId,
        vector: &[f32],
        since: DateTime<Utc>,
        exclude_article_id: ArticleId,
        k: u32,
    ) -> Result<Vec<(ArticleId, f64)>> {
        let query_vector = Vector::from(vector.to_vec());
        let rows = sqlx::query(
            r"
            SELECT e.article_id, 1 - (e.embedding <=> $1) AS similarity
            FROM article_embeddings e
            JOIN articles a ON a.id = e.article_id
            WHERE e.space_id = $2 AND a.created_at >= $3 AND e.article_id != $4
            ORDER BY e.embedding <=> $1
            LIMIT $5
            ",
        )
        .bind(&query_vector)
        .bind(space_id)
        .bind(since)
        .bind(exclude_article_id)
        .bind(i64::from(k))
        .fetch_all(&self.pool)
        .await
        .context("fetch knn candidates")?;

        rows.into_iter()
            .map(|row| {
                let article_id: Uuid = row.try_get("article_id").context("article_id")?;
                let similarity: f64 = row.try_get("similarity").context("similarity")?;
                Ok((article_id, similarity))
            })
            .collect()
    }
}
