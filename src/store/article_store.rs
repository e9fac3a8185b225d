//! Article persistence: URL-uniqueness and per-source SimHash dedup (§4.B).
use async_trait::async_trait;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{Article, ArticleId, InsertArticleOutcome, SourceId};
use crate::fingerprint::is_near_duplicate;

#[allow(clippy::too_many_arguments)]
#[async_trait]
pub(crate) trait ArticleStore: Send + Sync {
    async fn insert_article(
        &self,
        source_id: SourceId,
        url: &str,
        canonical_url: Option<&str>,
        title: Option<&str>,
        author: Option<&str>,
        language: Option<&str>,
        published_at: Option<DateTime<Utc>>,
        text: &str,
        content_hash: i64,
        simhash: i64,
        quality_score: Option<f64>,
    ) -> Result<InsertArticleOutcome>;

    async fn list_source_simhashes(&self, source_id: SourceId) -> Result<Vec<(ArticleId, i64)>>;

    async fn get_article(&self, article_id: ArticleId) -> Result<Option<Article>>;
}

#[derive(Debug, Clone)]
pub(crate) struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_article(row: sqlx::postgres::PgRow) -> Result<Article> {
        Ok(Article {
            id: row.try_get("id").context("id")?,
            source_id: row.try_get("source_id").context("source_id")?,
            url: row.try_get("url").context("url")?,
            canonical_url: row.try_get("canonical_url").context("canonical_url")?,
            title: row.try_get("title").context("title")?,
            author: row.try_get("author").context("author")?,
            language: row.try_get("language").context("language")?,
            published_at: row.try_get("published_at").context("published_at")?,
            text: row.try_get("text").context("text")?,
            content_hash: row.try_get("content_hash").context("content_hash")?,
            simhash: row.try_get("simhash").context("simhash")?,
            quality_score: row.try_get("quality_score").context("quality_score")?,
            created_at: row.try_get("created_at").context("created_at")?,
        })
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn insert_article(
        &self,
        source_id: SourceId,
        url: &str,
        canonical_url: Option<&str>,
        title: Option<&str>,
        author: Option<&str>,
        language: Option<&str>,
        published_at: Option<DateTime<Utc>>,
        text: &str,
        content_hash: i64,
        simhash: i64,
        quality_score: Option<f64>,
    ) -> Result<InsertArticleOutcome> {
        anyhow::ensure!(
            quality_score.is_none_or(|q| q >= 0.0),
            "quality_score must be >= 0 when present"
        );

        let mut tx = self.pool.begin().await.context("begin article insert tx")?;

        // URL uniqueness is checked first and is authoritative: a race on the
        // same URL is resolved by the unique constraint, one inserter wins.
        if let Some(row) = sqlx::query("SELECT id FROM articles WHERE url = $1")
            .bind(url)
            .fetch_optional(&mut *tx)
            .await
            .context("check url uniqueness")?
        {
            let existing: Uuid = row.try_get("id").context("id")?;
            return Ok(InsertArticleOutcome::DuplicateOf(existing));
        }

        // Near-duplicate scan within the source (advisory; a benign race may
        // still slip two articles with the same content through — §4.B).
        let simhash_rows = sqlx::query("SELECT id, simhash FROM articles WHERE source_id = $1")
            .bind(source_id)
            .fetch_all(&mut *tx)
            .await
            .context("scan source simhashes")?;

        for row in simhash_rows {
            let existing_id: Uuid = row.try_get("id").context("id")?;
            let existing_simhash: i64 = row.try_get("simhash").context("simhash")?;
            if is_near_duplicate(existing_simhash, simhash) {
                return Ok(InsertArticleOutcome::DuplicateOf(existing_id));
            }
        }

        let row = sqlx::query(
            r"
            INSERT INTO articles
                (id, source_id, url, canonical_url, title, author, language,
                 published_at, text, content_hash, simhash, quality_score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            ON CONFLICT (url) DO NOTHING
            RETURNING id
            ",
        )
        .bind(Uuid::now_v7())
        .bind(source_id)
        .bind(url)
        .bind(canonical_url)
        .bind(title)
        .bind(author)
        .bind(language)
        .bind(published_at)
        .bind(text)
        .bind(content_hash)
        .bind(simhash)
        .bind(quality_score)
        .fetch_optional(&mut *tx)
        .await
        .context("insert article")?;

        let outcome = match row {
            Some(row) => {
                let id: Uuid = row.try_get("id").context("id")?;
                InsertArticleOutcome::Inserted(id)
            }
            None => {
                // Lost the race on the unique constraint between our check and
                // our insert; re-fetch the winner's id.
                let row = sqlx::query("SELECT id FROM articles WHERE url = $1")
                    .bind(url)
                    .fetch_one(&mut *tx)
                    .await
                    .context("re-fetch after conflict")?;
                let existing: Uuid = row.try_get("id").context("id")?;
                InsertArticleOutcome::DuplicateOf(existing)
            }
        };

        tx.commit().await.context("commit article insert tx")?;
        Ok(outcome)
    }

    async fn list_source_simhashes(&self, source_id: SourceId) -> Result<Vec<(ArticleId, i64)>> {
        let rows = sqlx::query("SELECT id, simhash FROM articles WHERE source_id = $1")
            .bind(source_id)
            .fetch_all(&self.pool)
            .await
            .context("list source simhashes")?;

        rows.into_iter()
            .map(|row| {
                let id: Uuid = row.try_get("id").context("id")?;
                let simhash: i64 = row.try_get("simhash").context("simhash")?;
                Ok((id, simhash))
            })
            .collect()
    }

    async fn get_article(&self, article_id: ArticleId) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = $1")
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await
            .context("get article")?;

        row.map(Self::row_to_article).transpose()
    }
}
