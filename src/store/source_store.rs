//! Source persistence: the fixed feed catalogue the Ingestion Dispatcher
//! walks on every tick (§4.E, §3).
use async_trait::async_trait;
use anyhow::{Context, Result};
use sqlx::{PgPool, Row};

use crate::domain::{Source, SourceId, SourceKind, SourceScope, SourceStatus, TrustTier};

#[async_trait]
pub(crate) trait SourceStore: Send + Sync {
    /// Sources with `status = active`, the Ingestion Dispatcher's per-tick
    /// candidate set (§4.E).
    async fn active_sources(&self) -> Result<Vec<Source>>;

    async fn get_source(&self, source_id: SourceId) -> Result<Option<Source>>;

    /// Best-effort bookkeeping after a fetch attempt; never blocks the
    /// outer loop on failure (§7: "record on Source.error_rate (best-effort)").
    async fn record_fetch_result(&self, source_id: SourceId, succeeded: bool) -> Result<()>;
}

#[derive(Debug, Clone)]
pub(crate) struct PgSourceStore {
    pool: PgPool,
}

impl PgSourceStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn kind_from_str(s: &str) -> Result<SourceKind> {
    Ok(match s {
        "feed" => SourceKind::Feed,
        "site" => SourceKind::Site,
        "social" => SourceKind::Social,
        "api" => SourceKind::Api,
        other => anyhow::bail!("unknown source kind: {other}"),
    })
}

fn tier_from_str(s: &str) -> Result<TrustTier> {
    Ok(match s {
        "a" => TrustTier::A,
        "b" => TrustTier::B,
        "c" => TrustTier::C,
        other => anyhow::bail!("unknown trust tier: {other}"),
    })
}

fn scope_from_str(s: &str) -> Result<SourceScope> {
    Ok(match s {
        "local" => SourceScope::Local,
        "regional" => SourceScope::Regional,
        "national" => SourceScope::National,
        "international" => SourceScope::International,
        other => anyhow::bail!("unknown source scope: {other}"),
    })
}

fn status_from_str(s: &str) -> Result<SourceStatus> {
    Ok(match s {
        "active" => SourceStatus::Active,
        "paused" => SourceStatus::Paused,
        "retired" => SourceStatus::Retired,
        other => anyhow::bail!("unknown source status: {other}"),
    })
}

fn row_to_source(row: sqlx::postgres::PgRow) -> Result<Source> {
    let kind_str: String = row.try_get("kind").context("kind")?;
    let tier_str: String = row.try_get("trust_tier").context("trust_tier")?;
    let scope_str: String = row.try_get("scope").context("scope")?;
    let status_str: String = row.try_get("status").context("status")?;

    Ok(Source {
        id: row.try_get("id").context("id")?,
        url: row.try_get("url").context("url")?,
        name: row.try_get("name").context("name")?,
        kind: kind_from_str(&kind_str)?,
        country: row.try_get("country").context("country")?,
        default_language: row.try_get("default_language").context("default_language")?,
        trust_tier: tier_from_str(&tier_str)?,
        scope: scope_from_str(&scope_str)?,
        status: status_from_str(&status_str)?,
        last_fetched_at: row.try_get("last_fetched_at").context("last_fetched_at")?,
        error_rate: row.try_get("error_rate").context("error_rate")?,
    })
}

#[async_trait]
impl SourceStore for PgSourceStore {
    async fn active_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources WHERE status = 'active' ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("fetch active sources")?;

        rows.into_iter().map(row_to_source).collect()
    }

    async fn get_source(&self, source_id: SourceId) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT * FROM sources WHERE id = $1")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .context("get source")?;

        row.map(row_to_source).transpose()
    }

    async fn record_fetch_result(&self, source_id: SourceId, succeeded: bool) -> Result<()> {
        // Exponential moving average over the last ~20 attempts; a single
        // outlier fetch does not swing error_rate to an extreme.
        let delta: f64 = if succeeded { 0.0 } else { 1.0 };
        sqlx::query(
            r"
            UPDATE sources
            SET last_fetched_at = NOW(),
                error_rate = error_rate * 0.95 + $2 * 0.05
            WHERE id = $1
            ",
        )
        .bind(source_id)
        .bind(delta)
        .execute(&self.pool)
        .await
        .context("record source fetch result")?;
        Ok(())
    }
}
