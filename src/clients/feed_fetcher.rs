//! Feed-fetching collaborator (§1, §4.E): out of scope beyond this narrow
//! interface — HTTP GET plus feed parsing, reached only through `FeedFetcher`.
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FeedEntry {
    pub(crate) link: String,
}

#[async_trait]
pub(crate) trait FeedFetcher: Send + Sync {
    /// Downloads and parses the feed at `url`, bounded by the caller's deadline
    /// (10s connect+read, §4.E).
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>>;
}

#[derive(Debug, Clone)]
pub(crate) struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub(crate) fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent("trend-pipeline-ingest/1.0")
            .build()
            .context("failed to build feed fetcher client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .context("feed fetch request failed")?
            .error_for_status()
            .context("feed fetch returned error status")?
            .bytes()
            .await
            .context("feed fetch body read failed")?;

        parse_entries(&body)
    }
}

fn parse_entries(body: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(body).context("failed to parse feed")?;
    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| entry.links.into_iter().next().map(|link| FeedEntry { link: link.href }))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_entries_skips_linkless_entries() {
        let atom = br#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Feed</title>
  <id>urn:uuid:feed</id>
  <updated>2026-01-01T00:00:00Z</updated>
  <entry>
    <title>With link</title>
    <id>urn:uuid:1</id>
    <updated>2026-01-01T00:00:00Z</updated>
    <link href="https://example.com/a"/>
  </entry>
  <entry>
    <title>Without link</title>
    <id>urn:uuid:2</id>
    <updated>2026-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let entries = parse_entries(atom).expect("feed parses");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://example.com/a");
    }
}
