use std::time::Duration;

use anyhow::{Context, Result};
use moka::future::Cache;
use serde::{Deserialize, Serialize};

pub const MAX_NEWS_ITEMS: usize = 3;

const CACHE_TTL: Duration = Duration::from_secs(300);

/// A feed entry: a bare link when that is all the feed gives, a richer
/// record otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NewsItem {
    Article { title: String, text: String },
    Link(String),
}

pub struct NewsProvider {
    http: reqwest::Client,
    feed_url: String,
    cache: Cache<(), Vec<NewsItem>>,
}

impl NewsProvider {
    pub fn new(http: reqwest::Client, feed_url: String) -> Self {
        Self {
            http,
            feed_url,
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Latest feed entries, capped at `max_items`. Any failure degrades to
    /// an empty list; the feed being down must never fail a request.
    /// Cached globally, not keyed by argument.
    pub async fn latest(&self, max_items: usize) -> Vec<NewsItem> {
        if let Some(hit) = self.cache.get(&()).await {
            return hit;
        }

        let items = match self.fetch(max_items).await {
            Ok(items) => items,
            Err(e) => {
                log::error!("error fetching the news feed: {:#}", e);
                Vec::new()
            }
        };
        self.cache.insert((), items.clone()).await;
        items
    }

    async fn fetch(&self, max_items: usize) -> Result<Vec<NewsItem>> {
        let body = self
            .http
            .get(&self.feed_url)
            .send()
            .await
            .context("failed to reach the news feed")?
            .error_for_status()?
            .bytes()
            .await
            .context("failed to read the news feed body")?;

        let channel = rss::Channel::read_from(&body[..]).context("failed to parse the feed")?;
        Ok(extract_links(&channel, max_items))
    }
}

fn extract_links(channel: &rss::Channel, max_items: usize) -> Vec<NewsItem> {
    channel
        .items()
        .iter()
        .take(max_items)
        .filter_map(|item| item.link().map(|link| NewsItem::Link(link.to_string())))
        .collect()
}
