//! Arctic Shift archive client
//!
//! Paginated access to the Reddit comment archive. Two rate limiting layers:
//! a fixed pause between page requests, and header-driven backoff when the
//! server reports its quota running low.
//!
//! Pagination is timestamp-based: each page advances the cursor to one second
//! past the newest item returned. Items sharing the final timestamp of a full
//! page can be skipped by that advance; with a 100-item page and one-second
//! resolution this is rare enough to accept.

use std::time::Duration;

use async_stream::try_stream;
use futures::Stream;
use governor::{Quota, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use courtpulse_common::config::ArchiveConfig;

const USER_AGENT: &str = "courtpulse/0.1 ( https://github.com/courtpulse/courtpulse )";

const COMMENTS_ENDPOINT: &str = "/api/comments/search";
const POSTS_ENDPOINT: &str = "/api/posts/search";

/// Archive API errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error ({0}): {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Which archive collection to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Comments,
    Posts,
}

impl ItemKind {
    fn endpoint(&self) -> &'static str {
        match self {
            ItemKind::Comments => COMMENTS_ENDPOINT,
            ItemKind::Posts => POSTS_ENDPOINT,
        }
    }
}

/// Search response envelope
#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<serde_json::Value>,
}

/// Cursor for the page following `items`: one second past the newest item.
/// Falls back to `current_after + 1` when the timestamp field is absent, so
/// the cursor always advances.
pub fn next_after(items: &[serde_json::Value], current_after: i64) -> i64 {
    items
        .last()
        .and_then(|item| item.get("created_utc"))
        .and_then(|v| v.as_i64())
        .unwrap_or(current_after)
        + 1
}

/// Client for the Arctic Shift archive API with request pacing.
pub struct ArchiveClient {
    client: Client,
    config: ArchiveConfig,
    pacer: Option<
        RateLimiter<
            governor::state::direct::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl ArchiveClient {
    pub fn new(config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ArchiveError::NetworkError(e.to_string()))?;

        let pacer = if config.request_delay_ms > 0 {
            let period = Duration::from_millis(config.request_delay_ms);
            Some(RateLimiter::direct(
                Quota::with_period(period).expect("delay is non-zero"),
            ))
        } else {
            None
        };

        Ok(Self {
            client,
            config: config.clone(),
            pacer,
        })
    }

    /// Fetch one page of items created in `[after, before)`, oldest first.
    ///
    /// Waits out the fixed inter-request pause before sending, and the
    /// server's rate window afterwards when the remaining quota drops below
    /// the configured buffer. Returns raw archive objects so the download
    /// step can store them unmodified.
    pub async fn fetch_page(
        &self,
        kind: ItemKind,
        subreddit: &str,
        after: i64,
        before: i64,
    ) -> Result<Vec<serde_json::Value>, ArchiveError> {
        self.pace().await;

        let url = format!("{}{}", self.config.base_url, kind.endpoint());
        tracing::debug!(subreddit = %subreddit, after, before, "fetching archive page");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("subreddit", subreddit.to_string()),
                ("after", after.to_string()),
                ("before", before.to_string()),
                ("sort", "asc".to_string()),
                ("limit", self.config.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ArchiveError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::ApiError(
                status.as_u16(),
                response.text().await.unwrap_or_default(),
            ));
        }

        let headers = response.headers().clone();
        let page: SearchResponse = response
            .json()
            .await
            .map_err(|e| ArchiveError::ParseError(e.to_string()))?;

        tracing::debug!(subreddit = %subreddit, count = page.data.len(), "page received");

        self.wait_for_quota(&headers).await;
        Ok(page.data)
    }

    /// Stream all items created in `[after, before)`, fetching pages lazily.
    ///
    /// The caller supplies the starting cursor, so a resumed download
    /// continues from wherever the previous run stopped.
    pub fn items(
        &self,
        kind: ItemKind,
        subreddit: &str,
        after: i64,
        before: i64,
    ) -> impl Stream<Item = Result<serde_json::Value, ArchiveError>> + '_ {
        let subreddit = subreddit.to_string();
        try_stream! {
            let mut cursor = after;
            while cursor < before {
                let items = self.fetch_page(kind, &subreddit, cursor, before).await?;
                if items.is_empty() {
                    break;
                }
                cursor = next_after(&items, cursor);
                for item in items {
                    yield item;
                }
            }
        }
    }

    pub fn comments(
        &self,
        subreddit: &str,
        after: i64,
        before: i64,
    ) -> impl Stream<Item = Result<serde_json::Value, ArchiveError>> + '_ {
        self.items(ItemKind::Comments, subreddit, after, before)
    }

    pub fn posts(
        &self,
        subreddit: &str,
        after: i64,
        before: i64,
    ) -> impl Stream<Item = Result<serde_json::Value, ArchiveError>> + '_ {
        self.items(ItemKind::Posts, subreddit, after, before)
    }

    async fn pace(&self) {
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }
    }

    /// Sleep out the server's rate window when remaining quota is low.
    /// Missing headers mean the server is not reporting quota; skip.
    async fn wait_for_quota(&self, headers: &HeaderMap) {
        let remaining = match header_i64(headers, "X-RateLimit-Remaining") {
            Some(v) => v,
            None => return,
        };
        if remaining >= self.config.rate_limit_buffer as i64 {
            return;
        }

        let wait = match header_i64(headers, "X-RateLimit-Reset") {
            Some(reset_ts) => {
                let now = chrono::Utc::now().timestamp();
                Duration::from_secs((reset_ts - now).max(0) as u64 + 1)
            }
            None => Duration::from_secs(60),
        };
        tracing::warn!(
            remaining,
            wait_secs = wait.as_secs(),
            "archive rate limit low, waiting for reset"
        );
        tokio::time::sleep(wait).await;
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn item(created_utc: i64) -> serde_json::Value {
        serde_json::json!({ "id": "x", "created_utc": created_utc })
    }

    #[test]
    fn test_next_after_advances_past_newest() {
        let items = vec![item(100), item(150), item(200)];
        assert_eq!(next_after(&items, 100), 201);
    }

    #[test]
    fn test_next_after_without_timestamp_still_advances() {
        let items = vec![serde_json::json!({ "id": "x" })];
        assert_eq!(next_after(&items, 500), 501);
    }

    #[test]
    fn test_header_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Remaining", "42".parse().unwrap());
        assert_eq!(header_i64(&headers, "X-RateLimit-Remaining"), Some(42));
        assert_eq!(header_i64(&headers, "X-RateLimit-Reset"), None);
    }

    #[tokio::test]
    async fn test_request_pacing() {
        let config = ArchiveConfig {
            request_delay_ms: 50,
            ..Default::default()
        };
        let client = ArchiveClient::new(&config).unwrap();

        let start = Instant::now();

        // First request should pass immediately
        client.pace().await;
        assert!(start.elapsed() < Duration::from_millis(40));

        // Second should wait ~50ms, third ~100ms total
        client.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(45));

        client.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(95));
    }

    #[tokio::test]
    async fn test_zero_delay_disables_pacing() {
        let config = ArchiveConfig {
            request_delay_ms: 0,
            ..Default::default()
        };
        let client = ArchiveClient::new(&config).unwrap();

        let start = Instant::now();
        for _ in 0..3 {
            client.pace().await;
        }
        assert!(start.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_quota_wait_skipped_without_headers() {
        let client = ArchiveClient::new(&ArchiveConfig::default()).unwrap();

        let start = Instant::now();
        client.wait_for_quota(&HeaderMap::new()).await;
        assert!(start.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_quota_wait_skipped_when_remaining_high() {
        let client = ArchiveClient::new(&ArchiveConfig::default()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Remaining", "500".parse().unwrap());
        let start = Instant::now();
        client.wait_for_quota(&headers).await;
        assert!(start.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_quota_wait_respects_reset_timestamp() {
        let client = ArchiveClient::new(&ArchiveConfig::default()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Remaining", "2".parse().unwrap());
        // Reset already in the past: wait clamps to the one second floor
        let past = (chrono::Utc::now().timestamp() - 30).to_string();
        headers.insert("X-RateLimit-Reset", past.parse().unwrap());

        let start = Instant::now();
        client.wait_for_quota(&headers).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(950));
        assert!(elapsed < Duration::from_secs(5));
    }
}
