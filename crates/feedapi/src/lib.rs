pub mod error;

use async_trait::async_trait;
use feed_core::{FeedPage, PostsResponse, QueryParams};
use reqwest::{Client, StatusCode};

pub use error::FeedError;

/// ローカル開発時のバックエンド
pub const LOCAL_API_URL: &str = "http://localhost:3000";

/// 投稿一覧の取得元
///
/// 状態は持たない。結果の反映は呼び出し側が行う。
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(&self, query: &QueryParams, page_size: u32)
        -> Result<FeedPage, FeedError>;

    /// バックエンドに Reddit からの再取得を依頼する
    async fn trigger_refresh(&self) -> Result<(), FeedError>;
}

/// 実行ホストから API のベース URL を決める
///
/// - `localhost` で動いている場合はローカルのバックエンド
/// - それ以外は同一オリジン
pub fn resolve_api_base(page_host: &str, origin: &str) -> String {
    match page_host {
        "localhost" | "127.0.0.1" => LOCAL_API_URL.to_string(),
        _ => origin.trim_end_matches('/').to_string(),
    }
}

#[derive(Clone, Debug)]
pub struct HttpFeedClient {
    client: Client,
    base_url: String,
}

impl HttpFeedClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        // Remove trailing slash if present
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl FeedSource for HttpFeedClient {
    async fn fetch_page(
        &self,
        query: &QueryParams,
        page_size: u32,
    ) -> Result<FeedPage, FeedError> {
        let endpoint = format!("{}/api/posts", self.base_url);
        tracing::debug!(
            "GET {} (search={:?}, sortBy={}, sortOrder={}, page={})",
            endpoint,
            query.search,
            query.sort_field.as_str(),
            query.sort_order.as_str(),
            query.page
        );

        let res = self
            .client
            .get(&endpoint)
            .query(&query.to_query_pairs(page_size))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(FeedError::Network(format!(
                "posts request failed: {} - {}",
                status, text
            )));
        }

        let bytes = res.bytes().await?;
        parse_posts_body(&bytes)
    }

    async fn trigger_refresh(&self) -> Result<(), FeedError> {
        let endpoint = format!("{}/api/refresh", self.base_url);
        let res = self.client.post(&endpoint).send().await?;

        let status = res.status();
        if status.is_success() {
            tracing::debug!("Refresh accepted ({})", status);
            Ok(())
        } else {
            Err(FeedError::Network(refresh_failure(status)))
        }
    }
}

fn refresh_failure(status: StatusCode) -> String {
    format!("refresh request failed: {}", status)
}

/// 2xx で返ってきた本文を解釈する
pub fn parse_posts_body(body: &[u8]) -> Result<FeedPage, FeedError> {
    let res: PostsResponse = serde_json::from_slice(body)
        .map_err(|e| FeedError::Network(format!("invalid posts response: {}", e)))?;

    if !res.success {
        return Err(FeedError::Remote(
            res.error.unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }

    Ok(FeedPage {
        posts: res.posts,
        pagination: res.pagination,
        last_updated: res.last_updated,
    })
}
