use crate::helpers::mock_server::{posts_body, MockServer};
use axum::http::StatusCode;
use feed_core::{QueryParams, SortField, PAGE_SIZE};
use feedapi::{FeedError, FeedSource, HttpFeedClient};

fn client(server: &MockServer) -> HttpFeedClient {
    HttpFeedClient::new(reqwest::Client::new(), format!("{}/", server.base_url()))
}

/// 観点: 検索語・ソート・ページ・件数がこの順でクエリ文字列に載るか
#[tokio::test]
async fn test_fetch_sends_exact_query_string() {
    let server = MockServer::start().await;
    let client = client(&server);

    let mut query = QueryParams::default();
    query.set_search("claude");
    query.set_sort_field(SortField::Upvotes);

    let page = client.fetch_page(&query, PAGE_SIZE).await.unwrap();

    assert_eq!(
        server.queries(),
        vec!["search=claude&sortBy=upvotes&sortOrder=desc&page=1&limit=20".to_string()]
    );
    assert!(page.posts.is_empty());
    assert_eq!(page.pagination.total_pages, 0);
}

/// 観点: 空白を含む検索語がエンコードされ、投稿とメタ情報が読めるか
#[tokio::test]
async fn test_fetch_parses_posts() {
    let server = MockServer::start().await;
    server.push_response(StatusCode::OK, posts_body(&["t3_a", "t3_b"], 3, 2));
    let client = client(&server);

    let mut query = QueryParams::default();
    query.set_search("claude code");
    query.page = 2;

    let page = client.fetch_page(&query, PAGE_SIZE).await.unwrap();

    assert_eq!(
        server.queries()[0],
        "search=claude+code&sortBy=created_at&sortOrder=desc&page=2&limit=20"
    );
    assert_eq!(page.posts.len(), 2);
    assert_eq!(page.posts[0].id, "t3_a");
    assert_eq!(page.posts[0].subreddit, "ClaudeAI");
    assert_eq!(page.pagination.total_pages, 3);
    assert!(page.pagination.has_prev && page.pagination.has_next);
    assert_eq!(
        page.last_updated.map(|t| t.to_rfc3339()),
        Some("2024-06-01T12:34:56+00:00".to_string())
    );
}

/// 観点: 2xx 以外はネットワークエラー (画面には固定文言)
#[tokio::test]
async fn test_http_error_maps_to_network() {
    let server = MockServer::start().await;
    server.push_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!({ "success": false, "error": "boom" }),
    );

    let err = client(&server)
        .fetch_page(&QueryParams::default(), PAGE_SIZE)
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::Network(_)));
    assert_eq!(err.to_string(), "Failed to fetch posts");
}

/// 観点: success: false はサーバーのメッセージがそのまま出る
#[tokio::test]
async fn test_remote_failure_message() {
    let server = MockServer::start().await;
    server.push_response(
        StatusCode::OK,
        serde_json::json!({ "success": false, "error": "db down" }),
    );

    let err = client(&server)
        .fetch_page(&QueryParams::default(), PAGE_SIZE)
        .await
        .unwrap_err();

    assert_eq!(err, FeedError::Remote("db down".to_string()));
    assert_eq!(err.to_string(), "db down");
}

/// 観点: リフレッシュ要求の成否
#[tokio::test]
async fn test_trigger_refresh() {
    let server = MockServer::start().await;
    let client = client(&server);

    client.trigger_refresh().await.unwrap();

    server.set_refresh_status(StatusCode::SERVICE_UNAVAILABLE);
    let err = client.trigger_refresh().await.unwrap_err();
    assert!(matches!(err, FeedError::Network(_)));
    assert_eq!(server.refresh_calls(), 2);
}
