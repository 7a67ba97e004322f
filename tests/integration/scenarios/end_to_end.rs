use crate::helpers::mock_server::{posts_body, MockServer};
use axum::http::StatusCode;
use feed_core::SortField;
use feedapi::HttpFeedClient;
use preferences::{MemoryStore, Preferences};
use realtime::ReconnectPolicy;
use reddit_feeds::coordinator::{Coordinator, CoordinatorHandle, CoordinatorSettings, ViewCommand};
use reddit_feeds::render;
use reddit_feeds::state::{DisplayState, ViewSnapshot, EMPTY_SEARCH_HINT, NO_POSTS_TITLE};
use std::sync::Arc;
use std::time::Duration;

fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        search_debounce: Duration::from_millis(50),
        ..CoordinatorSettings::default()
    }
}

async fn start(server: &MockServer, live: bool) -> CoordinatorHandle {
    let source = Arc::new(HttpFeedClient::new(reqwest::Client::new(), server.base_url()));
    let prefs = Preferences::load(Arc::new(MemoryStore::new()), false).await;
    let live = live.then(|| {
        realtime::subscribe(
            &server.base_url(),
            ReconnectPolicy {
                max_attempts: 3,
                delay: Duration::from_millis(50),
            },
        )
    });
    Coordinator::spawn(source, prefs, live, settings())
}

async fn wait_for<F>(handle: &CoordinatorHandle, predicate: F) -> ViewSnapshot
where
    F: Fn(&ViewSnapshot) -> bool,
{
    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for snapshot")
        .expect("coordinator stopped")
        .clone();
    snapshot
}

/// 観点: 検索語とソートを変えると、その条件の 1 ページ目が要求され空表示になるか
#[tokio::test]
async fn test_search_and_sort_to_empty_result() {
    let server = MockServer::start().await;
    server.push_response(StatusCode::OK, posts_body(&["t3_a"], 1, 1));
    let handle = start(&server, false).await;
    wait_for(&handle, |s| !s.loading && !s.posts.is_empty()).await;

    handle
        .send(ViewCommand::SetSortField(SortField::Upvotes))
        .await
        .unwrap();
    server.wait_for_queries(2).await;
    handle
        .send(ViewCommand::SetSearch("claude".to_string()))
        .await
        .unwrap();

    let snap = wait_for(&handle, |s| s.query.search == "claude" && !s.loading).await;
    assert_eq!(
        snap.display(),
        DisplayState::Empty {
            favorites_only: false
        }
    );
    assert_eq!(
        server.queries().last().map(String::as_str),
        Some("search=claude&sortBy=upvotes&sortOrder=desc&page=1&limit=20")
    );

    let text = render::render(&snap, chrono::Utc::now());
    assert!(text.contains(NO_POSTS_TITLE));
    assert!(text.contains(EMPTY_SEARCH_HINT));

    handle.shutdown().await;
}

/// 観点: データ更新通知で同じ条件 (page=3) を取り直し、最終更新時刻が反映されるか
#[tokio::test]
async fn test_posts_updated_refetches_current_page() {
    let server = MockServer::start().await;
    server.push_response(StatusCode::OK, posts_body(&["t3_a"], 5, 1));
    server.push_response(StatusCode::OK, posts_body(&["t3_c"], 5, 3));
    server.push_response(StatusCode::OK, posts_body(&["t3_c", "t3_new"], 5, 3));
    let handle = start(&server, true).await;

    wait_for(&handle, |s| s.connection.connected && !s.loading).await;
    server.wait_for_sessions(1).await;

    handle.send(ViewCommand::GoToPage(3)).await.unwrap();
    wait_for(&handle, |s| s.query.page == 3 && !s.loading).await;

    server.emit("posts-updated", serde_json::json!({ "newPosts": 1 }));
    let snap = wait_for(&handle, |s| !s.loading && s.posts.len() == 2).await;

    let queries = server.queries();
    assert_eq!(queries.len(), 3);
    assert_eq!(queries[1], queries[2]);
    assert!(queries[2].contains("sortBy=created_at"));
    assert!(queries[2].contains("page=3"));
    assert_eq!(
        snap.connection.last_updated.map(|t| t.to_rfc3339()),
        Some("2024-06-01T12:34:56+00:00".to_string())
    );

    server.emit(
        "stats",
        serde_json::json!({ "totalPosts": 100, "postsLast24h": 1, "postsLastWeek": 9 }),
    );
    let snap = wait_for(&handle, |s| s.stats.is_some()).await;
    assert!(render::render(&snap, chrono::Utc::now())
        .contains("Total: 100 posts | Last 24h: 1 new | Last 7d: 9 new"));

    handle.shutdown().await;
    server.wait_for_active(0).await;
}

/// 観点: サーバーエラーを表示し、Retry で同じ要求を出し直して復帰するか
#[tokio::test]
async fn test_error_then_retry() {
    let server = MockServer::start().await;
    server.push_response(
        StatusCode::OK,
        serde_json::json!({ "success": false, "error": "db down" }),
    );
    server.push_response(StatusCode::OK, posts_body(&["t3_a"], 1, 1));
    let handle = start(&server, false).await;

    let snap = wait_for(&handle, |s| s.error.is_some()).await;
    assert_eq!(snap.display(), DisplayState::Error("db down".to_string()));
    let text = render::render(&snap, chrono::Utc::now());
    assert!(text.contains("Failed to load posts"));
    assert!(text.contains("db down"));

    handle.send(ViewCommand::Retry).await.unwrap();
    let snap = wait_for(&handle, |s| !s.loading && s.error.is_none()).await;
    assert_eq!(snap.posts.len(), 1);

    let queries = server.queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0], queries[1]);

    handle.shutdown().await;
}

/// 観点: リフレッシュが受け付けられたら一覧を取り直すか
#[tokio::test]
async fn test_refresh_triggers_refetch() {
    let server = MockServer::start().await;
    let handle = start(&server, false).await;
    wait_for(&handle, |s| !s.loading).await;

    handle.send(ViewCommand::Refresh).await.unwrap();
    server.wait_for_queries(2).await;
    assert_eq!(server.refresh_calls(), 1);

    handle.shutdown().await;
}
