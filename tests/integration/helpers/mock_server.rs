use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        RawQuery, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

const DROP_SIGNAL: &str = "__drop__";

/// 投稿 API とプッシュチャネルを模したバックエンド
pub struct MockServer {
    pub port: u16,
    state: Arc<Shared>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

struct Shared {
    queries: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<(StatusCode, serde_json::Value)>>,
    refresh_status: Mutex<StatusCode>,
    refresh_calls: Mutex<usize>,
    sessions: Mutex<usize>,
    active: Mutex<usize>,
    frames: broadcast::Sender<String>,
}

impl MockServer {
    pub async fn start() -> Self {
        let (frames, _) = broadcast::channel(64);
        let state = Arc::new(Shared {
            queries: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            refresh_status: Mutex::new(StatusCode::OK),
            refresh_calls: Mutex::new(0),
            sessions: Mutex::new(0),
            active: Mutex::new(0),
            frames,
        });

        let app = Router::new()
            .route("/api/posts", get(handle_posts))
            .route("/api/refresh", post(handle_refresh))
            .route("/socket.io/", get(handle_socket))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    rx.await.ok();
                })
                .await
                .unwrap();
        });

        MockServer {
            port,
            state,
            shutdown_tx: Some(tx),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// 次の `/api/posts` の応答を積む。空なら投稿 0 件の成功を返す
    pub fn push_response(&self, status: StatusCode, body: serde_json::Value) {
        self.state
            .responses
            .lock()
            .unwrap()
            .push_back((status, body));
    }

    /// 受け取ったクエリ文字列 (到着順)
    pub fn queries(&self) -> Vec<String> {
        self.state.queries.lock().unwrap().clone()
    }

    pub fn set_refresh_status(&self, status: StatusCode) {
        *self.state.refresh_status.lock().unwrap() = status;
    }

    pub fn refresh_calls(&self) -> usize {
        *self.state.refresh_calls.lock().unwrap()
    }

    /// これまでに Socket.IO の接続まで済んだ回数
    pub fn sessions(&self) -> usize {
        *self.state.sessions.lock().unwrap()
    }

    /// 現在つながっている WebSocket の数
    pub fn active_sockets(&self) -> usize {
        *self.state.active.lock().unwrap()
    }

    pub fn emit(&self, event: &str, data: serde_json::Value) {
        let frame = format!("42{}", serde_json::json!([event, data]));
        let _ = self.state.frames.send(frame);
    }

    /// 全ソケットを一方的に切る
    pub fn drop_sockets(&self) {
        let _ = self.state.frames.send(DROP_SIGNAL.to_string());
    }

    /// Socket.IO の disconnect パケットを送る (ソケットは開いたまま)
    pub fn disconnect_clients(&self) {
        let _ = self.state.frames.send("41".to_string());
    }

    pub async fn wait_for_sessions(&self, count: usize) {
        wait_until(|| self.sessions() >= count).await;
    }

    pub async fn wait_for_active(&self, count: usize) {
        wait_until(|| self.active_sockets() == count).await;
    }

    pub async fn wait_for_queries(&self, count: usize) {
        wait_until(|| self.queries().len() >= count).await;
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("mock server condition not reached");
}

pub fn posts_body(ids: &[&str], total_pages: u32, page: u32) -> serde_json::Value {
    let posts: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "reddit_id": id,
                "title": format!("Post {}", id),
                "content": "Claude helped me refactor a parser",
                "subreddit": "ClaudeAI",
                "author": "tester",
                "url": format!("https://reddit.com/r/ClaudeAI/comments/{}", id),
                "upvotes": 42,
                "num_comments": 7,
                "created_at": "2024-06-01T10:00:00Z"
            })
        })
        .collect();

    serde_json::json!({
        "success": true,
        "posts": posts,
        "pagination": {
            "total": u64::from(total_pages) * 20,
            "totalPages": total_pages,
            "hasPrev": page > 1,
            "hasNext": page < total_pages
        },
        "lastUpdated": "2024-06-01T12:34:56Z"
    })
}

async fn handle_posts(
    State(state): State<Arc<Shared>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    state
        .queries
        .lock()
        .unwrap()
        .push(query.unwrap_or_default());

    let next = state.responses.lock().unwrap().pop_front();
    let (status, body) = next.unwrap_or_else(|| (StatusCode::OK, posts_body(&[], 0, 1)));
    (status, Json(body))
}

async fn handle_refresh(State(state): State<Arc<Shared>>) -> StatusCode {
    *state.refresh_calls.lock().unwrap() += 1;
    *state.refresh_status.lock().unwrap()
}

async fn handle_socket(
    State(state): State<Arc<Shared>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

/// Engine.IO v4 / Socket.IO v4 のサーバー側 (WebSocket トランスポートのみ)
async fn serve_socket(mut socket: WebSocket, state: Arc<Shared>) {
    *state.active.lock().unwrap() += 1;
    let mut frames = state.frames.subscribe();

    let open = r#"0{"sid":"mock-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
    if socket.send(Message::Text(open.to_string())).await.is_err() {
        *state.active.lock().unwrap() -= 1;
        return;
    }

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) if frame == DROP_SIGNAL => break,
                Ok(frame) => {
                    if socket.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match text.as_str() {
                    "40" => {
                        if socket
                            .send(Message::Text(r#"40{"sid":"mock-socket"}"#.to_string()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                        *state.sessions.lock().unwrap() += 1;
                    }
                    "41" => break,
                    _ => {}
                },
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    *state.active.lock().unwrap() -= 1;
}
