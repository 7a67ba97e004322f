pub mod protocol;

use feed_core::FeedStats;
use futures_util::{SinkExt, StreamExt};
use protocol::{EnginePacket, SocketPacket};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// データ更新の通知イベント名
pub const EVENT_POSTS_UPDATED: &str = "posts-updated";
/// 集計値の通知イベント名
pub const EVENT_STATS: &str = "stats";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 64;

/// 再接続の方針 (固定間隔・回数上限つき)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    Connected,
    Disconnected,
    /// 一覧が変わった。中身は信用せず、再取得のきっかけとしてだけ使う
    DataChanged,
    Stats(FeedStats),
}

/// プッシュチャネルの購読ハンドル
///
/// `dispose` するか drop するとバックグラウンドの接続は閉じられ、以後イベントは届かない。
pub struct LiveSubscription {
    events: mpsc::Receiver<LiveEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveSubscription {
    /// 既存のチャネルをそのまま購読として扱う (接続タスクなし)
    pub fn from_receiver(events: mpsc::Receiver<LiveEvent>) -> Self {
        Self {
            events,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub async fn recv(&mut self) -> Option<LiveEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.events.recv().await
    }

    pub async fn dispose(mut self) {
        self.cancel.cancel();
        self.events.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Live channel task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// バックエンドのプッシュチャネルに接続し、イベントを受け取り続ける
///
/// 接続が切れた場合は `policy` に従って再接続する。一度でも接続に成功すると
/// 試行回数はリセットされる。上限に達したら諦め、購読側には `None` が返る。
/// サーバーから disconnect / close が来た場合は再接続せずに終わる。
pub fn subscribe(base_url: &str, policy: ReconnectPolicy) -> LiveSubscription {
    let url = protocol::socket_url(base_url);
    let (tx, events) = mpsc::channel(EVENT_BUFFER);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(url, policy, tx, cancel.clone()));

    LiveSubscription {
        events,
        cancel,
        task: Some(task),
    }
}

async fn run(
    url: String,
    policy: ReconnectPolicy,
    tx: mpsc::Sender<LiveEvent>,
    cancel: CancellationToken,
) {
    tracing::info!("Connecting to live channel at {}", url);

    let mut attempts: u32 = 0;

    loop {
        match run_session(&url, &tx, &cancel).await {
            SessionEnd::Cancelled => return,
            SessionEnd::ClosedByServer { was_connected } => {
                // サーバーが明示的に切った場合は張り直さない
                tracing::info!("Live channel closed by server; not reconnecting");
                if was_connected {
                    deliver(&tx, &cancel, LiveEvent::Disconnected).await;
                }
                return;
            }
            SessionEnd::Dropped { was_connected } => {
                if was_connected {
                    attempts = 0;
                    if !deliver(&tx, &cancel, LiveEvent::Disconnected).await {
                        return;
                    }
                }
            }
        }

        attempts += 1;
        if attempts > policy.max_attempts {
            tracing::warn!(
                "Live channel gave up after {} reconnection attempts",
                policy.max_attempts
            );
            return;
        }

        tracing::info!(
            "Reconnecting live channel in {:?} (attempt {}/{})",
            policy.delay,
            attempts,
            policy.max_attempts
        );
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(policy.delay) => {}
        }
    }
}

enum SessionEnd {
    Cancelled,
    /// Socket.IO の disconnect か Engine.IO の close を受け取った
    ClosedByServer { was_connected: bool },
    Dropped { was_connected: bool },
}

async fn deliver(
    tx: &mpsc::Sender<LiveEvent>,
    cancel: &CancellationToken,
    event: LiveEvent,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}

/// 1 本の WebSocket 接続を、切れるか購読が破棄されるまで処理する
async fn run_session(
    url: &str,
    tx: &mpsc::Sender<LiveEvent>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let connecting = tokio::select! {
        _ = cancel.cancelled() => return SessionEnd::Cancelled,
        res = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url)) => res,
    };

    let ws = match connecting {
        Ok(Ok((ws, _response))) => ws,
        Ok(Err(e)) => {
            tracing::warn!("Failed to connect to live channel: {}", e);
            return SessionEnd::Dropped {
                was_connected: false,
            };
        }
        Err(_) => {
            tracing::warn!("Live channel connect timed out ({:?})", CONNECT_TIMEOUT);
            return SessionEnd::Dropped {
                was_connected: false,
            };
        }
    };

    let (mut sink, mut stream) = ws.split();
    let mut connected = false;
    // open パケットを受け取るまでは既定の ping 間隔で待つ
    let mut idle = Duration::from_millis(
        protocol::DEFAULT_PING_INTERVAL_MS + protocol::DEFAULT_PING_TIMEOUT_MS,
    );

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Text(protocol::DISCONNECT.into())).await;
                let _ = sink.close().await;
                return SessionEnd::Cancelled;
            }
            next = tokio::time::timeout(idle, stream.next()) => next,
        };

        let frame = match next {
            Ok(Some(Ok(Message::Text(text)))) => text,
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                tracing::info!("Live channel closed by server");
                break;
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => {
                tracing::warn!("Live channel read error: {}", e);
                break;
            }
            Err(_) => {
                // ping が途絶えた = ゾンビ接続とみなして張り直す
                tracing::warn!(
                    "Live channel silent for {}s. Reconnecting...",
                    idle.as_secs()
                );
                break;
            }
        };

        let packet = match protocol::decode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!("Ignoring live channel frame: {:#}", e);
                continue;
            }
        };

        match packet {
            EnginePacket::Open(handshake) => {
                idle = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
                tracing::debug!("Live channel handshake (sid={})", handshake.sid);
                if let Err(e) = sink.send(Message::Text(protocol::CONNECT.into())).await {
                    tracing::warn!("Failed to join live channel: {}", e);
                    break;
                }
            }
            EnginePacket::Ping => {
                if let Err(e) = sink.send(Message::Text(protocol::PONG.into())).await {
                    tracing::warn!("Failed to answer ping: {}", e);
                    break;
                }
            }
            EnginePacket::Close | EnginePacket::Message(SocketPacket::Disconnect) => {
                tracing::info!("Live channel disconnected by server");
                let _ = sink.close().await;
                return SessionEnd::ClosedByServer {
                    was_connected: connected,
                };
            }
            EnginePacket::Message(SocketPacket::Connect) => {
                if !connected {
                    connected = true;
                    tracing::info!("Live channel connected");
                    if !deliver(tx, cancel, LiveEvent::Connected).await {
                        return SessionEnd::Cancelled;
                    }
                }
            }
            EnginePacket::Message(SocketPacket::ConnectError(message)) => {
                tracing::warn!("Live channel rejected connection: {}", message);
                break;
            }
            EnginePacket::Message(SocketPacket::Event { name, data }) => {
                let event = match name.as_str() {
                    EVENT_POSTS_UPDATED => {
                        tracing::debug!("Posts updated: {}", data);
                        Some(LiveEvent::DataChanged)
                    }
                    EVENT_STATS => match serde_json::from_value::<FeedStats>(data) {
                        Ok(stats) => Some(LiveEvent::Stats(stats)),
                        Err(e) => {
                            tracing::warn!("Malformed stats event: {}", e);
                            None
                        }
                    },
                    _ => None,
                };
                if let Some(event) = event {
                    if !deliver(tx, cancel, event).await {
                        return SessionEnd::Cancelled;
                    }
                }
            }
            EnginePacket::Message(SocketPacket::Other(_))
            | EnginePacket::Pong
            | EnginePacket::Upgrade
            | EnginePacket::Noop => {}
        }
    }

    SessionEnd::Dropped {
        was_connected: connected,
    }
}
