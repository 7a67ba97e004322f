//! Socket.IO v4 (Engine.IO v4, WebSocket トランスポート) のテキストフレーム
//!
//! 1 フレーム = Engine.IO パケット 1 つ。先頭 1 文字がパケット種別。
//! `4` (message) の中身がさらに Socket.IO パケットになっている。
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                    ping / pong
//! 40                                                       connect (default namespace)
//! 42["posts-updated",{...}]                                event
//! ```

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// ping が来ないまま切断とみなすまでの既定値 (ms)
pub const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;

pub const PONG: &str = "3";
pub const CONNECT: &str = "40";
pub const DISCONNECT: &str = "41";

/// Engine.IO の open パケットの中身
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect,
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(String),
    /// ack / binary など、このクライアントでは使わないもの
    Other(u8),
}

pub fn decode(frame: &str) -> Result<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or_else(|| anyhow!("empty frame"))?;
    let rest = chars.as_str();

    let packet = match kind {
        '0' => EnginePacket::Open(
            serde_json::from_str(rest).context("Failed to parse open packet")?,
        ),
        '1' => EnginePacket::Close,
        '2' => EnginePacket::Ping,
        '3' => EnginePacket::Pong,
        '4' => EnginePacket::Message(decode_socket(rest)?),
        '5' => EnginePacket::Upgrade,
        '6' => EnginePacket::Noop,
        other => bail!("unknown engine packet type: {:?}", other),
    };
    Ok(packet)
}

fn decode_socket(payload: &str) -> Result<SocketPacket> {
    let mut chars = payload.chars();
    let kind = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or_else(|| anyhow!("missing socket packet type"))? as u8;
    let body = skip_ack_id(skip_namespace(chars.as_str()));

    let packet = match kind {
        0 => SocketPacket::Connect,
        1 => SocketPacket::Disconnect,
        2 => decode_event(body)?,
        4 => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| body.to_string());
            SocketPacket::ConnectError(message)
        }
        other => SocketPacket::Other(other),
    };
    Ok(packet)
}

/// `/admin,["x"]` のような名前空間指定を読み飛ばす
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn skip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn decode_event(body: &str) -> Result<SocketPacket> {
    let mut items: Vec<Value> =
        serde_json::from_str(body).context("Failed to parse event payload")?;
    if items.is_empty() {
        bail!("event without name");
    }
    let name = match items.remove(0) {
        Value::String(name) => name,
        other => bail!("event name is not a string: {}", other),
    };
    let data = if items.is_empty() {
        Value::Null
    } else {
        items.remove(0)
    };
    Ok(SocketPacket::Event { name, data })
}

/// `http(s)://host` から Socket.IO の接続 URL を組み立てる
pub fn socket_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/socket.io/?EIO=4&transport=websocket", ws_base)
}
