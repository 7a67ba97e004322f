use thiserror::Error;

/// 一覧取得・リフレッシュ要求の失敗
///
/// `Display` はそのまま画面のエラー表示に使う。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// 通信失敗、または 2xx 以外のステータス。詳細はログ用
    #[error("Failed to fetch posts")]
    Network(String),
    /// サーバーが `success: false` を返した
    #[error("{0}")]
    Remote(String),
}

impl FeedError {
    pub fn detail(&self) -> &str {
        match self {
            FeedError::Network(detail) => detail,
            FeedError::Remote(message) => message,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Network(err.to_string())
    }
}
