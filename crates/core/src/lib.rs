pub mod query;
pub mod timestamp;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use query::{QueryParams, SortField, SortOrder, PAGE_SIZE};

/// 集約された Reddit 投稿 (サーバーが生成・更新し、クライアントは読み取りのみ)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "reddit_id")]
    pub id: String,
    pub title: String,
    #[serde(rename = "content", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub subreddit: String,
    pub author: String,
    pub url: String,
    #[serde(default)]
    pub upvotes: u64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

/// ページネーション情報。サーバーが算出した値をそのまま保持する
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub has_prev: bool,
    #[serde(default)]
    pub has_next: bool,
}

/// プッシュチャネルの `stats` イベントで届く集計値
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStats {
    #[serde(default)]
    pub total_posts: u64,
    #[serde(default)]
    pub posts_last24h: u64,
    #[serde(default)]
    pub posts_last_week: u64,
}

/// `GET /api/posts` のレスポンス型
///
/// 失敗時は `{ "success": false, "error": "..." }` だけが返るので、
/// それ以外のフィールドはすべて省略可能として扱う。
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 1 回の取得で得られる表示用のページ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
    pub last_updated: Option<DateTime<Utc>>,
}
