use chrono::{DateTime, Utc};
use feed_core::{FeedStats, Pagination, Post, QueryParams};
use std::collections::HashSet;

pub const NO_POSTS_TITLE: &str = "No posts found";
pub const EMPTY_FAVORITES_HINT: &str = "You haven't favorited any posts yet";
pub const EMPTY_SEARCH_HINT: &str = "Try adjusting your search or check back later";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedPost {
    pub post: Post,
    pub favorite: bool,
}

/// 画面に何を出すか (上から優先)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Loading,
    Error(String),
    Empty { favorites_only: bool },
    Posts,
}

impl DisplayState {
    pub fn empty_hint(favorites_only: bool) -> &'static str {
        if favorites_only {
            EMPTY_FAVORITES_HINT
        } else {
            EMPTY_SEARCH_HINT
        }
    }
}

/// コーディネーターが公開する表示用の状態
///
/// 取得結果 (投稿とページネーション) は常にまとめて差し替わる。
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub query: QueryParams,
    /// 入力中の検索語 (確定前)
    pub search_input: String,
    /// お気に入りフィルタ適用後の投稿
    pub posts: Vec<DisplayedPost>,
    /// 直近の取得で読み込んだ件数 (フィルタ前)
    pub loaded_count: usize,
    pub pagination: Pagination,
    pub loading: bool,
    pub error: Option<String>,
    pub favorites_only: bool,
    pub favorite_count: usize,
    pub dark_mode: bool,
    pub connection: ConnectionState,
    pub stats: Option<FeedStats>,
}

impl ViewSnapshot {
    pub fn display(&self) -> DisplayState {
        if self.loading {
            DisplayState::Loading
        } else if let Some(message) = &self.error {
            DisplayState::Error(message.clone())
        } else if self.posts.is_empty() {
            DisplayState::Empty {
                favorites_only: self.favorites_only,
            }
        } else {
            DisplayState::Posts
        }
    }

    /// お気に入りのみ表示中は、現在のページにしか効かないのでページ送りを隠す
    pub fn shows_pagination(&self) -> bool {
        self.pagination.total_pages > 1 && !self.favorites_only
    }

    /// ページ送りを受け付けるか。読み込み中・エラー表示中は直前の結果の
    /// ページ数しか分からないので受け付けない
    pub fn can_navigate(&self) -> bool {
        !self.loading && self.error.is_none() && self.shows_pagination()
    }

    pub fn can_go_prev(&self) -> bool {
        self.can_navigate() && self.query.page > 1 && self.pagination.has_prev
    }

    pub fn can_go_next(&self) -> bool {
        self.can_navigate()
            && self.query.page < self.pagination.total_pages
            && self.pagination.has_next
    }
}

/// コーディネーターが所有する状態本体
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub query: QueryParams,
    pub search_input: String,
    pub loaded: Vec<Post>,
    pub pagination: Pagination,
    pub loading: bool,
    pub error: Option<String>,
    pub favorites_only: bool,
    pub connection: ConnectionState,
    pub stats: Option<FeedStats>,
}

impl ViewState {
    pub fn snapshot(&self, favorites: &HashSet<String>, dark_mode: bool) -> ViewSnapshot {
        ViewSnapshot {
            query: self.query.clone(),
            search_input: self.search_input.clone(),
            posts: filter_favorites(&self.loaded, favorites, self.favorites_only),
            loaded_count: self.loaded.len(),
            pagination: self.pagination.clone(),
            loading: self.loading,
            error: self.error.clone(),
            favorites_only: self.favorites_only,
            favorite_count: favorites.len(),
            dark_mode,
            connection: self.connection.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// 読み込み済みのページにだけお気に入りフィルタをかける
pub fn filter_favorites(
    posts: &[Post],
    favorites: &HashSet<String>,
    favorites_only: bool,
) -> Vec<DisplayedPost> {
    posts
        .iter()
        .filter_map(|post| {
            let favorite = favorites.contains(&post.id);
            if favorites_only && !favorite {
                return None;
            }
            Some(DisplayedPost {
                post: post.clone(),
                favorite,
            })
        })
        .collect()
}
