//! 一覧取得のクエリパラメータと、その状態遷移
//!
//! - 検索語・ソート項目・ソート順が変わったらページは 1 に戻す
//! - ページだけが変わった場合は他の項目を保持する

/// 1 ページあたりの件数 (固定)
pub const PAGE_SIZE: u32 = 20;

/// ソート項目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Upvotes,
    NumComments,
}

impl SortField {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(Self::CreatedAt),
            "upvotes" => Some(Self::Upvotes),
            "num_comments" => Some(Self::NumComments),
            _ => None,
        }
    }

    /// `sortBy` に載せる値
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Upvotes => "upvotes",
            Self::NumComments => "num_comments",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CreatedAt => "Newest",
            Self::Upvotes => "Most Upvoted",
            Self::NumComments => "Most Comments",
        }
    }
}

/// ソート順
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub search: String,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub page: u32,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort_field: SortField::default(),
            sort_order: SortOrder::default(),
            page: 1,
        }
    }
}

impl QueryParams {
    /// 検索語を更新する。値が変わった場合のみ `true` を返し、ページを 1 に戻す
    pub fn set_search(&mut self, search: &str) -> bool {
        if self.search == search {
            return false;
        }
        self.search = search.to_string();
        self.page = 1;
        true
    }

    pub fn set_sort_field(&mut self, field: SortField) -> bool {
        if self.sort_field == field {
            return false;
        }
        self.sort_field = field;
        self.page = 1;
        true
    }

    pub fn set_sort_order(&mut self, order: SortOrder) -> bool {
        if self.sort_order == order {
            return false;
        }
        self.sort_order = order;
        self.page = 1;
        true
    }

    /// ページを `[1, total_pages]` に丸めて設定する (他の項目はそのまま)
    ///
    /// まだ一度も取得していない (`total_pages == 0`) 場合は 1 ページ目に固定される。
    pub fn set_page(&mut self, page: u32, total_pages: u32) -> bool {
        let clamped = clamp_page(page, total_pages);
        if self.page == clamped {
            return false;
        }
        self.page = clamped;
        true
    }

    /// `GET /api/posts` のクエリ文字列 (順序も含めて固定)
    pub fn to_query_pairs(&self, limit: u32) -> Vec<(&'static str, String)> {
        vec![
            ("search", self.search.clone()),
            ("sortBy", self.sort_field.as_str().to_string()),
            ("sortOrder", self.sort_order.as_str().to_string()),
            ("page", self.page.to_string()),
            ("limit", limit.to_string()),
        ]
    }
}

pub fn clamp_page(page: u32, total_pages: u32) -> u32 {
    page.clamp(1, total_pages.max(1))
}
