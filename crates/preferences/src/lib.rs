pub mod store;

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

pub use store::{migrate, KeyValueStore, MemoryStore, SqliteStore};

pub const FAVORITES_KEY: &str = "favorites";
pub const DARK_MODE_KEY: &str = "dark-mode";

/// 設定値の読み書きの失敗
///
/// 画面には出さない。読み込み時は既定値に戻し、書き込み時はログだけ残す。
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("malformed value for {key}: {source}")]
    Malformed {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// お気に入りとダークモードの設定
///
/// 起動時に一度だけ読み込み、変更のたびに書き戻す。
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
    favorites: HashSet<String>,
    dark_mode: bool,
}

impl Preferences {
    /// ストアから読み込む。値がない・壊れている場合は
    /// お気に入りは空、ダークモードは `platform_prefers_dark` になる
    pub async fn load(store: Arc<dyn KeyValueStore>, platform_prefers_dark: bool) -> Self {
        let favorites = match read_json::<Vec<String>>(store.as_ref(), FAVORITES_KEY).await {
            Ok(Some(ids)) => ids.into_iter().collect(),
            Ok(None) => HashSet::new(),
            Err(e) => {
                tracing::warn!("Falling back to empty favorites: {}", e);
                HashSet::new()
            }
        };

        let dark_mode = match read_json::<bool>(store.as_ref(), DARK_MODE_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => platform_prefers_dark,
            Err(e) => {
                tracing::warn!("Falling back to platform theme preference: {}", e);
                platform_prefers_dark
            }
        };

        tracing::debug!(
            "Preferences loaded ({} favorites, dark_mode={})",
            favorites.len(),
            dark_mode
        );

        Self {
            store,
            favorites,
            dark_mode,
        }
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.contains(id)
    }

    pub fn favorites(&self) -> &HashSet<String> {
        &self.favorites
    }

    pub fn favorite_count(&self) -> usize {
        self.favorites.len()
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    /// お気に入りを付け外しし、変更後に登録されているかを返す
    pub async fn toggle_favorite(&mut self, id: &str) -> bool {
        let now_favorite = if self.favorites.remove(id) {
            false
        } else {
            self.favorites.insert(id.to_string());
            true
        };

        let mut ids: Vec<&String> = self.favorites.iter().collect();
        ids.sort();
        self.write_json(FAVORITES_KEY, &ids).await;

        now_favorite
    }

    pub async fn set_dark_mode(&mut self, enabled: bool) {
        self.dark_mode = enabled;
        self.write_json(DARK_MODE_KEY, &enabled).await;
    }

    pub async fn toggle_dark_mode(&mut self) -> bool {
        let enabled = !self.dark_mode;
        self.set_dark_mode(enabled).await;
        enabled
    }

    /// 書き込みはベストエフォート。失敗してもメモリ上の値はそのまま使う
    async fn write_json<T: serde::Serialize + ?Sized>(&self, key: &'static str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to encode {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.set(key, &raw).await {
            tracing::warn!("Failed to save {}: {}", key, e);
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &'static str,
) -> Result<Option<T>, PersistenceError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| PersistenceError::Malformed { key, source })
}
