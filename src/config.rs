use crate::coordinator::CoordinatorSettings;
use feed_core::PAGE_SIZE;
use realtime::ReconnectPolicy;
use std::time::Duration;

/// 起動時に環境変数から読み込む設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub page_host: String,
    pub origin: String,
    pub prefs_db_url: String,
    pub search_debounce: Duration,
    pub reconnect: ReconnectPolicy,
    pub prefers_dark: bool,
    pub enable_live: bool,
}

impl ViewerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` から値を引く。テストでは環境変数の代わりに HashMap を渡す
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let page_host = lookup("FEED_PAGE_HOST").unwrap_or_else(|| "localhost".to_string());
        let origin = lookup("FEED_ORIGIN").unwrap_or_else(|| format!("https://{}", page_host));
        let prefs_db_url = lookup("FEED_PREFS_DB_URL")
            .unwrap_or_else(|| "sqlite:data/preferences.db".to_string());

        let defaults = ReconnectPolicy::default();
        let search_debounce = lookup("FEED_SEARCH_DEBOUNCE_MS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(300));
        let max_attempts = lookup("FEED_RECONNECT_ATTEMPTS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_attempts);
        let delay = lookup("FEED_RECONNECT_DELAY_MS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.delay);

        let prefers_dark = platform_prefers_dark(
            lookup("FEED_PREFERS_DARK").as_deref(),
            lookup("COLORFGBG").as_deref(),
        );
        let enable_live = lookup("ENABLE_LIVE").unwrap_or_else(|| "true".to_string()) == "true";

        Self {
            page_host,
            origin,
            prefs_db_url,
            search_debounce,
            reconnect: ReconnectPolicy {
                max_attempts,
                delay,
            },
            prefers_dark,
            enable_live,
        }
    }

    /// API とプッシュチャネルの接続先
    pub fn api_base(&self) -> String {
        feedapi::resolve_api_base(&self.page_host, &self.origin)
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            search_debounce: self.search_debounce,
            page_size: PAGE_SIZE,
        }
    }
}

/// 環境側のテーマ設定 (保存値がないときの初期値)
///
/// 明示指定があればそれを使い、なければ端末の `COLORFGBG` の背景色から推測する。
pub fn platform_prefers_dark(explicit: Option<&str>, colorfgbg: Option<&str>) -> bool {
    if let Some(flag) = explicit.and_then(parse_flag) {
        return flag;
    }

    // "15;0" や "default;default;0" の形。最後の要素が背景色
    colorfgbg
        .and_then(|value| value.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok())
        .map(|bg| bg <= 6 || bg == 8)
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "dark" => Some(true),
        "0" | "false" | "no" | "light" => Some(false),
        _ => None,
    }
}
