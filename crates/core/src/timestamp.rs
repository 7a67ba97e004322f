//! サーバーが返す日時文字列の読み取り
//!
//! RFC 3339 のほか、オフセットなしの ISO-8601 (`2024-06-01T12:00:00`) や
//! SQLite の `datetime()` 形式 (`2024-06-01 12:00:00`) も来る。オフセットがなければ UTC とみなす。

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // "2024-06-01 12:00:00+09:00" のように区切りが空白のもの
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// 必須の日時。読めなければその値ごとエラー
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {:?}", raw)))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Text(String),
    Other(IgnoredAny),
}

/// 任意の日時。型違いや読めない文字列は `None` にする
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Lenient>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Lenient::Text(text)) => parse(&text),
        Some(Lenient::Other(_)) | None => None,
    })
}
