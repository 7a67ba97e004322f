pub mod commands;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod render;
pub mod state;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub async fn connect_database(url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    Ok(pool)
}
