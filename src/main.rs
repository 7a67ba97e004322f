use reddit_feeds::commands::{self, Input};
use reddit_feeds::config::ViewerConfig;
use reddit_feeds::coordinator::{Coordinator, CoordinatorHandle};
use reddit_feeds::render;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // 標準出力は画面描画に使うので、ログは標準エラーへ
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Log initialized");

    let config = ViewerConfig::from_env();
    let api_base = config.api_base();
    tracing::info!("Using API base: {}", api_base);

    // Initialize Preferences Database
    tracing::info!("Connecting to preferences database: {}", config.prefs_db_url);
    let prefs_db = reddit_feeds::connect_database(&config.prefs_db_url).await?;
    preferences::migrate(&prefs_db).await?;
    let prefs = preferences::Preferences::load(
        Arc::new(preferences::SqliteStore::new(prefs_db)),
        config.prefers_dark,
    )
    .await;

    // Initialize HTTP Client
    let http_client = reqwest::Client::builder()
        .user_agent("RedditFeedViewer/1.0")
        .build()?;
    let source = Arc::new(feedapi::HttpFeedClient::new(http_client, api_base.clone()));

    let live = if config.enable_live {
        Some(realtime::subscribe(&api_base, config.reconnect))
    } else {
        tracing::info!("Live updates are disabled (ENABLE_LIVE != true)");
        None
    };

    let handle = Coordinator::spawn(source, prefs, live, config.coordinator_settings());

    let renderer = {
        let mut snapshots = handle.subscribe();
        tokio::spawn(async move {
            loop {
                let text = render::render(&snapshots.borrow_and_update(), chrono::Utc::now());
                println!("{}", text);
                if snapshots.changed().await.is_err() {
                    break;
                }
            }
        })
    };

    println!("{}", commands::HELP);
    run_input_loop(&handle).await?;

    handle.shutdown().await;
    renderer.abort();
    tracing::info!("Bye");

    Ok(())
}

async fn run_input_loop(handle: &CoordinatorHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match commands::parse_line(&line) {
            Ok(Some(Input::Command(command))) => handle.send(command).await?,
            Ok(Some(Input::Help)) => println!("{}", commands::HELP),
            Ok(Some(Input::Quit)) => break,
            Ok(None) => {}
            Err(e) => eprintln!("{}", e),
        }
    }

    Ok(())
}
