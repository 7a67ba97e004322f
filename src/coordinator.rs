//! 一覧画面の状態管理
//!
//! クエリ (検索語・ソート・ページ) を持ち、変わるたびに取得し直す。
//! 状態を書き換えるのはコーディネーターのタスクだけで、取得は別タスクで走らせて
//! 結果をチャネル経由で受け取る。取得には連番を振り、最後に発行したもの以外の
//! 結果は捨てる。

use crate::debounce::Debouncer;
use crate::state::{ViewSnapshot, ViewState};
use anyhow::{anyhow, Result};
use chrono::Utc;
use feed_core::{FeedPage, SortField, SortOrder, PAGE_SIZE};
use feedapi::{FeedError, FeedSource};
use preferences::Preferences;
use realtime::{LiveEvent, LiveSubscription};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const COMMAND_BUFFER: usize = 32;

/// ユーザー操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    /// 入力中の検索語 (デバウンス後に確定)
    SetSearch(String),
    SetSortField(SortField),
    SetSortOrder(SortOrder),
    ToggleSortOrder,
    NextPage,
    PrevPage,
    GoToPage(u32),
    ToggleFavoritesOnly,
    ToggleFavorite(String),
    ToggleDarkMode,
    /// 同じ条件でもう一度取得する
    Retry,
    /// バックエンドに再収集を依頼し、受け付けられたら取得し直す
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub search_debounce: Duration,
    pub page_size: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(300),
            page_size: PAGE_SIZE,
        }
    }
}

/// 起動中のコーディネーターへの窓口
pub struct CoordinatorHandle {
    commands: mpsc::Sender<ViewCommand>,
    snapshots: watch::Receiver<ViewSnapshot>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    pub async fn send(&self, command: ViewCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("coordinator has stopped"))
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.snapshots.borrow().clone()
    }

    /// 停止して後片付けが終わるまで待つ。以後状態は変わらない
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("Coordinator task failed: {}", e);
        }
    }
}

struct FetchOutcome {
    seq: u64,
    result: Result<FeedPage, FeedError>,
}

pub struct Coordinator {
    source: Arc<dyn FeedSource>,
    prefs: Preferences,
    settings: CoordinatorSettings,
    state: ViewState,
    search: Debouncer<String>,
    snapshots: watch::Sender<ViewSnapshot>,
    latest_seq: u64,
    in_flight: Option<JoinHandle<()>>,
    results_tx: mpsc::UnboundedSender<FetchOutcome>,
    results_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    refresh_task: Option<JoinHandle<()>>,
    refresh_tx: mpsc::UnboundedSender<Result<(), FeedError>>,
    refresh_rx: mpsc::UnboundedReceiver<Result<(), FeedError>>,
}

impl Coordinator {
    pub fn new(
        source: Arc<dyn FeedSource>,
        prefs: Preferences,
        settings: CoordinatorSettings,
    ) -> Self {
        // 最初の取得が終わるまでは読み込み中
        let state = ViewState {
            loading: true,
            ..ViewState::default()
        };
        let (snapshots, _) = watch::channel(state.snapshot(prefs.favorites(), prefs.dark_mode()));
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();

        Self {
            source,
            prefs,
            settings,
            state,
            search: Debouncer::new(settings.search_debounce),
            snapshots,
            latest_seq: 0,
            in_flight: None,
            results_tx,
            results_rx,
            refresh_task: None,
            refresh_tx,
            refresh_rx,
        }
    }

    /// タスクとして起動し、すぐに初回の取得を行う
    pub fn spawn(
        source: Arc<dyn FeedSource>,
        prefs: Preferences,
        live: Option<LiveSubscription>,
        settings: CoordinatorSettings,
    ) -> CoordinatorHandle {
        let coordinator = Self::new(source, prefs, settings);
        let snapshots = coordinator.snapshots.subscribe();
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(coordinator.run(commands_rx, live, cancel.clone()));

        CoordinatorHandle {
            commands,
            snapshots,
            cancel,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ViewCommand>,
        mut live: Option<LiveSubscription>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Coordinator started");
        self.issue_fetch();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                search = self.search.settled() => self.apply_search(&search),
                Some(outcome) = self.results_rx.recv() => self.apply_fetch(outcome),
                Some(result) = self.refresh_rx.recv() => self.apply_refresh(result),
                event = next_live_event(&mut live) => match event {
                    Some(event) => self.handle_live(event),
                    None => {
                        tracing::info!("Live channel ended; continuing without live updates");
                        live = None;
                    }
                },
            }
        }

        self.teardown(live).await;
    }

    async fn handle_command(&mut self, command: ViewCommand) {
        tracing::debug!("Command: {:?}", command);

        match command {
            ViewCommand::SetSearch(text) => {
                self.state.search_input = text.clone();
                self.search.push(text);
                self.publish();
            }
            ViewCommand::SetSortField(field) => {
                if self.state.query.set_sort_field(field) {
                    self.issue_fetch();
                }
            }
            ViewCommand::SetSortOrder(order) => {
                if self.state.query.set_sort_order(order) {
                    self.issue_fetch();
                }
            }
            ViewCommand::ToggleSortOrder => {
                let order = self.state.query.sort_order.flipped();
                if self.state.query.set_sort_order(order) {
                    self.issue_fetch();
                }
            }
            ViewCommand::NextPage => {
                if self.current_snapshot().can_go_next() {
                    self.go_to_page(self.state.query.page + 1);
                }
            }
            ViewCommand::PrevPage => {
                if self.current_snapshot().can_go_prev() {
                    self.go_to_page(self.state.query.page - 1);
                }
            }
            ViewCommand::GoToPage(page) => {
                if self.current_snapshot().can_navigate() {
                    self.go_to_page(page);
                }
            }
            ViewCommand::ToggleFavoritesOnly => {
                // 取得済みのページに対する絞り込みだけ。取得し直さない
                self.state.favorites_only = !self.state.favorites_only;
                self.publish();
            }
            ViewCommand::ToggleFavorite(id) => {
                let now_favorite = self.prefs.toggle_favorite(&id).await;
                tracing::debug!("Favorite {} -> {}", id, now_favorite);
                self.publish();
            }
            ViewCommand::ToggleDarkMode => {
                let enabled = self.prefs.toggle_dark_mode().await;
                tracing::debug!("Dark mode -> {}", enabled);
                self.publish();
            }
            ViewCommand::Retry => self.issue_fetch(),
            ViewCommand::Refresh => self.start_refresh(),
        }
    }

    fn go_to_page(&mut self, page: u32) {
        let total_pages = self.state.pagination.total_pages;
        if self.state.query.set_page(page, total_pages) {
            self.issue_fetch();
        }
    }

    fn apply_search(&mut self, search: &str) {
        if self.state.query.set_search(search) {
            self.issue_fetch();
        }
    }

    /// 現在のクエリで取得を始める。実行中の取得は中断し、その結果は使わない
    fn issue_fetch(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            previous.abort();
        }

        self.latest_seq += 1;
        let seq = self.latest_seq;
        self.state.loading = true;
        self.state.error = None;
        self.publish();

        let source = Arc::clone(&self.source);
        let query = self.state.query.clone();
        let page_size = self.settings.page_size;
        let results = self.results_tx.clone();

        tracing::debug!("Fetch #{} {:?}", seq, query);
        self.in_flight = Some(tokio::spawn(async move {
            let result = source.fetch_page(&query, page_size).await;
            let _ = results.send(FetchOutcome { seq, result });
        }));
    }

    fn apply_fetch(&mut self, outcome: FetchOutcome) {
        if outcome.seq != self.latest_seq {
            tracing::debug!(
                "Discarding stale response #{} (latest #{})",
                outcome.seq,
                self.latest_seq
            );
            return;
        }

        self.in_flight = None;
        self.state.loading = false;

        match outcome.result {
            Ok(page) => {
                tracing::info!(
                    "Loaded {} posts (page {} of {}, total {})",
                    page.posts.len(),
                    self.state.query.page,
                    page.pagination.total_pages,
                    page.pagination.total
                );
                self.state.loaded = page.posts;
                self.state.pagination = page.pagination;
                if let Some(last_updated) = page.last_updated {
                    self.state.connection.last_updated = Some(last_updated);
                }
                self.state.error = None;
            }
            Err(e) => {
                // 直前に表示していた投稿は残したまま、エラーを出す
                tracing::warn!("Fetch error: {} ({})", e, e.detail());
                self.state.error = Some(e.to_string());
            }
        }

        self.publish();
    }

    fn start_refresh(&mut self) {
        if self.refresh_task.is_some() {
            tracing::debug!("Refresh already in progress");
            return;
        }

        let source = Arc::clone(&self.source);
        let done = self.refresh_tx.clone();
        self.refresh_task = Some(tokio::spawn(async move {
            let result = source.trigger_refresh().await;
            let _ = done.send(result);
        }));
    }

    fn apply_refresh(&mut self, result: Result<(), FeedError>) {
        self.refresh_task = None;
        match result {
            Ok(()) => self.issue_fetch(),
            Err(e) => tracing::warn!("Refresh error: {}", e.detail()),
        }
    }

    fn handle_live(&mut self, event: LiveEvent) {
        match event {
            LiveEvent::Connected => {
                self.state.connection.connected = true;
                self.publish();
            }
            LiveEvent::Disconnected => {
                self.state.connection.connected = false;
                self.publish();
            }
            LiveEvent::DataChanged => {
                // レスポンスの lastUpdated が来たら上書きされる
                self.state.connection.last_updated = Some(Utc::now());
                self.issue_fetch();
            }
            LiveEvent::Stats(stats) => {
                self.state.stats = Some(stats);
                self.publish();
            }
        }
    }

    async fn teardown(mut self, live: Option<LiveSubscription>) {
        self.search.cancel();
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
        if let Some(live) = live {
            live.dispose().await;
        }
        tracing::info!("Coordinator stopped");
    }

    fn current_snapshot(&self) -> ViewSnapshot {
        self.state
            .snapshot(self.prefs.favorites(), self.prefs.dark_mode())
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.current_snapshot());
    }
}

async fn next_live_event(live: &mut Option<LiveSubscription>) -> Option<LiveEvent> {
    match live {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
