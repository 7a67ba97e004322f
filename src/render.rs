//! スナップショットを端末向けのテキストにする

use crate::state::{DisplayState, DisplayedPost, ViewSnapshot, NO_POSTS_TITLE};
use chrono::{DateTime, Utc};
use feed_core::{FeedStats, SortOrder};
use std::fmt::Write;

const EXCERPT_CHARS: usize = 200;

/// 投稿時刻の相対表示。1 週間以上前は日付
pub fn format_relative(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(created_at);
    let mins = diff.num_minutes();
    let hours = diff.num_hours();
    let days = diff.num_days();

    if mins < 60 {
        format!("{}m ago", mins.max(0))
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        created_at.format("%Y-%m-%d").to_string()
    }
}

/// 本文の先頭 200 文字。超える場合は "..." を付ける
pub fn excerpt(body: &str) -> String {
    let mut chars = body.char_indices();
    match chars.nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

pub fn format_stats(stats: &FeedStats) -> String {
    format!(
        "Total: {} posts | Last 24h: {} new | Last 7d: {} new",
        stats.total_posts, stats.posts_last24h, stats.posts_last_week
    )
}

pub fn render(snapshot: &ViewSnapshot, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    let _ = write!(
        out,
        "== Claude Reddit Feed == [{}]",
        if snapshot.connection.connected {
            "Live"
        } else {
            "Disconnected"
        }
    );
    if let Some(updated) = snapshot.connection.last_updated {
        let _ = write!(out, " Updated: {}", updated.format("%H:%M:%S"));
    }
    if snapshot.dark_mode {
        out.push_str(" (dark)");
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "Search: {:?} | Sort: {} {} | Favorites: {}{}",
        snapshot.search_input,
        snapshot.query.sort_field.label(),
        match snapshot.query.sort_order {
            SortOrder::Asc => "(asc)",
            SortOrder::Desc => "(desc)",
        },
        snapshot.favorite_count,
        if snapshot.favorites_only {
            " [favorites only]"
        } else {
            ""
        }
    );

    if let Some(stats) = &snapshot.stats {
        let _ = writeln!(out, "{}", format_stats(stats));
    }
    out.push('\n');

    match snapshot.display() {
        DisplayState::Loading => out.push_str("Loading...\n"),
        DisplayState::Error(message) => {
            let _ = writeln!(out, "Failed to load posts\n{}\nType 'retry' to try again.", message);
        }
        DisplayState::Empty { favorites_only } => {
            let _ = writeln!(
                out,
                "{}\n{}",
                NO_POSTS_TITLE,
                DisplayState::empty_hint(favorites_only)
            );
        }
        DisplayState::Posts => {
            for post in &snapshot.posts {
                render_post(&mut out, post, now);
            }
            if snapshot.shows_pagination() {
                let _ = writeln!(
                    out,
                    "Page {} of {}",
                    snapshot.query.page, snapshot.pagination.total_pages
                );
            }
        }
    }

    out
}

fn render_post(out: &mut String, item: &DisplayedPost, now: DateTime<Utc>) {
    let post = &item.post;
    let star = if item.favorite { "*" } else { " " };

    let _ = writeln!(out, "{} [{}] r/{}", star, post.id, post.subreddit);
    let _ = writeln!(out, "  {}", post.title);
    if let Some(body) = post.body.as_deref().filter(|b| !b.is_empty()) {
        let _ = writeln!(out, "  {}", excerpt(body));
    }
    let _ = writeln!(
        out,
        "  ^{} | {} comments | u/{} | {}",
        post.upvotes,
        post.num_comments,
        post.author,
        format_relative(post.created_at, now)
    );
    let _ = writeln!(out, "  {}", post.url);
    out.push('\n');
}
