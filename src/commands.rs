//! 標準入力の 1 行をユーザー操作に変換する

use crate::coordinator::ViewCommand;
use feed_core::{SortField, SortOrder};

pub const HELP: &str = "\
Commands:
  search <text>                    filter posts (empty text clears)
  sort <newest|upvotes|comments>   change sort field
  order [asc|desc]                 set or toggle sort order
  next | prev | page <n>           navigate pages
  fav <id>                         toggle favorite
  favs                             show favorites only (toggle)
  dark                             toggle dark mode
  retry                            fetch again after an error
  refresh                          ask the server to collect new posts
  help                             show this help
  quit                             exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(ViewCommand),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} (type 'help' for commands)")]
pub struct ParseError(pub String);

/// 空行は `Ok(None)`
pub fn parse_line(line: &str) -> Result<Option<Input>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match word.to_ascii_lowercase().as_str() {
        "search" | "s" => Input::Command(ViewCommand::SetSearch(rest.to_string())),
        "sort" => {
            let field = match rest {
                "newest" | "created_at" => SortField::CreatedAt,
                "upvotes" => SortField::Upvotes,
                "comments" | "num_comments" => SortField::NumComments,
                _ => return Err(ParseError(format!("unknown sort field: {:?}", rest))),
            };
            Input::Command(ViewCommand::SetSortField(field))
        }
        "order" => match rest {
            "" => Input::Command(ViewCommand::ToggleSortOrder),
            other => match SortOrder::from_str(other) {
                Some(order) => Input::Command(ViewCommand::SetSortOrder(order)),
                None => return Err(ParseError(format!("unknown sort order: {:?}", other))),
            },
        },
        "next" | "n" => Input::Command(ViewCommand::NextPage),
        "prev" | "p" => Input::Command(ViewCommand::PrevPage),
        "page" => match rest.parse::<u32>() {
            Ok(page) => Input::Command(ViewCommand::GoToPage(page)),
            Err(_) => return Err(ParseError(format!("invalid page number: {:?}", rest))),
        },
        "fav" => {
            if rest.is_empty() {
                return Err(ParseError("fav needs a post id".to_string()));
            }
            Input::Command(ViewCommand::ToggleFavorite(rest.to_string()))
        }
        "favs" => Input::Command(ViewCommand::ToggleFavoritesOnly),
        "dark" => Input::Command(ViewCommand::ToggleDarkMode),
        "retry" => Input::Command(ViewCommand::Retry),
        "refresh" => Input::Command(ViewCommand::Refresh),
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => return Err(ParseError(format!("unknown command: {}", other))),
    };

    Ok(Some(input))
}
