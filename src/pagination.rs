/// Cursor pagination shared by every list query
///
/// Rows are ordered by id descending; a cursor wraps the id of the last edge
/// of a page and the next page starts strictly below it.
use crate::activity::Activity;
use crate::error::{AppError, AppResult};
use crate::friends::Friendship;
use crate::tweets::Tweet;
use crate::validation::FieldError;
use async_graphql::{OutputType, SimpleObject};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 50;

/// Raw paging arguments as received from the client
#[derive(Debug, Clone, Default)]
pub struct PageArgs {
    pub cursor: Option<String>,
    pub limit: Option<i32>,
}

impl PageArgs {
    pub fn new(cursor: Option<String>, limit: Option<i32>) -> Self {
        Self { cursor, limit }
    }

    /// Decode the cursor and range-check the limit
    pub fn resolve(&self) -> AppResult<Page> {
        let limit = match self.limit {
            None => DEFAULT_LIMIT,
            Some(l) if (1..=MAX_LIMIT).contains(&i64::from(l)) => i64::from(l),
            Some(l) => {
                return Err(AppError::Validation(vec![FieldError {
                    path: "limit".to_string(),
                    message: format!("limit must be between 1 and {}, got {}", MAX_LIMIT, l),
                }]))
            }
        };

        let before = match self.cursor.as_deref() {
            None | Some("") => None,
            Some(cursor) => Some(decode_cursor(cursor)?),
        };

        Ok(Page { before, limit })
    }
}

/// Resolved page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Exclusive upper bound on ids
    pub before: Option<i64>,
    pub limit: i64,
}

impl Page {
    /// Upper bound usable directly in `id < ?`
    pub fn before_or_max(&self) -> i64 {
        self.before.unwrap_or(i64::MAX)
    }

    /// Rows to fetch: one extra to detect a following page
    pub fn fetch_limit(&self) -> i64 {
        self.limit + 1
    }
}

pub fn encode_cursor(id: i64) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

pub fn decode_cursor(cursor: &str) -> AppResult<i64> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.trim_end_matches('='))
        .map_err(|_| AppError::BadRequest("Invalid cursor".to_string()))?;
    std::str::from_utf8(&bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest("Invalid cursor".to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, SimpleObject)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(concrete(name = "FriendEdge", params(Friendship)))]
#[graphql(concrete(name = "ActivityEdge", params(Activity)))]
#[graphql(concrete(name = "TweetEdge", params(Tweet)))]
#[cfg_attr(test, graphql(concrete(name = "TestI64Edge", params(i64))))]
pub struct Edge<T: OutputType> {
    pub node: T,
    pub cursor: String,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(concrete(name = "FriendConnection", params(Friendship)))]
#[graphql(concrete(name = "ActivityConnection", params(Activity)))]
#[graphql(concrete(name = "TweetConnection", params(Tweet)))]
#[cfg_attr(test, graphql(concrete(name = "TestI64Connection", params(i64))))]
pub struct Connection<T: OutputType>
where
    Edge<T>: OutputType,
{
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T: OutputType> Connection<T>
where
    Edge<T>: OutputType,
{
    /// Build a page from up to `limit + 1` rows already sorted by id descending
    pub fn from_rows(mut rows: Vec<T>, page: Page, id_of: impl Fn(&T) -> i64) -> Self {
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        let has_next_page = rows.len() > limit;
        rows.truncate(limit);

        let edges: Vec<Edge<T>> = rows
            .into_iter()
            .map(|node| Edge {
                cursor: encode_cursor(id_of(&node)),
                node,
            })
            .collect();
        let end_cursor = edges.last().map(|e| e.cursor.clone());

        Connection {
            edges,
            page_info: PageInfo {
                has_next_page,
                end_cursor,
            },
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }
}
