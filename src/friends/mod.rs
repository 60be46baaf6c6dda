/// Friend relationship engine
///
/// At most one relationship row exists per unordered pair of users. The
/// absence of a row is the NONE state; every transition back to NONE
/// deletes the row.
///
/// ```text
/// NONE    --send-------> PENDING (sender = requester)
/// PENDING --accept-----> FRIENDS
/// PENDING --reject-----> NONE
/// PENDING --unsend-----> NONE (and the receiver's request notifications)
/// FRIENDS --remove-----> NONE
/// *       --block------> BLOCKED (sender = blocker)
/// BLOCKED --unblock----> NONE
/// ```

pub mod manager;

pub use manager::FriendManager;

use crate::users::UserSummary;
use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Relationship state between two users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendStatus {
    /// No relationship; never stored
    None,
    Pending,
    Friends,
    Blocked,
}

impl FriendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendStatus::None => "NONE",
            FriendStatus::Pending => "PENDING",
            FriendStatus::Friends => "FRIENDS",
            FriendStatus::Blocked => "BLOCKED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "PENDING" => FriendStatus::Pending,
            "FRIENDS" => FriendStatus::Friends,
            "BLOCKED" => FriendStatus::Blocked,
            _ => FriendStatus::None,
        }
    }
}

/// A relationship row with both parties' public summaries
#[derive(Debug, Clone, Serialize, SimpleObject)]
#[graphql(name = "Friend")]
pub struct Friendship {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub status: FriendStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sender: UserSummary,
    pub receiver: UserSummary,
}

impl Friendship {
    /// Whether a user is one of the two parties
    pub fn involves(&self, user_id: i64) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    /// The party that is not `user_id`
    pub fn counterpart(&self, user_id: i64) -> &UserSummary {
        if self.sender_id == user_id {
            &self.receiver
        } else {
            &self.sender
        }
    }

    /// Copy of this relationship after its row was deleted
    pub(crate) fn dissolved(mut self) -> Self {
        self.status = FriendStatus::None;
        self.updated_at = Utc::now();
        self
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Friendship {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            receiver_id: row.try_get("receiver_id")?,
            status: FriendStatus::from_str(&status),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            sender: UserSummary::from_row(row, "s_")?,
            receiver: UserSummary::from_row(row, "r_")?,
        })
    }
}

/// Unordered pair key stored in `user_low`/`user_high`
pub(crate) fn pair_key(a: i64, b: i64) -> (i64, i64) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Relationship select with both summaries joined, filtered by `condition`
pub(crate) fn select_friendships(condition: &str) -> String {
    format!(
        "SELECT f.id, f.sender_id, f.receiver_id, f.status, f.created_at, f.updated_at,
                {sender}, {receiver}
         FROM friend f
         JOIN user s ON s.id = f.sender_id
         LEFT JOIN profile sp ON sp.user_id = s.id
         JOIN user r ON r.id = f.receiver_id
         LEFT JOIN profile rp ON rp.user_id = r.id
         WHERE {condition}",
        sender = UserSummary::columns("s", "sp", "s_"),
        receiver = UserSummary::columns("r", "rp", "r_"),
        condition = condition
    )
}
