/// Tweets and likes
///
/// `tweet.likes` is a denormalized count of `tweet_like` rows for the tweet;
/// both are only ever changed together inside one transaction.
use crate::{
    activity::{ActivityManager, ActivityType},
    error::{AppError, AppResult},
    pagination::{Connection, PageArgs},
    users::UserSummary,
    validation::{not_blank, validate_input},
};
use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Clone, SimpleObject)]
pub struct Tweet {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub likes: i64,
    /// Whether the viewer has liked this tweet; false without a viewer
    pub is_liked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: UserSummary,
}

impl Tweet {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Tweet {
            id: row.try_get("id")?,
            author_id: row.try_get("author_id")?,
            content: row.try_get("content")?,
            likes: row.try_get("likes")?,
            is_liked: row.try_get("is_liked")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            author: UserSummary::from_row(row, "a_")?,
        })
    }
}

#[derive(Debug, Clone, InputObject, Validate)]
pub struct CreateTweetInput {
    #[validate(
        length(min = 1, max = 280, message = "Tweet must be between 1 and 280 characters"),
        custom(function = "not_blank", message = "Tweet must not be blank")
    )]
    pub content: String,
}

/// Tweet select with the author summary and the viewer's like flag.
/// `?1` is the viewer id (NULL for anonymous reads).
fn select_tweets(condition: &str) -> String {
    format!(
        "SELECT t.id, t.author_id, t.content, t.likes, t.created_at, t.updated_at,
                EXISTS (SELECT 1 FROM tweet_like l WHERE l.tweet_id = t.id AND l.user_id = ?1) AS is_liked,
                {}
         FROM tweet t
         JOIN user a ON a.id = t.author_id
         LEFT JOIN profile ap ON ap.user_id = a.id
         WHERE {}",
        UserSummary::columns("a", "ap", "a_"),
        condition
    )
}

/// Tweet manager service
pub struct TweetManager {
    db: SqlitePool,
    activities: Arc<ActivityManager>,
}

impl TweetManager {
    /// Create a new tweet manager
    pub fn new(db: SqlitePool, activities: Arc<ActivityManager>) -> Self {
        Self { db, activities }
    }

    /// Public timeline, newest first
    pub async fn list(&self, viewer: Option<i64>, page: &PageArgs) -> AppResult<Connection<Tweet>> {
        let page = page.resolve()?;
        let sql = format!("{} ORDER BY t.id DESC LIMIT ?3", select_tweets("t.id < ?2"));

        let rows = sqlx::query(&sql)
            .bind(viewer)
            .bind(page.before_or_max())
            .bind(page.fetch_limit())
            .fetch_all(&self.db)
            .await?;

        let tweets = rows
            .iter()
            .map(Tweet::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Connection::from_rows(tweets, page, |t| t.id))
    }

    /// A single tweet
    pub async fn get(&self, viewer: Option<i64>, id: i64) -> AppResult<Tweet> {
        let row = sqlx::query(&select_tweets("t.id = ?2"))
            .bind(viewer)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Tweet not found".to_string()))?;
        Ok(Tweet::from_row(&row)?)
    }

    /// Post a tweet and record the activity
    pub async fn create(&self, author: i64, mut input: CreateTweetInput) -> AppResult<Tweet> {
        input.content = input.content.trim().to_string();
        validate_input(&input)?;

        let content = input.content;
        let now = Utc::now();
        let id: i64 = sqlx::query(
            "INSERT INTO tweet (author_id, content, likes, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?3)
             RETURNING id",
        )
        .bind(author)
        .bind(&content)
        .bind(now)
        .fetch_one(&self.db)
        .await?
        .try_get("id")?;

        self.activities
            .record_or_log(
                author,
                ActivityType::TweetCreated,
                "created a new tweet",
                Some(json!({ "tweetId": id.to_string() })),
            )
            .await;

        tracing::info!(user_id = author, tweet_id = id, "Tweet created");
        self.get(Some(author), id).await
    }

    /// Like a tweet; liking twice is a bad request
    pub async fn like(&self, viewer: i64, id: i64) -> AppResult<Tweet> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM tweet WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Tweet not found".to_string()));
        }

        let inserted = sqlx::query(
            "INSERT INTO tweet_like (tweet_id, user_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(tweet_id, user_id) DO NOTHING",
        )
        .bind(id)
        .bind(viewer)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(AppError::BadRequest("Tweet already liked".to_string()));
        }

        sqlx::query("UPDATE tweet SET likes = likes + 1, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = viewer, tweet_id = id, "Tweet liked");
        self.get(Some(viewer), id).await
    }

    /// Remove the viewer's like; unliking a tweet not liked is a bad request
    pub async fn unlike(&self, viewer: i64, id: i64) -> AppResult<Tweet> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM tweet WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Tweet not found".to_string()));
        }

        let deleted = sqlx::query("DELETE FROM tweet_like WHERE tweet_id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(viewer)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::BadRequest("Tweet not liked".to_string()));
        }

        sqlx::query("UPDATE tweet SET likes = likes - 1, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = viewer, tweet_id = id, "Tweet unliked");
        self.get(Some(viewer), id).await
    }
}
