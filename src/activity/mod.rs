/// Activity feed aggregator
///
/// Activities are append-only. Recording one publishes it on the global
/// `activity-created` topic and on the author's `user-activity-created` topic.
use crate::{
    error::AppResult,
    metrics,
    pagination::{Connection, PageArgs},
    pubsub::{Broadcaster, BusEvent, Topic},
    users::UserSummary,
};
use async_graphql::{Enum, Json, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    FriendRequest,
    FriendAccept,
    ProfileUpdate,
    TweetCreated,
    System,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::FriendRequest => "FRIEND_REQUEST",
            ActivityType::FriendAccept => "FRIEND_ACCEPT",
            ActivityType::ProfileUpdate => "PROFILE_UPDATE",
            ActivityType::TweetCreated => "TWEET_CREATED",
            ActivityType::System => "SYSTEM",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "FRIEND_REQUEST" => ActivityType::FriendRequest,
            "FRIEND_ACCEPT" => ActivityType::FriendAccept,
            "PROFILE_UPDATE" => ActivityType::ProfileUpdate,
            "TWEET_CREATED" => ActivityType::TweetCreated,
            _ => ActivityType::System,
        }
    }
}

/// An activity with its author's public summary
#[derive(Debug, Clone, SimpleObject)]
pub struct Activity {
    pub id: i64,
    pub user_id: i64,
    #[graphql(name = "type")]
    pub activity_type: ActivityType,
    pub message: String,
    pub data: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
}

impl Activity {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let activity_type: String = row.try_get("type")?;
        let data: Option<String> = row.try_get("data")?;
        Ok(Activity {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            activity_type: ActivityType::from_str(&activity_type),
            message: row.try_get("message")?,
            data: data
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .map(Json),
            created_at: row.try_get("created_at")?,
            user: UserSummary::from_row(row, "u_")?,
        })
    }
}

fn select_activities(condition: &str) -> String {
    format!(
        "SELECT a.id, a.user_id, a.type, a.message, a.data, a.created_at, {}
         FROM activity a
         JOIN user u ON u.id = a.user_id
         LEFT JOIN profile p ON p.user_id = u.id
         WHERE {}",
        UserSummary::columns("u", "p", "u_"),
        condition
    )
}

/// `AND a.type IN (?, ?, ...)` for a non-empty filter
fn type_filter(types: &[ActivityType]) -> String {
    if types.is_empty() {
        String::new()
    } else {
        format!(" AND a.type IN ({})", vec!["?"; types.len()].join(", "))
    }
}

/// Activity manager service
pub struct ActivityManager {
    db: SqlitePool,
    bus: Arc<dyn Broadcaster>,
}

impl ActivityManager {
    /// Create a new activity manager
    pub fn new(db: SqlitePool, bus: Arc<dyn Broadcaster>) -> Self {
        Self { db, bus }
    }

    /// Append an activity and publish it
    pub async fn record(
        &self,
        user_id: i64,
        activity_type: ActivityType,
        message: &str,
        data: Option<Value>,
    ) -> AppResult<Activity> {
        let id: i64 = sqlx::query(
            "INSERT INTO activity (user_id, type, message, data, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id",
        )
        .bind(user_id)
        .bind(activity_type.as_str())
        .bind(message)
        .bind(data.map(|d| d.to_string()))
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?
        .try_get("id")?;

        let row = sqlx::query(&select_activities("a.id = ?1"))
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        let activity = Activity::from_row(&row)?;

        metrics::record_activity(activity_type.as_str());
        tracing::debug!(activity_id = id, user_id, activity_type = activity_type.as_str(), "Recorded activity");

        self.bus
            .publish(Topic::ActivityCreated, BusEvent::ActivityCreated(activity.clone()));
        self.bus.publish(
            Topic::UserActivityCreated(user_id),
            BusEvent::ActivityCreated(activity.clone()),
        );

        Ok(activity)
    }

    /// Record an activity for a write that has already committed.
    ///
    /// Failures are logged and yield `None`.
    pub async fn record_or_log(
        &self,
        user_id: i64,
        activity_type: ActivityType,
        message: &str,
        data: Option<Value>,
    ) -> Option<Activity> {
        match self.record(user_id, activity_type, message, data).await {
            Ok(activity) => Some(activity),
            Err(e) => {
                tracing::error!(
                    user_id,
                    activity_type = activity_type.as_str(),
                    "Failed to record activity: {}",
                    e
                );
                None
            }
        }
    }

    /// Activities of the viewer and the viewer's friends, newest first
    pub async fn feed(
        &self,
        viewer: i64,
        page: &PageArgs,
        types: &[ActivityType],
    ) -> AppResult<Connection<Activity>> {
        let page = page.resolve()?;

        let sql = format!(
            "{} ORDER BY a.id DESC LIMIT ?",
            select_activities(&format!(
                "a.id < ?
                 AND (a.user_id = ?
                      OR a.user_id IN (
                          SELECT CASE WHEN sender_id = ? THEN receiver_id ELSE sender_id END
                          FROM friend
                          WHERE status = 'FRIENDS' AND (sender_id = ? OR receiver_id = ?)))
                 {}",
                type_filter(types)
            ))
        );

        let mut query = sqlx::query(&sql)
            .bind(page.before_or_max())
            .bind(viewer)
            .bind(viewer)
            .bind(viewer)
            .bind(viewer);
        for t in types {
            query = query.bind(t.as_str());
        }
        let rows = query.bind(page.fetch_limit()).fetch_all(&self.db).await?;

        let activities = rows
            .iter()
            .map(Activity::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Connection::from_rows(activities, page, |a| a.id))
    }

    /// One user's activities, newest first
    pub async fn user_activities(
        &self,
        user_id: i64,
        page: &PageArgs,
        types: &[ActivityType],
    ) -> AppResult<Connection<Activity>> {
        let page = page.resolve()?;

        let sql = format!(
            "{} ORDER BY a.id DESC LIMIT ?",
            select_activities(&format!("a.id < ? AND a.user_id = ?{}", type_filter(types)))
        );

        let mut query = sqlx::query(&sql).bind(page.before_or_max()).bind(user_id);
        for t in types {
            query = query.bind(t.as_str());
        }
        let rows = query.bind(page.fetch_limit()).fetch_all(&self.db).await?;

        let activities = rows
            .iter()
            .map(Activity::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Connection::from_rows(activities, page, |a| a.id))
    }

    /// Number of activities authored by a user
    pub async fn count_for_user(&self, user_id: i64) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM activity WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        Ok(row.try_get("n")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, pagination::encode_cursor, pubsub::InMemoryBroadcaster, users};
    use futures::StreamExt;
    use serde_json::json;

    async fn setup() -> (SqlitePool, Arc<InMemoryBroadcaster>, ActivityManager) {
        let pool = db::test_pool().await;
        let bus = Arc::new(InMemoryBroadcaster::new(16));
        let manager = ActivityManager::new(pool.clone(), bus.clone());
        (pool, bus, manager)
    }

    async fn befriend(pool: &SqlitePool, a: i64, b: i64) {
        let (low, high) = crate::friends::pair_key(a, b);
        sqlx::query(
            "INSERT INTO friend (sender_id, receiver_id, user_low, user_high, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'FRIENDS', ?5, ?5)",
        )
        .bind(a)
        .bind(b)
        .bind(low)
        .bind(high)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_record_carries_author_summary() {
        let (pool, _bus, activities) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        let activity = activities
            .record(alice, ActivityType::System, "joined", Some(json!({"welcome": true})))
            .await
            .unwrap();

        assert_eq!(activity.user.id, alice);
        assert_eq!(activity.user.name, "Alice");
        assert_eq!(activity.data.as_deref(), Some(&json!({"welcome": true})));
        assert_eq!(activities.count_for_user(alice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_publishes_on_both_topics() {
        let (pool, bus, activities) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        let mut global = bus.subscribe(Topic::ActivityCreated);
        let mut personal = bus.subscribe(Topic::UserActivityCreated(alice));

        let recorded = activities
            .record(alice, ActivityType::System, "hello", None)
            .await
            .unwrap();

        for stream in [&mut global, &mut personal] {
            match stream.next().await.unwrap() {
                BusEvent::ActivityCreated(a) => assert_eq!(a.id, recorded.id),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_feed_includes_friends_only() {
        let (pool, _bus, activities) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;
        let bob = users::tests::register(&pool, "Bob").await;
        let carol = users::tests::register(&pool, "Carol").await;
        befriend(&pool, alice, bob).await;

        activities.record(alice, ActivityType::System, "a", None).await.unwrap();
        activities.record(bob, ActivityType::System, "b", None).await.unwrap();
        activities.record(carol, ActivityType::System, "c", None).await.unwrap();

        let feed = activities.feed(alice, &PageArgs::default(), &[]).await.unwrap();
        let authors: Vec<i64> = feed.nodes().map(|a| a.user_id).collect();
        assert_eq!(authors, vec![bob, alice]);

        let carol_feed = activities.feed(carol, &PageArgs::default(), &[]).await.unwrap();
        assert_eq!(carol_feed.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_feed_pagination_walk() {
        let (pool, _bus, activities) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let a = activities
                .record(alice, ActivityType::System, &format!("event {}", i), None)
                .await
                .unwrap();
            ids.push(a.id);
        }
        ids.reverse();

        let first = activities
            .feed(alice, &PageArgs::new(None, Some(2)), &[])
            .await
            .unwrap();
        assert_eq!(first.nodes().map(|a| a.id).collect::<Vec<_>>(), ids[0..2]);
        assert!(first.page_info.has_next_page);

        let second = activities
            .feed(alice, &PageArgs::new(first.page_info.end_cursor.clone(), Some(2)), &[])
            .await
            .unwrap();
        assert_eq!(second.nodes().map(|a| a.id).collect::<Vec<_>>(), ids[2..4]);
        assert!(second.page_info.has_next_page);

        let third = activities
            .feed(alice, &PageArgs::new(second.page_info.end_cursor.clone(), Some(2)), &[])
            .await
            .unwrap();
        assert_eq!(third.nodes().map(|a| a.id).collect::<Vec<_>>(), ids[4..5]);
        assert!(!third.page_info.has_next_page);
        assert_eq!(third.page_info.end_cursor, Some(encode_cursor(ids[4])));
    }

    #[tokio::test]
    async fn test_walk_is_stable_under_inserts() {
        let (pool, _bus, activities) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        let mut original = Vec::new();
        for i in 0..7 {
            let a = activities
                .record(alice, ActivityType::System, &format!("event {}", i), None)
                .await
                .unwrap();
            original.push(a.id);
        }
        original.reverse();

        let mut walked = Vec::new();
        let mut page = activities
            .feed(alice, &PageArgs::new(None, Some(3)), &[])
            .await
            .unwrap();
        walked.extend(page.nodes().map(|a| a.id));

        // Lands above the cursor, so later pages never see it
        let newer = activities
            .record(alice, ActivityType::System, "late event", None)
            .await
            .unwrap();

        while page.page_info.has_next_page {
            page = activities
                .feed(alice, &PageArgs::new(page.page_info.end_cursor.clone(), Some(3)), &[])
                .await
                .unwrap();
            walked.extend(page.nodes().map(|a| a.id));
        }

        assert_eq!(walked, original);
        assert!(walked.windows(2).all(|w| w[0] > w[1]));
        assert!(!walked.contains(&newer.id));

        // A fresh walk starts with the new activity
        let fresh = activities
            .feed(alice, &PageArgs::new(None, Some(3)), &[])
            .await
            .unwrap();
        assert_eq!(fresh.edges[0].node.id, newer.id);
    }

    #[tokio::test]
    async fn test_type_filter() {
        let (pool, _bus, activities) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        activities.record(alice, ActivityType::System, "s", None).await.unwrap();
        activities.record(alice, ActivityType::ProfileUpdate, "p", None).await.unwrap();
        activities.record(alice, ActivityType::TweetCreated, "t", None).await.unwrap();

        let filtered = activities
            .user_activities(
                alice,
                &PageArgs::default(),
                &[ActivityType::ProfileUpdate, ActivityType::TweetCreated],
            )
            .await
            .unwrap();
        let types: Vec<ActivityType> = filtered.nodes().map(|a| a.activity_type).collect();
        assert_eq!(types, vec![ActivityType::TweetCreated, ActivityType::ProfileUpdate]);
    }

    #[tokio::test]
    async fn test_bad_cursor_rejected() {
        let (pool, _bus, activities) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        let result = activities
            .feed(alice, &PageArgs::new(Some("not-a-cursor!".to_string()), None), &[])
            .await;
        assert!(matches!(result, Err(crate::error::AppError::BadRequest(_))));
    }
}
