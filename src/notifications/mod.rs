/// Notification fan-out pipeline
///
/// `notify` consults the recipient's preferences, stores the notification
/// and publishes it to the recipient's live subscriptions. Delivery is
/// best-effort: failures are logged and never fail the triggering mutation.
use crate::{
    error::{AppError, AppResult},
    metrics,
    pubsub::{Broadcaster, BusEvent, Topic},
};
use async_graphql::{Enum, InputObject, Json, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    FriendRequest,
    FriendAccept,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::FriendRequest => "FRIEND_REQUEST",
            NotificationType::FriendAccept => "FRIEND_ACCEPT",
            NotificationType::System => "SYSTEM",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "FRIEND_REQUEST" => NotificationType::FriendRequest,
            "FRIEND_ACCEPT" => NotificationType::FriendAccept,
            _ => NotificationType::System,
        }
    }
}

/// Preference category gating a notification type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    FriendRequests,
    System,
}

impl From<NotificationType> for Category {
    fn from(t: NotificationType) -> Self {
        match t {
            NotificationType::FriendRequest | NotificationType::FriendAccept => {
                Category::FriendRequests
            }
            NotificationType::System => Category::System,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[graphql(name = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub data: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let notification_type: String = row.try_get("type")?;
        let data: Option<String> = row.try_get("data")?;
        Ok(Notification {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            notification_type: NotificationType::from_str(&notification_type),
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            is_read: row.try_get("is_read")?,
            data: data
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .map(Json),
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, SimpleObject)]
pub struct NotificationPreferences {
    pub friend_requests: bool,
    pub system: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            friend_requests: true,
            system: true,
        }
    }
}

impl NotificationPreferences {
    pub fn allows(&self, category: Category) -> bool {
        match category {
            Category::FriendRequests => self.friend_requests,
            Category::System => self.system,
        }
    }

    /// Apply a partial update
    pub fn merge(self, patch: &PreferencesPatch) -> Self {
        Self {
            friend_requests: patch.friend_requests.unwrap_or(self.friend_requests),
            system: patch.system.unwrap_or(self.system),
        }
    }
}

/// Partial preference update; absent fields keep their current value
#[derive(Debug, Clone, Default, InputObject)]
#[graphql(name = "NotificationPreferencesInput")]
pub struct PreferencesPatch {
    pub friend_requests: Option<bool>,
    pub system: Option<bool>,
}

/// Read-side filters for the notification list
#[derive(Debug, Clone, Default, InputObject)]
#[graphql(name = "NotificationFilters")]
pub struct NotificationFilters {
    #[graphql(name = "type")]
    pub types: Option<Vec<NotificationType>>,
    pub is_read: Option<bool>,
}

/// Notification manager service
pub struct NotificationManager {
    db: SqlitePool,
    bus: Arc<dyn Broadcaster>,
}

impl NotificationManager {
    /// Create a new notification manager
    pub fn new(db: SqlitePool, bus: Arc<dyn Broadcaster>) -> Self {
        Self { db, bus }
    }

    /// Deliver a notification if the recipient's preferences allow it.
    ///
    /// Returns `None` when suppressed or when delivery failed.
    pub async fn notify(
        &self,
        recipient: i64,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        data: Option<Value>,
    ) -> Option<Notification> {
        match self
            .try_notify(recipient, notification_type, title, message, data)
            .await
        {
            Ok(Some(notification)) => {
                metrics::record_notification(notification_type.as_str(), "delivered");
                Some(notification)
            }
            Ok(None) => {
                metrics::record_notification(notification_type.as_str(), "suppressed");
                tracing::debug!(
                    recipient,
                    notification_type = notification_type.as_str(),
                    "Notification suppressed by preferences"
                );
                None
            }
            Err(e) => {
                metrics::record_notification(notification_type.as_str(), "failed");
                tracing::error!(
                    recipient,
                    notification_type = notification_type.as_str(),
                    "Failed to send notification: {}",
                    e
                );
                None
            }
        }
    }

    async fn try_notify(
        &self,
        recipient: i64,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        data: Option<Value>,
    ) -> AppResult<Option<Notification>> {
        let preferences = self.load_preferences(recipient).await?.unwrap_or_default();
        if !preferences.allows(notification_type.into()) {
            return Ok(None);
        }

        let row = sqlx::query(
            "INSERT INTO notification (user_id, type, title, message, is_read, data, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)
             RETURNING id, user_id, type, title, message, is_read, data, created_at",
        )
        .bind(recipient)
        .bind(notification_type.as_str())
        .bind(title)
        .bind(message)
        .bind(data.map(|d| d.to_string()))
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;
        let notification = Notification::from_row(&row)?;

        self.bus.publish(
            Topic::NotificationReceived(recipient),
            BusEvent::NotificationReceived(notification.clone()),
        );

        Ok(Some(notification))
    }

    /// The viewer's notifications, newest first
    pub async fn list(&self, viewer: i64, filters: &NotificationFilters) -> AppResult<Vec<Notification>> {
        let types = filters.types.as_deref().unwrap_or(&[]);

        let mut sql = String::from(
            "SELECT id, user_id, type, title, message, is_read, data, created_at
             FROM notification WHERE user_id = ?",
        );
        if !types.is_empty() {
            sql.push_str(&format!(" AND type IN ({})", vec!["?"; types.len()].join(", ")));
        }
        if filters.is_read.is_some() {
            sql.push_str(" AND is_read = ?");
        }
        sql.push_str(" ORDER BY id DESC");

        let mut query = sqlx::query(&sql).bind(viewer);
        for t in types {
            query = query.bind(t.as_str());
        }
        if let Some(is_read) = filters.is_read {
            query = query.bind(is_read);
        }

        let rows = query.fetch_all(&self.db).await?;
        Ok(rows
            .iter()
            .map(Notification::from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Mark one of the viewer's notifications as read
    pub async fn mark_read(&self, viewer: i64, id: i64) -> AppResult<Notification> {
        let row = sqlx::query(
            "UPDATE notification SET is_read = 1
             WHERE id = ?1 AND user_id = ?2
             RETURNING id, user_id, type, title, message, is_read, data, created_at",
        )
        .bind(id)
        .bind(viewer)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;
        let notification = Notification::from_row(&row)?;

        self.bus.publish(
            Topic::NotificationUpdated(viewer),
            BusEvent::NotificationUpdated(notification.clone()),
        );

        Ok(notification)
    }

    /// Mark every unread notification of the viewer as read
    pub async fn mark_all_read(&self, viewer: i64) -> AppResult<u64> {
        let result = sqlx::query("UPDATE notification SET is_read = 1 WHERE user_id = ?1 AND is_read = 0")
            .bind(viewer)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id = viewer, count = result.rows_affected(), "Marked notifications read");
        Ok(result.rows_affected())
    }

    /// Number of unread notifications
    pub async fn unread_count(&self, viewer: i64) -> AppResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM notification WHERE user_id = ?1 AND is_read = 0")
            .bind(viewer)
            .fetch_one(&self.db)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Preferences, created with defaults on first read
    pub async fn get_or_create_preferences(&self, viewer: i64) -> AppResult<NotificationPreferences> {
        if let Some(preferences) = self.load_preferences(viewer).await? {
            return Ok(preferences);
        }

        let defaults = NotificationPreferences::default();
        self.store_preferences(viewer, defaults).await?;
        Ok(defaults)
    }

    /// Merge a partial update over the stored (or default) preferences
    pub async fn update_preferences(
        &self,
        viewer: i64,
        patch: &PreferencesPatch,
    ) -> AppResult<NotificationPreferences> {
        let current = self.load_preferences(viewer).await?.unwrap_or_default();
        let merged = current.merge(patch);
        self.store_preferences(viewer, merged).await?;

        tracing::info!(
            user_id = viewer,
            friend_requests = merged.friend_requests,
            system = merged.system,
            "Updated notification preferences"
        );
        Ok(merged)
    }

    async fn load_preferences(&self, user_id: i64) -> AppResult<Option<NotificationPreferences>> {
        let row = sqlx::query(
            "SELECT friend_requests, system FROM notification_preferences WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| {
            Ok(NotificationPreferences {
                friend_requests: row.try_get("friend_requests")?,
                system: row.try_get("system")?,
            })
        })
        .transpose()
    }

    async fn store_preferences(&self, user_id: i64, preferences: NotificationPreferences) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO notification_preferences (user_id, friend_requests, system, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                friend_requests = excluded.friend_requests,
                system = excluded.system,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(preferences.friend_requests)
        .bind(preferences.system)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, pubsub::InMemoryBroadcaster, users};
    use futures::StreamExt;
    use serde_json::json;

    async fn setup() -> (SqlitePool, Arc<InMemoryBroadcaster>, NotificationManager) {
        let pool = db::test_pool().await;
        let bus = Arc::new(InMemoryBroadcaster::new(16));
        let manager = NotificationManager::new(pool.clone(), bus.clone());
        (pool, bus, manager)
    }

    #[tokio::test]
    async fn test_absent_preferences_allow_delivery() {
        let (pool, bus, notifications) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;
        let mut live = bus.subscribe(Topic::NotificationReceived(alice));

        let delivered = notifications
            .notify(
                alice,
                NotificationType::FriendRequest,
                "New Friend Request",
                "Bob sent you a friend request",
                Some(json!({"userId": 2, "requestId": "1"})),
            )
            .await
            .unwrap();
        assert!(!delivered.is_read);

        match live.next().await.unwrap() {
            BusEvent::NotificationReceived(n) => assert_eq!(n.id, delivered.id),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(notifications.unread_count(alice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disabled_category_suppresses() {
        let (pool, bus, notifications) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        notifications
            .update_preferences(
                alice,
                &PreferencesPatch {
                    friend_requests: Some(false),
                    system: None,
                },
            )
            .await
            .unwrap();

        let _live = bus.subscribe(Topic::NotificationReceived(alice));
        let suppressed = notifications
            .notify(alice, NotificationType::FriendAccept, "t", "m", None)
            .await;
        assert!(suppressed.is_none());
        assert!(notifications
            .list(alice, &NotificationFilters::default())
            .await
            .unwrap()
            .is_empty());

        // System notifications are a separate category
        assert!(notifications
            .notify(alice, NotificationType::System, "t", "m", None)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let (_pool, _bus, notifications) = setup().await;
        // Unknown recipient violates the foreign key
        let result = notifications
            .notify(9999, NotificationType::System, "t", "m", None)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_ordering() {
        let (pool, _bus, notifications) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        let first = notifications
            .notify(alice, NotificationType::FriendRequest, "a", "a", None)
            .await
            .unwrap();
        let second = notifications
            .notify(alice, NotificationType::System, "b", "b", None)
            .await
            .unwrap();
        notifications.mark_read(alice, first.id).await.unwrap();

        let all = notifications.list(alice, &NotificationFilters::default()).await.unwrap();
        assert_eq!(all.iter().map(|n| n.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let unread = notifications
            .list(
                alice,
                &NotificationFilters {
                    types: None,
                    is_read: Some(false),
                },
            )
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, second.id);

        let requests = notifications
            .list(
                alice,
                &NotificationFilters {
                    types: Some(vec![NotificationType::FriendRequest]),
                    is_read: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, first.id);
    }

    #[tokio::test]
    async fn test_mark_read_requires_ownership() {
        let (pool, bus, notifications) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;
        let bob = users::tests::register(&pool, "Bob").await;

        let n = notifications
            .notify(alice, NotificationType::System, "t", "m", None)
            .await
            .unwrap();

        let err = notifications.mark_read(bob, n.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let mut updates = bus.subscribe(Topic::NotificationUpdated(alice));
        let read = notifications.mark_read(alice, n.id).await.unwrap();
        assert!(read.is_read);
        match updates.next().await.unwrap() {
            BusEvent::NotificationUpdated(updated) => assert!(updated.is_read),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mark_all_read_counts() {
        let (pool, _bus, notifications) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        for _ in 0..3 {
            notifications
                .notify(alice, NotificationType::System, "t", "m", None)
                .await
                .unwrap();
        }

        assert_eq!(notifications.mark_all_read(alice).await.unwrap(), 3);
        assert_eq!(notifications.mark_all_read(alice).await.unwrap(), 0);
        assert_eq!(notifications.unread_count(alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_preferences_lazily_created_and_merged() {
        let (pool, _bus, notifications) = setup().await;
        let alice = users::tests::register(&pool, "Alice").await;

        let defaults = notifications.get_or_create_preferences(alice).await.unwrap();
        assert_eq!(defaults, NotificationPreferences::default());

        let updated = notifications
            .update_preferences(
                alice,
                &PreferencesPatch {
                    friend_requests: None,
                    system: Some(false),
                },
            )
            .await
            .unwrap();
        assert!(updated.friend_requests);
        assert!(!updated.system);

        let reloaded = notifications.get_or_create_preferences(alice).await.unwrap();
        assert_eq!(reloaded, updated);
    }
}
