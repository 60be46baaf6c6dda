/// Friend manager implementation using runtime queries
use super::{pair_key, select_friendships, FriendStatus, Friendship};
use crate::{
    activity::{ActivityManager, ActivityType},
    error::{AppError, AppResult},
    metrics,
    notifications::{NotificationManager, NotificationType},
    pagination::{Connection, PageArgs},
    pubsub::{Broadcaster, BusEvent, Topic},
};
use chrono::Utc;
use serde_json::json;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Friend relationship engine
pub struct FriendManager {
    db: SqlitePool,
    activities: Arc<ActivityManager>,
    notifications: Arc<NotificationManager>,
    bus: Arc<dyn Broadcaster>,
}

impl FriendManager {
    /// Create a new friend manager
    pub fn new(
        db: SqlitePool,
        activities: Arc<ActivityManager>,
        notifications: Arc<NotificationManager>,
        bus: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            db,
            activities,
            notifications,
            bus,
        }
    }

    /// Send a friend request from `actor` to `target`
    pub async fn send_friend_request(&self, actor: i64, target: i64) -> AppResult<Friendship> {
        if actor == target {
            return Err(AppError::BadRequest(
                "Cannot send a friend request to yourself".to_string(),
            ));
        }

        self.ensure_user_exists(target).await?;

        if let Some(existing) = self.get_friendship(actor, target).await? {
            return Err(match existing.status {
                FriendStatus::Blocked => AppError::Conflict("Relationship is blocked".to_string()),
                _ => AppError::Conflict("Friend request already exists".to_string()),
            });
        }

        let (low, high) = pair_key(actor, target);
        let now = Utc::now();
        let id: i64 = sqlx::query(
            "INSERT INTO friend (sender_id, receiver_id, user_low, user_high, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             RETURNING id",
        )
        .bind(actor)
        .bind(target)
        .bind(low)
        .bind(high)
        .bind(FriendStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            // A concurrent request for the same pair lost the race
            if AppError::is_unique_violation(&e) {
                AppError::Conflict("Friend request already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })?
        .try_get("id")?;

        let friendship = self.get_by_id(id).await?;

        self.activities
            .record_or_log(
                actor,
                ActivityType::FriendRequest,
                "sent a friend request",
                Some(json!({ "targetUserId": target })),
            )
            .await;

        self.publish(&friendship);
        metrics::record_relationship_transition("send");

        tracing::info!(
            sender_id = actor,
            receiver_id = target,
            request_id = id,
            "Friend request sent"
        );

        self.notifications
            .notify(
                target,
                NotificationType::FriendRequest,
                "New Friend Request",
                &format!("{} sent you a friend request", friendship.sender.name),
                Some(json!({ "userId": actor, "requestId": id.to_string() })),
            )
            .await;

        Ok(friendship)
    }

    /// Accept a pending request addressed to `actor`
    pub async fn accept_friend_request(&self, actor: i64, request_id: i64) -> AppResult<Friendship> {
        let result = sqlx::query(
            "UPDATE friend SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND receiver_id = ?4 AND status = ?5",
        )
        .bind(FriendStatus::Friends.as_str())
        .bind(Utc::now())
        .bind(request_id)
        .bind(actor)
        .bind(FriendStatus::Pending.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Friend request not found".to_string()));
        }

        let friendship = self.get_by_id(request_id).await?;

        self.activities
            .record_or_log(
                actor,
                ActivityType::FriendAccept,
                "accepted friend request",
                Some(json!({ "targetUserId": friendship.sender_id })),
            )
            .await;

        self.publish(&friendship);
        metrics::record_relationship_transition("accept");

        tracing::info!(
            sender_id = friendship.sender_id,
            receiver_id = actor,
            request_id,
            "Friend request accepted"
        );

        self.notifications
            .notify(
                friendship.sender_id,
                NotificationType::FriendAccept,
                "Friend Request Accepted",
                &format!("{} accepted your friend request", friendship.receiver.name),
                Some(json!({ "userId": actor, "requestId": request_id.to_string() })),
            )
            .await;

        Ok(friendship)
    }

    /// Decline a pending request addressed to `actor`
    pub async fn reject_friend_request(&self, actor: i64, request_id: i64) -> AppResult<Friendship> {
        let friendship = self
            .find_one(
                "f.id = ?1 AND f.receiver_id = ?2 AND f.status = 'PENDING'",
                request_id,
                actor,
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Friend request not found".to_string()))?;

        let result = sqlx::query("DELETE FROM friend WHERE id = ?1 AND receiver_id = ?2 AND status = 'PENDING'")
            .bind(request_id)
            .bind(actor)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Friend request not found".to_string()));
        }

        let dissolved = friendship.dissolved();
        self.publish(&dissolved);
        metrics::record_relationship_transition("reject");

        tracing::info!(receiver_id = actor, request_id, "Friend request rejected");
        Ok(dissolved)
    }

    /// Withdraw a pending request sent by `actor`, together with the
    /// receiver's notifications about it
    pub async fn unsend_friend_request(&self, actor: i64, request_id: i64) -> AppResult<Friendship> {
        let friendship = self
            .find_one(
                "f.id = ?1 AND f.sender_id = ?2 AND f.status = 'PENDING'",
                request_id,
                actor,
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Friend request not found".to_string()))?;

        let mut tx = self.db.begin().await?;

        let deleted = sqlx::query("DELETE FROM friend WHERE id = ?1 AND sender_id = ?2 AND status = 'PENDING'")
            .bind(request_id)
            .bind(actor)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound("Friend request not found".to_string()));
        }

        let cleared = sqlx::query(
            "DELETE FROM notification
             WHERE user_id = ?1 AND type = ?2
               AND json_extract(data, '$.requestId') = ?3",
        )
        .bind(friendship.receiver_id)
        .bind(NotificationType::FriendRequest.as_str())
        .bind(request_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let dissolved = friendship.dissolved();
        self.publish(&dissolved);
        metrics::record_relationship_transition("unsend");

        tracing::info!(
            sender_id = actor,
            request_id,
            notifications_removed = cleared.rows_affected(),
            "Friend request cancelled"
        );
        Ok(dissolved)
    }

    /// End a friendship `actor` is part of
    pub async fn remove_friend(&self, actor: i64, friendship_id: i64) -> AppResult<Friendship> {
        let friendship = self
            .find_one(
                "f.id = ?1 AND (f.sender_id = ?2 OR f.receiver_id = ?2) AND f.status = 'FRIENDS'",
                friendship_id,
                actor,
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Friendship not found".to_string()))?;

        let result = sqlx::query("DELETE FROM friend WHERE id = ?1 AND status = 'FRIENDS'")
            .bind(friendship_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Friendship not found".to_string()));
        }

        let dissolved = friendship.dissolved();
        self.publish(&dissolved);
        metrics::record_relationship_transition("remove");

        tracing::info!(user_id = actor, friendship_id, "Friend removed");
        Ok(dissolved)
    }

    /// Block `target`, replacing whatever relationship exists between the pair
    pub async fn block_user(&self, actor: i64, target: i64) -> AppResult<Friendship> {
        if actor == target {
            return Err(AppError::BadRequest("Cannot block yourself".to_string()));
        }

        self.ensure_user_exists(target).await?;

        if let Some(existing) = self.get_friendship(actor, target).await? {
            if existing.status == FriendStatus::Blocked {
                if existing.sender_id == actor {
                    return Ok(existing);
                }
                return Err(AppError::Conflict("Relationship is blocked".to_string()));
            }
        }

        let (low, high) = pair_key(actor, target);
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM friend WHERE user_low = ?1 AND user_high = ?2")
            .bind(low)
            .bind(high)
            .execute(&mut *tx)
            .await?;

        let id: i64 = sqlx::query(
            "INSERT INTO friend (sender_id, receiver_id, user_low, user_high, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             RETURNING id",
        )
        .bind(actor)
        .bind(target)
        .bind(low)
        .bind(high)
        .bind(FriendStatus::Blocked.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;

        tx.commit().await?;

        let friendship = self.get_by_id(id).await?;
        self.publish(&friendship);
        metrics::record_relationship_transition("block");

        tracing::info!(blocker_id = actor, blocked_id = target, "User blocked");
        Ok(friendship)
    }

    /// Lift a block that `actor` placed on `target`
    pub async fn unblock_user(&self, actor: i64, target: i64) -> AppResult<Friendship> {
        let friendship = self
            .find_one(
                "f.sender_id = ?1 AND f.receiver_id = ?2 AND f.status = 'BLOCKED'",
                actor,
                target,
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Block not found".to_string()))?;

        sqlx::query("DELETE FROM friend WHERE id = ?1")
            .bind(friendship.id)
            .execute(&self.db)
            .await?;

        let dissolved = friendship.dissolved();
        self.publish(&dissolved);
        metrics::record_relationship_transition("unblock");

        tracing::info!(blocker_id = actor, blocked_id = target, "User unblocked");
        Ok(dissolved)
    }

    /// Relationship state between two users; NONE when no row exists
    pub async fn friend_status(&self, a: i64, b: i64) -> AppResult<FriendStatus> {
        let row = sqlx::query(
            "SELECT status FROM friend
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)",
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.db)
        .await?;

        Ok(match row {
            Some(row) => FriendStatus::from_str(&row.try_get::<String, _>("status")?),
            None => FriendStatus::None,
        })
    }

    /// The relationship row between two users, in either direction
    pub async fn get_friendship(&self, a: i64, b: i64) -> AppResult<Option<Friendship>> {
        self.find_one(
            "(f.sender_id = ?1 AND f.receiver_id = ?2) OR (f.sender_id = ?2 AND f.receiver_id = ?1)",
            a,
            b,
        )
        .await
    }

    /// Accepted friendships of a user
    pub async fn friends(&self, user_id: i64, page: &PageArgs) -> AppResult<Connection<Friendship>> {
        self.page_where(
            "(f.sender_id = ?1 OR f.receiver_id = ?1) AND f.status = 'FRIENDS'",
            user_id,
            page,
        )
        .await
    }

    /// Pending requests received by a user
    pub async fn friend_requests(&self, user_id: i64, page: &PageArgs) -> AppResult<Connection<Friendship>> {
        self.page_where("f.receiver_id = ?1 AND f.status = 'PENDING'", user_id, page)
            .await
    }

    /// Pending requests sent by a user
    pub async fn sent_requests(&self, user_id: i64, page: &PageArgs) -> AppResult<Connection<Friendship>> {
        self.page_where("f.sender_id = ?1 AND f.status = 'PENDING'", user_id, page)
            .await
    }

    /// Ids of everyone a user is friends with
    pub async fn friend_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END AS friend_id
             FROM friend
             WHERE (sender_id = ?1 OR receiver_id = ?1) AND status = 'FRIENDS'
             ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| row.try_get("friend_id"))
            .collect::<Result<Vec<i64>, _>>()?)
    }

    /// Number of accepted friendships of a user
    pub async fn count_friends(&self, user_id: i64) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM friend
             WHERE (sender_id = ?1 OR receiver_id = ?1) AND status = 'FRIENDS'",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row.try_get("n")?)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Friendship> {
        let row = sqlx::query(&select_friendships("f.id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Friend request not found".to_string()))?;
        Ok(Friendship::from_row(&row)?)
    }

    /// Single relationship matching a condition over `?1` and `?2`
    async fn find_one(&self, condition: &str, first: i64, second: i64) -> AppResult<Option<Friendship>> {
        let row = sqlx::query(&select_friendships(condition))
            .bind(first)
            .bind(second)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.as_ref().map(Friendship::from_row).transpose()?)
    }

    /// Page of relationships matching a condition over `?1`
    async fn page_where(
        &self,
        condition: &str,
        user_id: i64,
        page: &PageArgs,
    ) -> AppResult<Connection<Friendship>> {
        let page = page.resolve()?;
        let sql = format!(
            "{} ORDER BY f.id DESC LIMIT ?3",
            select_friendships(&format!("({}) AND f.id < ?2", condition))
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(page.before_or_max())
            .bind(page.fetch_limit())
            .fetch_all(&self.db)
            .await?;

        let friendships = rows
            .iter()
            .map(Friendship::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Connection::from_rows(friendships, page, |f| f.id))
    }

    async fn ensure_user_exists(&self, user_id: i64) -> AppResult<()> {
        let row = sqlx::query("SELECT 1 FROM user WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        match row {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("User not found".to_string())),
        }
    }

    fn publish(&self, friendship: &Friendship) {
        self.bus.publish(
            Topic::RelationshipChanged,
            BusEvent::FriendUpdated(friendship.clone()),
        );
    }
}
