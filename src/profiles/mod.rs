/// User profiles
///
/// Every user has exactly one profile row, created at registration.
use crate::{
    activity::{ActivityManager, ActivityType},
    error::{AppError, AppResult},
    notifications::{NotificationManager, NotificationType},
    pubsub::{Broadcaster, BusEvent, Topic},
    validation::{url_or_empty, validate_input},
};
use async_graphql::{InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use validator::Validate;

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleObject)]
pub struct SocialLinks {
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, SimpleObject)]
pub struct ProfileStats {
    pub friends_count: i64,
    pub activities_count: i64,
    pub posts_count: i64,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub social_links: SocialLinks,
    pub stats: ProfileStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Profile {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            bio: row.try_get("bio")?,
            location: row.try_get("location")?,
            website: row.try_get("website")?,
            avatar: row.try_get("avatar")?,
            cover_image: row.try_get("cover_image")?,
            social_links: SocialLinks {
                twitter: row.try_get("twitter")?,
                github: row.try_get("github")?,
                linkedin: row.try_get("linkedin")?,
            },
            stats: ProfileStats {
                friends_count: row.try_get("friends_count")?,
                activities_count: row.try_get("activities_count")?,
                posts_count: row.try_get("posts_count")?,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, InputObject, Validate)]
pub struct SocialLinksInput {
    #[validate(custom(function = "url_or_empty"))]
    pub twitter: Option<String>,
    #[validate(custom(function = "url_or_empty"))]
    pub github: Option<String>,
    #[validate(custom(function = "url_or_empty"))]
    pub linkedin: Option<String>,
}

fn trim(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Partial profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, InputObject, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Bio must not exceed 500 characters"))]
    pub bio: Option<String>,
    #[validate(length(max = 100, message = "Location must not exceed 100 characters"))]
    pub location: Option<String>,
    #[validate(custom(function = "url_or_empty", message = "Invalid website URL"))]
    pub website: Option<String>,
    #[validate(nested)]
    pub social_links: Option<SocialLinksInput>,
}

impl UpdateProfileInput {
    /// Strip surrounding whitespace from every supplied field
    fn trimmed(self) -> Self {
        Self {
            name: trim(self.name),
            bio: trim(self.bio),
            location: trim(self.location),
            website: trim(self.website),
            social_links: self.social_links.map(|links| SocialLinksInput {
                twitter: trim(links.twitter),
                github: trim(links.github),
                linkedin: trim(links.linkedin),
            }),
        }
    }
}

const SELECT_PROFILE: &str = "
    SELECT p.id, p.user_id, p.name, p.bio, p.location, p.website, p.avatar, p.cover_image,
           p.twitter, p.github, p.linkedin, p.created_at, p.updated_at,
           (SELECT COUNT(*) FROM friend f
             WHERE (f.sender_id = p.user_id OR f.receiver_id = p.user_id)
               AND f.status = 'FRIENDS') AS friends_count,
           (SELECT COUNT(*) FROM activity a WHERE a.user_id = p.user_id) AS activities_count,
           (SELECT COUNT(*) FROM tweet t WHERE t.author_id = p.user_id) AS posts_count
    FROM profile p
    WHERE p.user_id = ?1";

/// Profile manager service
pub struct ProfileManager {
    db: SqlitePool,
    activities: Arc<ActivityManager>,
    notifications: Arc<NotificationManager>,
    bus: Arc<dyn Broadcaster>,
}

impl ProfileManager {
    /// Create a new profile manager
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

    /// A user's profile with stats
    pub async fn get(&self, user_id: i64) -> AppResult<Profile> {
        let row = sqlx::query(SELECT_PROFILE)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
        Ok(Profile::from_row(&row)?)
    }

    /// Apply a validated partial update to the owner's profile
    pub async fn update(&self, user_id: i64, input: UpdateProfileInput) -> AppResult<Profile> {
        let input = input.trimmed();
        validate_input(&input)?;

        let links = input.social_links.unwrap_or_default();
        let name = input.name;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE profile SET
                name = COALESCE(?1, name),
                bio = COALESCE(?2, bio),
                location = COALESCE(?3, location),
                website = COALESCE(?4, website),
                twitter = COALESCE(?5, twitter),
                github = COALESCE(?6, github),
                linkedin = COALESCE(?7, linkedin),
                updated_at = ?8
             WHERE user_id = ?9",
        )
        .bind(&name)
        .bind(&input.bio)
        .bind(&input.location)
        .bind(&input.website)
        .bind(&links.twitter)
        .bind(&links.github)
        .bind(&links.linkedin)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound("Profile not found".to_string()));
        }

        // Keep the account name used in public summaries in step
        if let Some(name) = &name {
            sqlx::query("UPDATE user SET name = ?1 WHERE id = ?2")
                .bind(name)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.activities
            .record_or_log(user_id, ActivityType::ProfileUpdate, "updated their profile", None)
            .await;

        let profile = self.get(user_id).await?;

        self.bus.publish(
            Topic::ProfileUpdated(user_id),
            BusEvent::ProfileUpdated(profile.clone()),
        );

        tracing::info!(user_id, "Profile updated");

        self.notifications
            .notify(
                user_id,
                NotificationType::System,
                "Profile Updated",
                "Your profile has been successfully updated.",
                Some(json!({ "userId": user_id })),
            )
            .await;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, notifications::NotificationFilters, pubsub::InMemoryBroadcaster, users};
    use futures::StreamExt;

    struct Harness {
        pool: SqlitePool,
        bus: Arc<InMemoryBroadcaster>,
        profiles: ProfileManager,
        notifications: Arc<NotificationManager>,
    }

    async fn setup() -> Harness {
        let pool = db::test_pool().await;
        let bus = Arc::new(InMemoryBroadcaster::new(16));
        let activities = Arc::new(ActivityManager::new(pool.clone(), bus.clone()));
        let notifications = Arc::new(NotificationManager::new(pool.clone(), bus.clone()));
        let profiles = ProfileManager::new(pool.clone(), activities, notifications.clone(), bus.clone());
        Harness {
            pool,
            bus,
            profiles,
            notifications,
        }
    }

    #[tokio::test]
    async fn test_new_profile_has_zero_stats() {
        let h = setup().await;
        let alice = users::tests::register(&h.pool, "Alice").await;

        let profile = h.profiles.get(alice).await.unwrap();
        assert_eq!(profile.name, "Alice");
        assert_eq!(profile.stats, ProfileStats::default());
        assert_eq!(profile.social_links, SocialLinks::default());
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let h = setup().await;
        assert!(matches!(h.profiles.get(42).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_merges_and_fans_out() {
        let h = setup().await;
        let alice = users::tests::register(&h.pool, "Alice").await;
        let mut live = h.bus.subscribe(Topic::ProfileUpdated(alice));

        let updated = h
            .profiles
            .update(
                alice,
                UpdateProfileInput {
                    bio: Some("Hello there".to_string()),
                    website: Some("https://alice.dev".to_string()),
                    social_links: Some(SocialLinksInput {
                        github: Some("https://github.com/alice".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Alice");
        assert_eq!(updated.bio.as_deref(), Some("Hello there"));
        assert_eq!(updated.social_links.github.as_deref(), Some("https://github.com/alice"));
        assert_eq!(updated.stats.activities_count, 1);

        match live.next().await.unwrap() {
            BusEvent::ProfileUpdated(p) => assert_eq!(p.id, updated.id),
            other => panic!("unexpected event {:?}", other),
        }

        let inbox = h.notifications.list(alice, &NotificationFilters::default()).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::System);

        // A later partial update keeps earlier fields
        let renamed = h
            .profiles
            .update(
                alice,
                UpdateProfileInput {
                    name: Some("Alice Liddell".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Alice Liddell");
        assert_eq!(renamed.bio.as_deref(), Some("Hello there"));

        let summary = users::tests::manager(&h.pool).get_summary(alice).await.unwrap();
        assert_eq!(summary.name, "Alice Liddell");
    }

    #[tokio::test]
    async fn test_empty_link_clears_value() {
        let h = setup().await;
        let alice = users::tests::register(&h.pool, "Alice").await;

        h.profiles
            .update(
                alice,
                UpdateProfileInput {
                    website: Some("https://alice.dev".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let cleared = h
            .profiles
            .update(
                alice,
                UpdateProfileInput {
                    website: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.website.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_with_details() {
        let h = setup().await;
        let alice = users::tests::register(&h.pool, "Alice").await;

        let err = h
            .profiles
            .update(
                alice,
                UpdateProfileInput {
                    name: Some("A".to_string()),
                    bio: Some("x".repeat(501)),
                    social_links: Some(SocialLinksInput {
                        twitter: Some("not a url".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        match err {
            AppError::Validation(details) => {
                let paths: Vec<&str> = details.iter().map(|d| d.path.as_str()).collect();
                assert_eq!(paths, vec!["bio", "name", "socialLinks.twitter"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        // Nothing was written
        assert_eq!(h.profiles.get(alice).await.unwrap().stats.activities_count, 0);
    }

    #[tokio::test]
    async fn test_fields_trimmed_before_validation() {
        let h = setup().await;
        let alice = users::tests::register(&h.pool, "Alice").await;

        let err = h
            .profiles
            .update(
                alice,
                UpdateProfileInput {
                    name: Some("  a  ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        match err {
            AppError::Validation(details) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].path, "name");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(h.profiles.get(alice).await.unwrap().name, "Alice");

        let updated = h
            .profiles
            .update(
                alice,
                UpdateProfileInput {
                    name: Some("  Al  ".to_string()),
                    location: Some(format!("{}  ", "x".repeat(100))),
                    website: Some(" https://alice.dev ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Al");
        assert_eq!(updated.location.as_deref().map(str::len), Some(100));
        assert_eq!(updated.website.as_deref(), Some("https://alice.dev"));
    }
}
