use super::{app, require_viewer, viewer};
use crate::{
    activity::{Activity, ActivityType},
    friends::{FriendStatus, Friendship},
    notifications::{Notification, NotificationFilters, NotificationPreferences},
    pagination::{Connection, PageArgs},
    profiles::Profile,
    tweets::Tweet,
    users::{ResetTokenValidation, UserSearchResult, UserSummary},
};
use async_graphql::{Context, Object, ResultExt};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The authenticated user
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<UserSummary> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?.user_manager.get_summary(viewer.id).await.extend()
    }

    /// The viewer's accepted friendships
    async fn friends(
        &self,
        ctx: &Context<'_>,
        cursor: Option<String>,
        limit: Option<i32>,
    ) -> async_graphql::Result<Connection<Friendship>> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .friends(viewer.id, &PageArgs::new(cursor, limit))
            .await
            .extend()
    }

    /// Pending requests received by the viewer
    async fn friend_requests(
        &self,
        ctx: &Context<'_>,
        cursor: Option<String>,
        limit: Option<i32>,
    ) -> async_graphql::Result<Connection<Friendship>> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .friend_requests(viewer.id, &PageArgs::new(cursor, limit))
            .await
            .extend()
    }

    /// Pending requests sent by the viewer
    async fn sent_requests(
        &self,
        ctx: &Context<'_>,
        cursor: Option<String>,
        limit: Option<i32>,
    ) -> async_graphql::Result<Connection<Friendship>> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .sent_requests(viewer.id, &PageArgs::new(cursor, limit))
            .await
            .extend()
    }

    async fn friend_status(&self, ctx: &Context<'_>, user_id: i64) -> async_graphql::Result<FriendStatus> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .friend_status(viewer.id, user_id)
            .await
            .extend()
    }

    /// Users whose name or email contains the query
    async fn search_users(
        &self,
        ctx: &Context<'_>,
        query: String,
    ) -> async_graphql::Result<Vec<UserSearchResult>> {
        let viewer = viewer(ctx).map(|v| v.id);
        app(ctx)?.user_manager.search(viewer, &query).await.extend()
    }

    /// Feed of the viewer's and the viewer's friends' activities
    async fn activities(
        &self,
        ctx: &Context<'_>,
        cursor: Option<String>,
        limit: Option<i32>,
        #[graphql(name = "type")] types: Option<Vec<ActivityType>>,
    ) -> async_graphql::Result<Connection<Activity>> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .activity_manager
            .feed(
                viewer.id,
                &PageArgs::new(cursor, limit),
                types.as_deref().unwrap_or(&[]),
            )
            .await
            .extend()
    }

    async fn user_activities(
        &self,
        ctx: &Context<'_>,
        user_id: i64,
        cursor: Option<String>,
        limit: Option<i32>,
        #[graphql(name = "type")] types: Option<Vec<ActivityType>>,
    ) -> async_graphql::Result<Connection<Activity>> {
        require_viewer(ctx)?;
        app(ctx)?
            .activity_manager
            .user_activities(
                user_id,
                &PageArgs::new(cursor, limit),
                types.as_deref().unwrap_or(&[]),
            )
            .await
            .extend()
    }

    async fn notifications(
        &self,
        ctx: &Context<'_>,
        filters: Option<NotificationFilters>,
    ) -> async_graphql::Result<Vec<Notification>> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .notification_manager
            .list(viewer.id, &filters.unwrap_or_default())
            .await
            .extend()
    }

    async fn unread_notification_count(&self, ctx: &Context<'_>) -> async_graphql::Result<i64> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .notification_manager
            .unread_count(viewer.id)
            .await
            .extend()
    }

    async fn notification_preferences(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<NotificationPreferences> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .notification_manager
            .get_or_create_preferences(viewer.id)
            .await
            .extend()
    }

    /// A user's profile; the viewer's own when `userId` is omitted
    async fn profile(&self, ctx: &Context<'_>, user_id: Option<i64>) -> async_graphql::Result<Profile> {
        let user_id = match user_id {
            Some(id) => id,
            None => require_viewer(ctx)?.id,
        };
        app(ctx)?.profile_manager.get(user_id).await.extend()
    }

    /// Public timeline, newest first
    async fn tweets(
        &self,
        ctx: &Context<'_>,
        cursor: Option<String>,
        limit: Option<i32>,
    ) -> async_graphql::Result<Connection<Tweet>> {
        let viewer = viewer(ctx).map(|v| v.id);
        app(ctx)?
            .tweet_manager
            .list(viewer, &PageArgs::new(cursor, limit))
            .await
            .extend()
    }

    async fn tweet(&self, ctx: &Context<'_>, id: i64) -> async_graphql::Result<Tweet> {
        let viewer = viewer(ctx).map(|v| v.id);
        app(ctx)?.tweet_manager.get(viewer, id).await.extend()
    }

    async fn validate_reset_token(
        &self,
        ctx: &Context<'_>,
        token: String,
    ) -> async_graphql::Result<ResetTokenValidation> {
        app(ctx)?.user_manager.validate_reset_token(&token).await.extend()
    }
}
