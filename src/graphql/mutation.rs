use super::{app, require_viewer};
use crate::{
    friends::Friendship,
    notifications::{Notification, NotificationPreferences, PreferencesPatch},
    profiles::{Profile, UpdateProfileInput},
    tweets::{CreateTweetInput, Tweet},
    users::{
        AuthPayload, ForgotPasswordInput, LoginInput, RegisterInput, ResetPasswordInput,
        SuccessResponse,
    },
};
use async_graphql::{Context, Object, ResultExt};

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn register(&self, ctx: &Context<'_>, input: RegisterInput) -> async_graphql::Result<AuthPayload> {
        app(ctx)?.user_manager.register(input).await.extend()
    }

    async fn login(&self, ctx: &Context<'_>, input: LoginInput) -> async_graphql::Result<AuthPayload> {
        app(ctx)?.user_manager.login(input).await.extend()
    }

    /// Start a password reset for an email
    async fn forgot_password(
        &self,
        ctx: &Context<'_>,
        input: ForgotPasswordInput,
    ) -> async_graphql::Result<SuccessResponse> {
        app(ctx)?.user_manager.forgot_password(input).await.extend()
    }

    async fn reset_password(
        &self,
        ctx: &Context<'_>,
        input: ResetPasswordInput,
    ) -> async_graphql::Result<AuthPayload> {
        app(ctx)?.user_manager.reset_password(input).await.extend()
    }

    async fn send_friend_request(&self, ctx: &Context<'_>, user_id: i64) -> async_graphql::Result<Friendship> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .send_friend_request(viewer.id, user_id)
            .await
            .extend()
    }

    async fn accept_friend_request(
        &self,
        ctx: &Context<'_>,
        request_id: i64,
    ) -> async_graphql::Result<Friendship> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .accept_friend_request(viewer.id, request_id)
            .await
            .extend()
    }

    /// Returns the dissolved request with status NONE
    async fn reject_friend_request(
        &self,
        ctx: &Context<'_>,
        request_id: i64,
    ) -> async_graphql::Result<Friendship> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .reject_friend_request(viewer.id, request_id)
            .await
            .extend()
    }

    /// Withdraw a sent request along with the notification it produced
    async fn unsend_friend_request(
        &self,
        ctx: &Context<'_>,
        request_id: i64,
    ) -> async_graphql::Result<Friendship> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .unsend_friend_request(viewer.id, request_id)
            .await
            .extend()
    }

    async fn remove_friend(&self, ctx: &Context<'_>, friend_id: i64) -> async_graphql::Result<Friendship> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .remove_friend(viewer.id, friend_id)
            .await
            .extend()
    }

    async fn block_user(&self, ctx: &Context<'_>, user_id: i64) -> async_graphql::Result<Friendship> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .block_user(viewer.id, user_id)
            .await
            .extend()
    }

    async fn unblock_user(&self, ctx: &Context<'_>, user_id: i64) -> async_graphql::Result<Friendship> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .friend_manager
            .unblock_user(viewer.id, user_id)
            .await
            .extend()
    }

    async fn mark_notification_read(&self, ctx: &Context<'_>, id: i64) -> async_graphql::Result<Notification> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .notification_manager
            .mark_read(viewer.id, id)
            .await
            .extend()
    }

    /// Number of notifications that were unread
    async fn mark_all_notifications_read(&self, ctx: &Context<'_>) -> async_graphql::Result<u64> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .notification_manager
            .mark_all_read(viewer.id)
            .await
            .extend()
    }

    async fn update_notification_preferences(
        &self,
        ctx: &Context<'_>,
        input: PreferencesPatch,
    ) -> async_graphql::Result<NotificationPreferences> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .notification_manager
            .update_preferences(viewer.id, &input)
            .await
            .extend()
    }

    async fn update_profile(
        &self,
        ctx: &Context<'_>,
        input: UpdateProfileInput,
    ) -> async_graphql::Result<Profile> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?
            .profile_manager
            .update(viewer.id, input)
            .await
            .extend()
    }

    async fn create_tweet(&self, ctx: &Context<'_>, input: CreateTweetInput) -> async_graphql::Result<Tweet> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?.tweet_manager.create(viewer.id, input).await.extend()
    }

    async fn like_tweet(&self, ctx: &Context<'_>, id: i64) -> async_graphql::Result<Tweet> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?.tweet_manager.like(viewer.id, id).await.extend()
    }

    async fn unlike_tweet(&self, ctx: &Context<'_>, id: i64) -> async_graphql::Result<Tweet> {
        let viewer = require_viewer(ctx)?;
        app(ctx)?.tweet_manager.unlike(viewer.id, id).await.extend()
    }
}
