use super::{app, require_viewer};
use crate::{
    activity::Activity,
    friends::Friendship,
    notifications::Notification,
    profiles::Profile,
    pubsub::{Broadcaster, BusEvent, Topic},
};
use async_graphql::{Context, Subscription};
use futures::{future, Stream, StreamExt};

pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Relationship changes the viewer is a party to
    async fn friend_updated(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<impl Stream<Item = Friendship>> {
        let viewer = require_viewer(ctx)?;
        let stream = app(ctx)?.bus.subscribe_filtered(
            Topic::RelationshipChanged,
            Box::new(move |event: &BusEvent| {
                matches!(event, BusEvent::FriendUpdated(friendship) if friendship.involves(viewer.id))
            }),
        );

        Ok(stream.filter_map(|event| {
            future::ready(match event {
                BusEvent::FriendUpdated(friendship) => Some(friendship),
                _ => None,
            })
        }))
    }

    /// Every new activity
    async fn activity_created(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<impl Stream<Item = Activity>> {
        require_viewer(ctx)?;
        Ok(activities(app(ctx)?.bus.subscribe(Topic::ActivityCreated)))
    }

    /// New activities of one user
    async fn user_activity_created(
        &self,
        ctx: &Context<'_>,
        user_id: i64,
    ) -> async_graphql::Result<impl Stream<Item = Activity>> {
        require_viewer(ctx)?;
        Ok(activities(app(ctx)?.bus.subscribe(Topic::UserActivityCreated(user_id))))
    }

    /// Notifications delivered to the viewer
    async fn notification_received(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<impl Stream<Item = Notification>> {
        let viewer = require_viewer(ctx)?;
        let stream = app(ctx)?.bus.subscribe(Topic::NotificationReceived(viewer.id));

        Ok(stream.filter_map(|event| {
            future::ready(match event {
                BusEvent::NotificationReceived(notification) => Some(notification),
                _ => None,
            })
        }))
    }

    /// The viewer's notifications as they are marked read
    async fn notification_updated(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<impl Stream<Item = Notification>> {
        let viewer = require_viewer(ctx)?;
        let stream = app(ctx)?.bus.subscribe(Topic::NotificationUpdated(viewer.id));

        Ok(stream.filter_map(|event| {
            future::ready(match event {
                BusEvent::NotificationUpdated(notification) => Some(notification),
                _ => None,
            })
        }))
    }

    async fn profile_updated(
        &self,
        ctx: &Context<'_>,
        user_id: i64,
    ) -> async_graphql::Result<impl Stream<Item = Profile>> {
        require_viewer(ctx)?;
        let stream = app(ctx)?.bus.subscribe(Topic::ProfileUpdated(user_id));

        Ok(stream.filter_map(|event| {
            future::ready(match event {
                BusEvent::ProfileUpdated(profile) => Some(profile),
                _ => None,
            })
        }))
    }
}

fn activities(
    stream: futures::stream::BoxStream<'static, BusEvent>,
) -> impl Stream<Item = Activity> {
    stream.filter_map(|event| {
        future::ready(match event {
            BusEvent::ActivityCreated(activity) => Some(activity),
            _ => None,
        })
    })
}
