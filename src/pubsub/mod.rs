/// Real-time publish/subscribe bus
///
/// Mutations publish events on named topics; GraphQL subscriptions consume
/// them as streams. Nothing is persisted: a subscriber only sees events
/// published after it subscribed.

pub mod memory;

pub use memory::InMemoryBroadcaster;

use crate::activity::Activity;
use crate::friends::Friendship;
use crate::notifications::Notification;
use crate::profiles::Profile;
use futures::stream::{BoxStream, StreamExt};
use std::fmt;

/// Topic an event is published on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Any friend relationship transition
    RelationshipChanged,
    /// Any new activity
    ActivityCreated,
    NotificationReceived(i64),
    NotificationUpdated(i64),
    ProfileUpdated(i64),
    UserActivityCreated(i64),
}

impl Topic {
    /// Topic family without the user suffix, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Topic::RelationshipChanged => "relationship-changed",
            Topic::ActivityCreated => "activity-created",
            Topic::NotificationReceived(_) => "notification-received",
            Topic::NotificationUpdated(_) => "notification-updated",
            Topic::ProfileUpdated(_) => "profile-updated",
            Topic::UserActivityCreated(_) => "user-activity-created",
        }
    }

    /// Registry key, e.g. `notification-received:42`
    pub fn key(&self) -> String {
        match self {
            Topic::RelationshipChanged | Topic::ActivityCreated => self.kind().to_string(),
            Topic::NotificationReceived(id)
            | Topic::NotificationUpdated(id)
            | Topic::ProfileUpdated(id)
            | Topic::UserActivityCreated(id) => format!("{}:{}", self.kind(), id),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Event carried by the bus
#[derive(Debug, Clone)]
pub enum BusEvent {
    FriendUpdated(Friendship),
    ActivityCreated(Activity),
    NotificationReceived(Notification),
    NotificationUpdated(Notification),
    ProfileUpdated(Profile),
}

/// Predicate applied server-side before an event reaches a subscriber
pub type EventFilter = Box<dyn Fn(&BusEvent) -> bool + Send + Sync>;

/// Broadcast service injected through the application context
pub trait Broadcaster: Send + Sync {
    /// Deliver an event to current subscribers of a topic.
    /// Returns how many subscribers received it.
    fn publish(&self, topic: Topic, event: BusEvent) -> usize;

    /// Stream of events published on a topic from now on
    fn subscribe(&self, topic: Topic) -> BoxStream<'static, BusEvent>;

    /// Number of live subscribers on a topic
    fn subscriber_count(&self, topic: &Topic) -> usize;

    /// Like `subscribe`, dropping events the predicate rejects
    fn subscribe_filtered(&self, topic: Topic, predicate: EventFilter) -> BoxStream<'static, BusEvent> {
        self.subscribe(topic)
            .filter(move |event| futures::future::ready(predicate(event)))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_keys() {
        assert_eq!(Topic::RelationshipChanged.key(), "relationship-changed");
        assert_eq!(Topic::ActivityCreated.to_string(), "activity-created");
        assert_eq!(Topic::NotificationReceived(7).key(), "notification-received:7");
        assert_eq!(Topic::NotificationUpdated(7).key(), "notification-updated:7");
        assert_eq!(Topic::ProfileUpdated(3).key(), "profile-updated:3");
        assert_eq!(Topic::UserActivityCreated(3).key(), "user-activity-created:3");
        assert_eq!(Topic::UserActivityCreated(3).kind(), "user-activity-created");
    }
}
