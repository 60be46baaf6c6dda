/// befriends - social networking backend
///
/// Friend relationships, an activity feed, a notification pipeline and
/// tweets, served over a GraphQL API with real-time subscriptions.
pub mod activity;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod friends;
pub mod graphql;
pub mod metrics;
pub mod notifications;
pub mod pagination;
pub mod profiles;
pub mod pubsub;
pub mod rate_limit;
pub mod server;
pub mod tweets;
pub mod users;
pub mod validation;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{AppError, AppResult};
