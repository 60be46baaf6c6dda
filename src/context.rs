/// Application context and dependency injection
use crate::{
    activity::ActivityManager,
    config::ServerConfig,
    db,
    error::AppResult,
    friends::FriendManager,
    notifications::NotificationManager,
    profiles::ProfileManager,
    pubsub::{Broadcaster, InMemoryBroadcaster},
    rate_limit::RateLimiter,
    tweets::TweetManager,
    users::UserManager,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    /// Real-time event bus shared by every manager and subscription
    pub bus: Arc<dyn Broadcaster>,
    pub user_manager: Arc<UserManager>,
    pub friend_manager: Arc<FriendManager>,
    pub notification_manager: Arc<NotificationManager>,
    pub activity_manager: Arc<ActivityManager>,
    pub profile_manager: Arc<ProfileManager>,
    pub tweet_manager: Arc<TweetManager>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        let options = db::DatabaseOptions {
            max_connections: config.storage.max_connections,
            ..Default::default()
        };
        let pool = db::create_pool(&config.storage.database_path, options).await?;

        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        tracing::info!(
            path = %config.storage.database_path.display(),
            "Database ready"
        );

        Ok(Self::from_pool(config, pool))
    }

    /// Context over a fresh in-memory database, used by tests and demos
    pub async fn in_memory(config: ServerConfig) -> AppResult<Self> {
        let pool = db::create_memory_pool().await?;
        db::run_migrations(&pool).await?;
        Ok(Self::from_pool(config, pool))
    }

    /// Wire every manager over an existing pool
    pub fn from_pool(config: ServerConfig, pool: SqlitePool) -> Self {
        let config = Arc::new(config);
        let bus: Arc<dyn Broadcaster> =
            Arc::new(InMemoryBroadcaster::new(config.pubsub.channel_capacity));

        let activity_manager = Arc::new(ActivityManager::new(pool.clone(), bus.clone()));
        let notification_manager = Arc::new(NotificationManager::new(pool.clone(), bus.clone()));
        let user_manager = Arc::new(UserManager::new(
            pool.clone(),
            config.clone(),
            notification_manager.clone(),
        ));
        let friend_manager = Arc::new(FriendManager::new(
            pool.clone(),
            activity_manager.clone(),
            notification_manager.clone(),
            bus.clone(),
        ));
        let profile_manager = Arc::new(ProfileManager::new(
            pool.clone(),
            activity_manager.clone(),
            notification_manager.clone(),
            bus.clone(),
        ));
        let tweet_manager = Arc::new(TweetManager::new(pool.clone(), activity_manager.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            config,
            db: pool,
            bus,
            user_manager,
            friend_manager,
            notification_manager,
            activity_manager,
            profile_manager,
            tweet_manager,
            rate_limiter,
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
