/// befriends server binary
use befriends::{config::ServerConfig, context::AppContext, error::AppResult, server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AppResult<()> {
    let config = ServerConfig::from_env()?;

    init_tracing(&config.logging.level, config.logging.json);

    tracing::info!(
        version = %config.service.version,
        database = %config.storage.database_path.display(),
        rate_limits = config.rate_limit.enabled,
        "Starting befriends"
    );

    let ctx = AppContext::new(config).await?;
    server::serve(ctx).await
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_new(level)
        .unwrap_or_else(|_| EnvFilter::new("befriends=debug,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
