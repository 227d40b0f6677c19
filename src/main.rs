use anyhow::{Context, Result};
use earnwatch::{
    config::Config,
    services::{DiscordNotifier, EarnAppClient, RedisStore, Reconciler, RunState},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting earnwatch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);

    // Initialize collaborators
    let remote = Arc::new(
        EarnAppClient::new(&config.earnapp_base_url, &config.earnapp_token)
            .context("Failed to build EarnApp client")?,
    );
    let store = Arc::new(
        RedisStore::connect(&config.redis_url, &config.redis_key_prefix)
            .await
            .context("Failed to connect to Redis")?,
    );
    store.ping().await.context("Redis did not answer PING")?;
    let notifier = Arc::new(DiscordNotifier::new(config.webhook_url.clone()));

    let reconciler = Reconciler::new(remote, store, notifier, config.retry_policy());
    let report = reconciler.run().await;

    match report.state {
        RunState::Done => tracing::info!(
            "Run finished: {} notifications sent, {} failed writes",
            report.notifications_sent,
            report.persistence_failures
        ),
        _ => tracing::error!(
            "Run failed: {}",
            report.failure.as_deref().unwrap_or("unknown error")
        ),
    }

    Ok(())
}
