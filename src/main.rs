use anyhow::Result;
use std::sync::Arc;

use limitd::config::Config;
use limitd::handlers::AppState;
use limitd::limiter::Limiter;
use limitd::metrics::Metrics;
use limitd::server::Server;
use limitd::store::{AtomicStore, RedisStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config =
        Config::from_env().map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("limitd={},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        bind_addr = %config.bind_addr,
        redis_url = %config.redis_url,
        timeout_ms = config.redis_timeout_ms,
        "starting limitd"
    );

    let metrics =
        Arc::new(Metrics::new().map_err(|e| anyhow::anyhow!("failed to register metrics: {e}"))?);

    let store = Arc::new(RedisStore::new(&config).map_err(|e| anyhow::anyhow!("{e}"))?);
    if let Err(err) = store.connect().await {
        // Not fatal: the connection is retried on the next check and every
        // check fails open until the store comes back.
        tracing::warn!(error = %err, "redis unreachable at startup, running fail-open");
    }

    let store: Arc<dyn AtomicStore> = store;
    let limiter = Limiter::new(store.clone(), metrics.clone());
    let state = Arc::new(AppState {
        limiter,
        store,
        metrics,
    });

    Server::new(config, state)
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    Ok(())
}
