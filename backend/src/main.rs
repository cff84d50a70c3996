use backend::api::{self, AppState};
use backend::config::Config;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let state = AppState::new();

    // Hourly sweep removing sessions idle past the threshold.
    let sweep_store = Arc::clone(&state.store);
    let sweep_interval = config.sweep_interval;
    let idle_threshold = config.idle_threshold;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            let removed = sweep_store.expire_idle(idle_threshold);
            if removed > 0 {
                info!(removed, "expired idle sessions");
            }
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "session relay listening");
    axum::serve(listener, api::router(state)).await?;
    Ok(())
}
