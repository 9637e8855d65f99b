use tracing::info;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
mod state;

pub use application::services::{
    CycleReport, MutationQueueStore, NetworkMonitor, RetryPolicy, SyncEngine, SyncEngineDeps,
    UploadQueueStore,
};
pub use domain::entities::{
    ConnectionType, MutationDraft, MutationRecord, NetworkState, QueueEvent, Reachability,
    RemovalReason, UploadDraft, UploadItem,
};
pub use infrastructure::database::ConnectionPool;
pub use infrastructure::offline::SqliteQueuePersistence;
pub use shared::{AppConfig, AppError, Result};
pub use state::AppState;

const CACHE_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Runs the sync daemon until Ctrl-C.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    config
        .validate()
        .map_err(|err| anyhow::anyhow!("Invalid configuration: {err}"))?;

    info!("fieldsync starting...");
    let state = AppState::new(config).await?;
    state.engine.init().await?;

    let shutdown = tokio_util::sync::CancellationToken::new();
    let probe = infrastructure::network::ReachabilityProbe::from_config(
        &state.config.network,
        state.network.clone(),
    )?
    .map(|probe| probe.spawn(shutdown.child_token()));
    let sweeper = state
        .read_cache
        .spawn_sweeper(CACHE_SWEEP_INTERVAL, shutdown.child_token());

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    shutdown.cancel();
    if let Some(handle) = probe {
        let _ = handle.await;
    }
    let _ = sweeper.await;
    state.engine.teardown().await;
    state.pool.close().await;
    Ok(())
}

pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldsync=debug,sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
