use crate::application::ports::clock::SystemClock;
use crate::application::services::{NetworkMonitor, SyncEngine, SyncEngineDeps};
use crate::domain::entities::{ConnectionType, NetworkState, Reachability};
use crate::infrastructure::cache::ReadViewCache;
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::http::{ApiClient, ReqwestRemoteApi, ReqwestUploadApi};
use crate::infrastructure::offline::SqliteQueuePersistence;
use crate::shared::config::AppConfig;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

/// Fully wired process state.
pub struct AppState {
    pub config: AppConfig,
    pub pool: ConnectionPool,
    pub network: NetworkMonitor,
    pub read_cache: Arc<ReadViewCache>,
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        ensure_database_dir(&config.database.url)?;

        let pool = ConnectionPool::new(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?;
        pool.migrate()
            .await
            .context("Failed to run queue migrations")?;

        let persistence = Arc::new(SqliteQueuePersistence::new(pool.clone()));
        let client = ApiClient::from_config(&config.api).context("Invalid API configuration")?;
        let read_cache = Arc::new(ReadViewCache::default());

        // プローブがある場合はその結果を待つ
        let initial = if config.network.probe_url.is_some() {
            NetworkState::offline()
        } else {
            NetworkState::new(true, Reachability::Unknown, ConnectionType::Unknown)
        };
        let network = NetworkMonitor::new(initial);

        let engine = Arc::new(SyncEngine::new(
            SyncEngineDeps {
                mutation_persistence: persistence.clone(),
                upload_persistence: persistence,
                remote_api: Arc::new(ReqwestRemoteApi::new(client.clone())),
                upload_api: Arc::new(ReqwestUploadApi::new(client)),
                cache: read_cache.clone(),
                network: network.clone(),
                clock: Arc::new(SystemClock),
            },
            &config,
        ));

        Ok(Self {
            config,
            pool,
            network,
            read_cache,
            engine,
        })
    }
}

fn ensure_database_dir(url: &str) -> anyhow::Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}
