use super::cycle_report::CycleReport;
use super::mutation_processor::MutationProcessor;
use super::mutation_queue::{MutationQueueEvent, MutationQueueStore};
use super::network_monitor::NetworkMonitor;
use super::retry_policy::RetryPolicy;
use super::upload_processor::UploadProcessor;
use super::upload_queue::{UploadQueueEvent, UploadQueueStore};
use crate::application::ports::cache::ReadCacheInvalidator;
use crate::application::ports::clock::Clock;
use crate::application::ports::queue_store::{MutationPersistence, UploadPersistence};
use crate::application::ports::remote_api::{RemoteApi, UploadApi};
use crate::domain::entities::{MutationDraft, MutationRecord, UploadDraft, UploadItem};
use crate::domain::value_objects::{MutationId, MutationStatus, UploadId, UploadStatus};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Collaborators the engine is assembled from.
pub struct SyncEngineDeps {
    pub mutation_persistence: Arc<dyn MutationPersistence>,
    pub upload_persistence: Arc<dyn UploadPersistence>,
    pub remote_api: Arc<dyn RemoteApi>,
    pub upload_api: Arc<dyn UploadApi>,
    pub cache: Arc<dyn ReadCacheInvalidator>,
    pub network: NetworkMonitor,
    pub clock: Arc<dyn Clock>,
}

struct EngineRuntime {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// UI-facing entry point: owns both queues and their processors.
pub struct SyncEngine {
    mutations: Arc<MutationQueueStore>,
    uploads: Arc<UploadQueueStore>,
    mutation_processor: Arc<MutationProcessor>,
    upload_processor: Arc<UploadProcessor>,
    network: NetworkMonitor,
    runtime: Mutex<Option<EngineRuntime>>,
}

impl SyncEngine {
    pub fn new(deps: SyncEngineDeps, config: &AppConfig) -> Self {
        let policy = RetryPolicy::from_config(&config.sync);
        let request_timeout = config.api.request_timeout();

        let mutations = Arc::new(MutationQueueStore::new(
            deps.mutation_persistence,
            deps.clock.clone(),
        ));
        let uploads = Arc::new(UploadQueueStore::new(
            deps.upload_persistence,
            deps.clock.clone(),
            config.upload.max_per_job,
        ));

        let mutation_processor = MutationProcessor::new(
            mutations.clone(),
            deps.remote_api,
            deps.cache.clone(),
            deps.network.clone(),
            policy.clone(),
            deps.clock.clone(),
            request_timeout,
        );
        let upload_processor = UploadProcessor::new(
            uploads.clone(),
            deps.upload_api,
            deps.cache,
            deps.network.clone(),
            policy,
            deps.clock,
            request_timeout,
            config.upload.max_concurrent,
        );

        Self {
            mutations,
            uploads,
            mutation_processor,
            upload_processor,
            network: deps.network,
            runtime: Mutex::new(None),
        }
    }

    /// Restores both queues from durable storage, then starts the background
    /// processors. Calling it again while running only re-runs the (idempotent)
    /// restore.
    pub async fn init(&self) -> Result<(), AppError> {
        let restored_mutations = self.mutations.restore().await?;
        let restored_uploads = self.uploads.restore().await?;

        let mut runtime = self.runtime.lock().await;
        if runtime.is_none() {
            let shutdown = CancellationToken::new();
            let handles = vec![
                self.mutation_processor.spawn(shutdown.child_token()),
                self.upload_processor.spawn(shutdown.child_token()),
            ];
            *runtime = Some(EngineRuntime { shutdown, handles });
        }

        tracing::info!(
            target: "sync::mutation",
            mutations = restored_mutations,
            uploads = restored_uploads,
            online = self.network.is_online(),
            "sync engine started"
        );
        Ok(())
    }

    /// Stops the processors and waits for their loops to exit.
    pub async fn teardown(&self) {
        let Some(runtime) = self.runtime.lock().await.take() else {
            return;
        };
        runtime.shutdown.cancel();
        for handle in runtime.handles {
            if let Err(err) = handle.await {
                tracing::warn!(target: "sync::mutation", error = %err, "processor task ended abnormally");
            }
        }
        tracing::info!(target: "sync::mutation", "sync engine stopped");
    }

    /// Session end: stops processing and wipes both queues, in memory and on
    /// disk. Both queues are cleared even if one durable clear fails; the
    /// first error is returned. Call [`SyncEngine::init`] to start again.
    pub async fn reset(&self) -> Result<(), AppError> {
        self.teardown().await;
        let mutations = self.mutations.reset().await;
        let uploads = self.uploads.reset().await;
        mutations.and(uploads)
    }

    /// Runs one cycle of each processor in the caller's task.
    pub async fn sync_now(&self) -> Result<(CycleReport, CycleReport), AppError> {
        let mutations = self.mutation_processor.run_cycle().await?;
        let uploads = self.upload_processor.run_cycle().await?;
        Ok((mutations, uploads))
    }

    /// Wakes the background processors without waiting for them, e.g. when
    /// the app returns to the foreground.
    pub fn request_sync(&self) {
        self.mutation_processor.trigger();
        self.upload_processor.trigger();
    }

    pub async fn enqueue_mutation(&self, draft: MutationDraft) -> Result<MutationId, AppError> {
        self.mutations.enqueue(draft).await
    }

    pub async fn enqueue_upload(&self, draft: UploadDraft) -> Result<UploadId, AppError> {
        self.uploads.enqueue(draft).await
    }

    pub async fn retry_mutation(&self, id: &MutationId) -> Result<MutationRecord, AppError> {
        self.mutations.retry(id).await
    }

    pub async fn discard_mutation(&self, id: &MutationId) -> Result<MutationRecord, AppError> {
        self.mutations.discard(id).await
    }

    pub async fn retry_upload(&self, id: &UploadId) -> Result<UploadItem, AppError> {
        self.uploads.retry(id).await
    }

    pub async fn discard_upload(&self, id: &UploadId) -> Result<UploadItem, AppError> {
        self.uploads.discard(id).await
    }

    pub async fn failed_mutations(&self) -> Vec<MutationRecord> {
        self.mutations.failed_records().await
    }

    pub async fn failed_uploads(&self) -> Vec<UploadItem> {
        self.uploads.failed_items().await
    }

    pub async fn mutation_status(&self, id: &MutationId) -> Option<MutationStatus> {
        self.mutations.status_of(id).await
    }

    pub async fn upload_status(&self, id: &UploadId) -> Option<UploadStatus> {
        self.uploads.status_of(id).await
    }

    pub fn pending_mutations(&self) -> usize {
        self.mutations.pending_count()
    }

    pub fn pending_uploads(&self) -> usize {
        self.uploads.pending_count()
    }

    pub fn subscribe_mutations(&self) -> broadcast::Receiver<MutationQueueEvent> {
        self.mutations.subscribe()
    }

    pub fn subscribe_uploads(&self) -> broadcast::Receiver<UploadQueueEvent> {
        self.uploads.subscribe()
    }

    pub fn watch_pending_mutations(&self) -> watch::Receiver<usize> {
        self.mutations.subscribe_pending_count()
    }

    pub fn watch_pending_uploads(&self) -> watch::Receiver<usize> {
        self.uploads.subscribe_pending_count()
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn mutation_queue(&self) -> &Arc<MutationQueueStore> {
        &self.mutations
    }

    pub fn upload_queue(&self) -> &Arc<UploadQueueStore> {
        &self.uploads
    }

    pub async fn is_running(&self) -> bool {
        self.runtime.lock().await.is_some()
    }
}
