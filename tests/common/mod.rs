#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fieldsync_lib::application::ports::cache::ReadCacheInvalidator;
use fieldsync_lib::application::ports::clock::Clock;
use fieldsync_lib::application::ports::remote_api::{
    RemoteApi, RemoteRequest, RemoteResponse, UploadApi, UploadResponse,
};
use fieldsync_lib::domain::value_objects::{
    Endpoint, EntityId, EntityType, HttpMethod, JobId, LocalAssetRef, MutationAction,
    MutationPayload, PayloadTag, PhotoCategory, ServerAssetId,
};
use fieldsync_lib::{
    AppConfig, AppError, ConnectionPool, ConnectionType, MutationDraft, NetworkMonitor,
    NetworkState, SqliteQueuePersistence, SyncEngine, SyncEngineDeps, UploadDraft, UploadItem,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Clock that only moves when the test says so.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc::now()),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Remote API that replays scripted responses and answers 200 once the
/// script runs out.
#[derive(Default)]
pub struct ScriptedRemoteApi {
    script: Mutex<VecDeque<Result<RemoteResponse, AppError>>>,
    calls: Mutex<Vec<RemoteRequest>>,
    on_call: Mutex<Option<Box<dyn Fn(usize) + Send>>>,
}

impl ScriptedRemoteApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_status(&self, status: u16, body: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(RemoteResponse::new(status, body.as_bytes().to_vec())));
    }

    pub fn push_error(&self, err: AppError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    /// Runs `hook(call_index)` after each request is recorded.
    pub fn on_call(&self, hook: impl Fn(usize) + Send + 'static) {
        *self.on_call.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<RemoteRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteApi for ScriptedRemoteApi {
    async fn execute(&self, request: &RemoteRequest) -> Result<RemoteResponse, AppError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.clone());
            calls.len() - 1
        };
        if let Some(hook) = self.on_call.lock().unwrap().as_ref() {
            hook(index);
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RemoteResponse::new(200, b"{}".to_vec())))
    }
}

/// Upload API that accepts everything unless scripted otherwise, and tracks
/// how many uploads overlap.
#[derive(Default)]
pub struct ScriptedUploadApi {
    script: Mutex<VecDeque<UploadResponse>>,
    uploaded: Mutex<Vec<UploadItem>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    issued: AtomicUsize,
    started: AtomicUsize,
    on_upload: Mutex<Option<Box<dyn Fn(usize) + Send>>>,
}

impl ScriptedUploadApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: UploadResponse) {
        self.script.lock().unwrap().push_back(response);
    }

    /// Runs `hook(call_index)` when an upload starts.
    pub fn on_upload(&self, hook: impl Fn(usize) + Send + 'static) {
        *self.on_upload.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn uploaded(&self) -> Vec<UploadItem> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadApi for ScriptedUploadApi {
    async fn upload(&self, item: &UploadItem) -> Result<UploadResponse, AppError> {
        let index = self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_upload.lock().unwrap().as_ref() {
            hook(index);
        }
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        self.uploaded.lock().unwrap().push(item.clone());
        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| {
            let n = self.issued.fetch_add(1, Ordering::SeqCst);
            UploadResponse::accepted(ServerAssetId::new(format!("asset-{n}")).unwrap())
        }))
    }
}

#[derive(Default)]
pub struct RecordingCache {
    invalidated: Mutex<Vec<String>>,
}

impl RecordingCache {
    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReadCacheInvalidator for RecordingCache {
    async fn invalidate_entity(&self, entity_type: &EntityType, entity_id: &EntityId) {
        self.invalidated
            .lock()
            .unwrap()
            .push(format!("{entity_type}/{entity_id}"));
    }

    async fn invalidate_job_photos(&self, job_id: &JobId) {
        self.invalidated
            .lock()
            .unwrap()
            .push(format!("photos/{job_id}"));
    }
}

pub async fn memory_persistence() -> Arc<SqliteQueuePersistence> {
    let pool = ConnectionPool::from_memory().await.expect("in-memory sqlite");
    pool.migrate().await.expect("migrations");
    Arc::new(SqliteQueuePersistence::new(pool))
}

pub async fn file_persistence(path: &std::path::Path) -> Arc<SqliteQueuePersistence> {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let pool = ConnectionPool::new(&url, 1).await.expect("file sqlite");
    pool.migrate().await.expect("migrations");
    Arc::new(SqliteQueuePersistence::new(pool))
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.sync.jitter_ratio = 0.0;
    config
}

pub struct Harness {
    pub engine: SyncEngine,
    pub api: Arc<ScriptedRemoteApi>,
    pub uploads: Arc<ScriptedUploadApi>,
    pub cache: Arc<RecordingCache>,
    pub network: NetworkMonitor,
    pub clock: Arc<ManualClock>,
    pub persistence: Arc<SqliteQueuePersistence>,
}

impl Harness {
    pub async fn new(online: bool) -> Self {
        Self::with_persistence(memory_persistence().await, online).await
    }

    pub async fn with_persistence(persistence: Arc<SqliteQueuePersistence>, online: bool) -> Self {
        let api = ScriptedRemoteApi::new();
        let uploads = ScriptedUploadApi::new();
        let cache = Arc::new(RecordingCache::default());
        let clock = ManualClock::new();
        let network = NetworkMonitor::new(if online {
            NetworkState::online(ConnectionType::Wifi)
        } else {
            NetworkState::offline()
        });

        let engine = SyncEngine::new(
            SyncEngineDeps {
                mutation_persistence: persistence.clone(),
                upload_persistence: persistence.clone(),
                remote_api: api.clone(),
                upload_api: uploads.clone(),
                cache: cache.clone(),
                network: network.clone(),
                clock: clock.clone(),
            },
            &test_config(),
        );

        Self {
            engine,
            api,
            uploads,
            cache,
            network,
            clock,
            persistence,
        }
    }

    pub fn go_online(&self) {
        self.network.publish(NetworkState::online(ConnectionType::Cellular));
    }

    pub fn go_offline(&self) {
        self.network.publish(NetworkState::offline());
    }
}

pub fn job_update(job_id: &str, status: &str) -> MutationDraft {
    let entity_type = EntityType::new("job".into()).unwrap();
    let payload = MutationPayload::encode_json(
        PayloadTag::new(entity_type.clone(), MutationAction::Update),
        &json!({ "status": status }),
    )
    .unwrap();
    MutationDraft::new(
        entity_type,
        EntityId::new(job_id.into()).unwrap(),
        MutationAction::Update,
        HttpMethod::Patch,
        Endpoint::new(format!("/jobs/{job_id}")).unwrap(),
        payload,
        format!("Set job {job_id} to {status}"),
    )
}

pub fn photo(job_id: &str, path: &str) -> UploadDraft {
    UploadDraft::new(
        LocalAssetRef::new(path.into()).unwrap(),
        JobId::new(job_id.into()).unwrap(),
        PhotoCategory::new("after".into()).unwrap(),
    )
}
