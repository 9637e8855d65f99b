use super::memory_cache::MemoryCacheService;
use crate::application::ports::cache::ReadCacheInvalidator;
use crate::domain::value_objects::{EntityId, EntityType, JobId};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Cached server read views the UI renders while offline.
#[derive(Clone)]
pub struct ReadViewCache {
    cache: MemoryCacheService<Value>,
}

impl ReadViewCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: MemoryCacheService::new(ttl),
        }
    }

    fn entity_key(entity_type: &EntityType, entity_id: &EntityId) -> String {
        format!("entity:{entity_type}:{entity_id}")
    }

    fn job_photos_key(job_id: &JobId) -> String {
        format!("job_photos:{job_id}")
    }

    pub async fn put_entity(&self, entity_type: &EntityType, entity_id: &EntityId, view: Value) {
        self.cache
            .set(Self::entity_key(entity_type, entity_id), view)
            .await;
    }

    pub async fn entity(&self, entity_type: &EntityType, entity_id: &EntityId) -> Option<Value> {
        self.cache.get(&Self::entity_key(entity_type, entity_id)).await
    }

    pub async fn put_job_photos(&self, job_id: &JobId, photos: Value) {
        self.cache.set(Self::job_photos_key(job_id), photos).await;
    }

    pub async fn job_photos(&self, job_id: &JobId) -> Option<Value> {
        self.cache.get(&Self::job_photos_key(job_id)).await
    }

    pub async fn clear(&self) {
        self.cache.clear().await;
    }

    pub async fn len(&self) -> usize {
        self.cache.size().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops expired views every `every` until `shutdown` fires.
    pub fn spawn_sweeper(&self, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = cache.cleanup_expired().await;
                        if removed > 0 {
                            tracing::debug!(removed, "expired read views dropped");
                        }
                    }
                }
            }
        })
    }
}

impl Default for ReadViewCache {
    fn default() -> Self {
        // 読み取りビューは5分間キャッシュ
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl ReadCacheInvalidator for ReadViewCache {
    async fn invalidate_entity(&self, entity_type: &EntityType, entity_id: &EntityId) {
        if self
            .cache
            .delete(&Self::entity_key(entity_type, entity_id))
            .await
        {
            tracing::debug!(
                target: "sync::mutation",
                entity_type = %entity_type,
                entity_id = %entity_id,
                "read view invalidated"
            );
        }
    }

    async fn invalidate_job_photos(&self, job_id: &JobId) {
        if self.cache.delete(&Self::job_photos_key(job_id)).await {
            tracing::debug!(target: "sync::upload", job_id = %job_id, "job photo list invalidated");
        }
    }
}
