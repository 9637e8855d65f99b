use crate::application::ports::clock::Clock;
use crate::application::ports::queue_store::UploadPersistence;
use crate::domain::entities::{QueueEvent, RemovalReason, UploadDraft, UploadItem};
use crate::domain::value_objects::{JobId, ServerAssetId, UploadId, UploadStatus};
use crate::shared::error::AppError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};

const EVENT_CAPACITY: usize = 256;

pub type UploadQueueEvent = QueueEvent<UploadItem>;

#[derive(Default)]
struct UploadState {
    items: Vec<UploadItem>,
    restored: bool,
    last_created_at: Option<DateTime<Utc>>,
}

impl UploadState {
    fn position(&self, id: &UploadId) -> Result<usize, AppError> {
        self.items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Upload {id} is not queued")))
    }

    fn outstanding(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status != UploadStatus::Failed)
            .count()
    }

    fn queued_for_job(&self, job_id: &JobId) -> usize {
        self.items
            .iter()
            .filter(|item| &item.job_id == job_id && item.status != UploadStatus::Synced)
            .count()
    }

    fn next_created_at(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + ChronoDuration::milliseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }
}

/// Persistence-backed queue of photo uploads.
///
/// Unlike mutations, uploads have no ordering dependency on each other and
/// several may be `uploading` at once; the processor bounds how many.
pub struct UploadQueueStore {
    persistence: Arc<dyn UploadPersistence>,
    clock: Arc<dyn Clock>,
    max_per_job: usize,
    state: Mutex<UploadState>,
    events: broadcast::Sender<UploadQueueEvent>,
    pending_count: watch::Sender<usize>,
}

impl UploadQueueStore {
    pub fn new(
        persistence: Arc<dyn UploadPersistence>,
        clock: Arc<dyn Clock>,
        max_per_job: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (pending_count, _) = watch::channel(0);
        Self {
            persistence,
            clock,
            max_per_job: max_per_job.max(1),
            state: Mutex::new(UploadState::default()),
            events,
            pending_count,
        }
    }

    pub async fn restore(&self) -> Result<usize, AppError> {
        let mut state = self.state.lock().await;
        if state.restored {
            return Ok(state.items.len());
        }

        let mut loaded = self.persistence.load_all().await?;
        loaded.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut restored = Vec::with_capacity(loaded.len());
        for mut item in loaded {
            if item.status == UploadStatus::Synced {
                self.persistence.remove(&item.id).await?;
                continue;
            }
            if item.recover_interrupted() {
                tracing::warn!(
                    target: "sync::upload",
                    id = %item.id,
                    job_id = %item.job_id,
                    "upload was in flight at shutdown, resending"
                );
                self.persistence.put_or_update(&item).await?;
            }
            restored.push(item);
        }

        let known: HashSet<UploadId> = restored.iter().map(|i| i.id.clone()).collect();
        let early: Vec<UploadItem> = state
            .items
            .drain(..)
            .filter(|item| !known.contains(&item.id))
            .collect();
        restored.extend(early);
        restored.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        state.last_created_at = restored
            .iter()
            .map(|item| item.created_at)
            .max()
            .max(state.last_created_at);
        state.items = restored;
        state.restored = true;

        let count = state.items.len();
        self.publish_count(&state);
        drop(state);

        tracing::info!(target: "sync::upload", count, "upload queue restored");
        self.emit(QueueEvent::Restored { count });
        Ok(count)
    }

    /// Queues a photo. Fails with `CapacityExceeded` once the job already has
    /// `max_per_job` unsynced photos.
    pub async fn enqueue(&self, draft: UploadDraft) -> Result<UploadId, AppError> {
        let mut state = self.state.lock().await;
        let queued = state.queued_for_job(&draft.job_id);
        if queued >= self.max_per_job {
            tracing::warn!(
                target: "sync::upload",
                job_id = %draft.job_id,
                queued,
                limit = self.max_per_job,
                "photo rejected, job upload queue is full"
            );
            return Err(AppError::CapacityExceeded(format!(
                "Job {} already has {} queued photos (limit {})",
                draft.job_id, queued, self.max_per_job
            )));
        }

        let now = self.clock.now();
        let created_at = state.next_created_at(now);
        let mut item = UploadItem::from_draft(UploadId::generate(), draft, created_at);
        item.next_attempt_at = now;

        self.persistence.put_or_update(&item).await?;
        state.items.push(item.clone());
        self.publish_count(&state);
        drop(state);

        tracing::debug!(
            target: "sync::upload",
            id = %item.id,
            job_id = %item.job_id,
            category = %item.category,
            "photo enqueued"
        );
        let id = item.id.clone();
        self.emit(QueueEvent::Enqueued { record: item });
        Ok(id)
    }

    /// Oldest due `pending` item, regardless of how many are uploading.
    pub async fn next_eligible(&self, now: DateTime<Utc>) -> Option<UploadItem> {
        let state = self.state.lock().await;
        state.items.iter().find(|item| item.is_due(now)).cloned()
    }

    pub async fn next_wake_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state
            .items
            .iter()
            .filter(|item| item.status == UploadStatus::Pending)
            .map(|item| item.next_attempt_at)
            .min()
    }

    pub async fn mark_uploading(&self, id: &UploadId) -> Result<UploadItem, AppError> {
        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, id, |item| item.mark_uploading())
            .await
    }

    /// Assigns the server id and removes the item.
    pub async fn mark_synced(
        &self,
        id: &UploadId,
        server_id: ServerAssetId,
    ) -> Result<UploadItem, AppError> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let mut item = state.items[index].clone();
        item.mark_synced(server_id)?;

        self.persistence.remove(id).await?;
        state.items.remove(index);
        self.publish_count(&state);
        drop(state);

        self.emit(QueueEvent::Removed {
            record: item.clone(),
            reason: RemovalReason::Synced,
        });
        Ok(item)
    }

    pub async fn mark_retry(
        &self,
        id: &UploadId,
        error: &str,
        backoff: Duration,
    ) -> Result<UploadItem, AppError> {
        let delay = ChronoDuration::from_std(backoff)
            .map_err(|err| AppError::InvalidInput(format!("Backoff out of range: {err}")))?;
        let next_attempt_at = self.clock.now() + delay;

        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, id, |item| item.mark_retry(error, next_attempt_at))
            .await
    }

    pub async fn mark_failed(&self, id: &UploadId, error: &str) -> Result<UploadItem, AppError> {
        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, id, |item| item.mark_failed(error))
            .await
    }

    /// Puts items left `uploading` by an aborted cycle back to `pending`.
    pub async fn recover_in_flight(&self) -> Result<usize, AppError> {
        let mut state = self.state.lock().await;
        let mut recovered = Vec::new();
        for index in 0..state.items.len() {
            let mut item = state.items[index].clone();
            if !item.recover_interrupted() {
                continue;
            }
            self.persistence.put_or_update(&item).await?;
            state.items[index] = item.clone();
            recovered.push(item);
        }
        drop(state);

        for item in &recovered {
            tracing::warn!(target: "sync::upload", id = %item.id, "recovered orphaned in-flight upload");
            self.emit(QueueEvent::Updated {
                record: item.clone(),
            });
        }
        Ok(recovered.len())
    }

    pub async fn retry(&self, id: &UploadId) -> Result<UploadItem, AppError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let mut item = state.items[index].clone();
        item.requeue(now)?;

        self.persistence.put_or_update(&item).await?;
        state.items[index] = item.clone();
        self.publish_count(&state);
        drop(state);

        tracing::info!(target: "sync::upload", id = %item.id, "failed upload requeued by user");
        self.emit(QueueEvent::Requeued {
            record: item.clone(),
        });
        Ok(item)
    }

    pub async fn discard(&self, id: &UploadId) -> Result<UploadItem, AppError> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let item = state.items[index].clone();
        if item.status != UploadStatus::Failed {
            return Err(AppError::InvalidTransition(format!(
                "Only failed uploads can be discarded, {} is {}",
                item.id, item.status
            )));
        }

        self.persistence.remove(id).await?;
        state.items.remove(index);
        self.publish_count(&state);
        drop(state);

        tracing::info!(target: "sync::upload", id = %item.id, "failed upload discarded");
        self.emit(QueueEvent::Removed {
            record: item.clone(),
            reason: RemovalReason::Discarded,
        });
        Ok(item)
    }

    pub async fn reset(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let dropped = state.items.len();
        *state = UploadState::default();
        self.publish_count(&state);
        let cleared = self.persistence.clear().await;
        drop(state);

        match &cleared {
            Ok(()) => tracing::info!(target: "sync::upload", dropped, "upload queue reset"),
            Err(err) => tracing::warn!(
                target: "sync::upload",
                dropped,
                error = %err,
                "upload queue cleared in memory but durable clear failed"
            ),
        }
        self.emit(QueueEvent::Reset);
        cleared
    }

    pub async fn get(&self, id: &UploadId) -> Option<UploadItem> {
        let state = self.state.lock().await;
        state.items.iter().find(|item| &item.id == id).cloned()
    }

    pub async fn status_of(&self, id: &UploadId) -> Option<UploadStatus> {
        self.get(id).await.map(|item| item.status)
    }

    pub async fn snapshot(&self) -> Vec<UploadItem> {
        self.state.lock().await.items.clone()
    }

    pub async fn failed_items(&self) -> Vec<UploadItem> {
        let state = self.state.lock().await;
        state
            .items
            .iter()
            .filter(|item| item.status == UploadStatus::Failed)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn pending_count(&self) -> usize {
        *self.pending_count.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadQueueEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_pending_count(&self) -> watch::Receiver<usize> {
        self.pending_count.subscribe()
    }

    async fn apply_locked<F>(
        &self,
        state: &mut UploadState,
        id: &UploadId,
        change: F,
    ) -> Result<UploadItem, AppError>
    where
        F: FnOnce(&mut UploadItem) -> Result<(), AppError>,
    {
        let index = state.position(id)?;
        let mut updated = state.items[index].clone();
        change(&mut updated)?;

        self.persistence.put_or_update(&updated).await?;
        state.items[index] = updated.clone();
        self.publish_count(state);

        self.emit(QueueEvent::Updated {
            record: updated.clone(),
        });
        Ok(updated)
    }

    fn publish_count(&self, state: &UploadState) {
        self.pending_count.send_replace(state.outstanding());
    }

    fn emit(&self, event: UploadQueueEvent) {
        let _ = self.events.send(event);
    }
}
