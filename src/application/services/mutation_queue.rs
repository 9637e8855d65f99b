use crate::application::ports::clock::Clock;
use crate::application::ports::queue_store::MutationPersistence;
use crate::domain::entities::{MutationDraft, MutationRecord, QueueEvent, RemovalReason};
use crate::domain::value_objects::{MutationId, MutationStatus};
use crate::shared::error::AppError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};

const EVENT_CAPACITY: usize = 256;

pub type MutationQueueEvent = QueueEvent<MutationRecord>;

#[derive(Default)]
struct QueueState {
    records: Vec<MutationRecord>,
    restored: bool,
    last_created_at: Option<DateTime<Utc>>,
}

impl QueueState {
    fn position(&self, id: &MutationId) -> Result<usize, AppError> {
        self.records
            .iter()
            .position(|record| &record.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Mutation {id} is not queued")))
    }

    fn outstanding(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status != MutationStatus::Failed)
            .count()
    }

    fn processing(&self) -> Option<&MutationRecord> {
        self.records
            .iter()
            .find(|record| record.status == MutationStatus::Processing)
    }

    /// `created_at` の単調増加を保証する
    fn next_created_at(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + ChronoDuration::milliseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }
}

/// In-memory, persistence-backed queue of pending mutations.
///
/// Every mutating call holds the queue lock across the durable write, so the
/// in-memory view only changes after the write has landed.
pub struct MutationQueueStore {
    persistence: Arc<dyn MutationPersistence>,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
    events: broadcast::Sender<MutationQueueEvent>,
    pending_count: watch::Sender<usize>,
}

impl MutationQueueStore {
    pub fn new(persistence: Arc<dyn MutationPersistence>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (pending_count, _) = watch::channel(0);
        Self {
            persistence,
            clock,
            state: Mutex::new(QueueState::default()),
            events,
            pending_count,
        }
    }

    /// Loads every unsynced record from durable storage. Safe to call more
    /// than once; later calls return the current queue length.
    pub async fn restore(&self) -> Result<usize, AppError> {
        let mut state = self.state.lock().await;
        if state.restored {
            return Ok(state.records.len());
        }

        let mut loaded = self.persistence.load_all().await?;
        loaded.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let mut restored = Vec::with_capacity(loaded.len());
        for mut record in loaded {
            if record.status == MutationStatus::Synced {
                // 同期済みの残骸は削除のみ
                self.persistence.remove(&record.id).await?;
                continue;
            }
            if record.recover_interrupted() {
                tracing::warn!(
                    target: "sync::mutation",
                    id = %record.id,
                    entity = %record.entity_key(),
                    "mutation was in flight at shutdown, resending"
                );
                self.persistence.put_or_update(&record).await?;
            }
            restored.push(record);
        }

        // restore 前に積まれたものは末尾に残す
        let known: HashSet<MutationId> = restored.iter().map(|r| r.id.clone()).collect();
        let early: Vec<MutationRecord> = state
            .records
            .drain(..)
            .filter(|record| !known.contains(&record.id))
            .collect();
        restored.extend(early);
        restored.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        state.last_created_at = restored
            .iter()
            .map(|record| record.created_at)
            .max()
            .max(state.last_created_at);
        state.records = restored;
        state.restored = true;

        let count = state.records.len();
        self.publish_count(&state);
        drop(state);

        tracing::info!(target: "sync::mutation", count, "mutation queue restored");
        self.emit(QueueEvent::Restored { count });
        Ok(count)
    }

    pub async fn enqueue(&self, draft: MutationDraft) -> Result<MutationId, AppError> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let created_at = state.next_created_at(now);
        let mut record = MutationRecord::from_draft(MutationId::generate(), draft, created_at)?;
        // created_at は順序用に繰り上がることがあるが、送信は即時可能にする
        record.next_attempt_at = now;

        self.persistence.put_or_update(&record).await?;
        state.records.push(record.clone());
        self.publish_count(&state);
        drop(state);

        tracing::debug!(
            target: "sync::mutation",
            id = %record.id,
            entity = %record.entity_key(),
            action = %record.action,
            "mutation enqueued"
        );
        let id = record.id.clone();
        self.emit(QueueEvent::Enqueued { record });
        Ok(id)
    }

    /// Oldest pending record that is due, provided nothing is in flight.
    ///
    /// A pending record is skipped while an older pending record of the same
    /// entity is still waiting, so backoff never reorders writes to one entity.
    pub async fn next_eligible(&self, now: DateTime<Utc>) -> Option<MutationRecord> {
        let state = self.state.lock().await;
        if state.processing().is_some() {
            return None;
        }

        let mut blocked: HashSet<String> = HashSet::new();
        for record in &state.records {
            if record.status != MutationStatus::Pending {
                continue;
            }
            let key = record.entity_key();
            if blocked.contains(&key) {
                continue;
            }
            if record.is_due(now) {
                return Some(record.clone());
            }
            blocked.insert(key);
        }
        None
    }

    /// Earliest moment a currently blocked-by-time record becomes eligible.
    pub async fn next_wake_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        let mut blocked: HashSet<String> = HashSet::new();
        let mut earliest: Option<DateTime<Utc>> = None;
        for record in &state.records {
            if record.status != MutationStatus::Pending {
                continue;
            }
            if !blocked.insert(record.entity_key()) {
                continue;
            }
            earliest = Some(match earliest {
                Some(current) => current.min(record.next_attempt_at),
                None => record.next_attempt_at,
            });
        }
        earliest
    }

    pub async fn mark_processing(&self, id: &MutationId) -> Result<MutationRecord, AppError> {
        let mut state = self.state.lock().await;
        if let Some(in_flight) = state.processing()
            && &in_flight.id != id
        {
            return Err(AppError::InvalidTransition(format!(
                "Mutation {} is already processing",
                in_flight.id
            )));
        }
        self.apply_locked(&mut state, id, |record| record.mark_processing())
            .await
    }

    /// Removes a delivered record from memory and durable storage. The
    /// returned record carries the final `synced` status.
    pub async fn mark_synced(&self, id: &MutationId) -> Result<MutationRecord, AppError> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let mut record = state.records[index].clone();
        record.mark_synced()?;

        self.persistence.remove(id).await?;
        state.records.remove(index);
        self.publish_count(&state);
        drop(state);

        self.emit(QueueEvent::Removed {
            record: record.clone(),
            reason: RemovalReason::Synced,
        });
        Ok(record)
    }

    pub async fn mark_retry(
        &self,
        id: &MutationId,
        error: &str,
        backoff: Duration,
    ) -> Result<MutationRecord, AppError> {
        let delay = ChronoDuration::from_std(backoff)
            .map_err(|err| AppError::InvalidInput(format!("Backoff out of range: {err}")))?;
        let next_attempt_at = self.clock.now() + delay;

        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, id, |record| {
            record.mark_retry(error, next_attempt_at)
        })
        .await
    }

    pub async fn mark_failed(&self, id: &MutationId, error: &str) -> Result<MutationRecord, AppError> {
        let mut state = self.state.lock().await;
        self.apply_locked(&mut state, id, |record| record.mark_failed(error))
            .await
    }

    /// Puts records left `processing` by an aborted cycle back to `pending`.
    /// Only sound while the caller holds the processor gate.
    pub async fn recover_in_flight(&self) -> Result<usize, AppError> {
        let mut state = self.state.lock().await;
        let mut recovered = Vec::new();
        for index in 0..state.records.len() {
            let mut record = state.records[index].clone();
            if !record.recover_interrupted() {
                continue;
            }
            self.persistence.put_or_update(&record).await?;
            state.records[index] = record.clone();
            recovered.push(record);
        }
        drop(state);

        for record in &recovered {
            tracing::warn!(target: "sync::mutation", id = %record.id, "recovered orphaned in-flight mutation");
            self.emit(QueueEvent::Updated {
                record: record.clone(),
            });
        }
        Ok(recovered.len())
    }

    /// User-initiated retry of a failed record; `retry_count` is preserved.
    pub async fn retry(&self, id: &MutationId) -> Result<MutationRecord, AppError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let mut record = state.records[index].clone();
        record.requeue(now)?;

        self.persistence.put_or_update(&record).await?;
        state.records[index] = record.clone();
        self.publish_count(&state);
        drop(state);

        tracing::info!(target: "sync::mutation", id = %record.id, "failed mutation requeued by user");
        self.emit(QueueEvent::Requeued {
            record: record.clone(),
        });
        Ok(record)
    }

    /// Hard-deletes a terminally failed record.
    pub async fn discard(&self, id: &MutationId) -> Result<MutationRecord, AppError> {
        let mut state = self.state.lock().await;
        let index = state.position(id)?;
        let record = state.records[index].clone();
        if record.status != MutationStatus::Failed {
            return Err(AppError::InvalidTransition(format!(
                "Only failed mutations can be discarded, {} is {}",
                record.id, record.status
            )));
        }

        self.persistence.remove(id).await?;
        state.records.remove(index);
        self.publish_count(&state);
        drop(state);

        tracing::info!(target: "sync::mutation", id = %record.id, "failed mutation discarded");
        self.emit(QueueEvent::Removed {
            record: record.clone(),
            reason: RemovalReason::Discarded,
        });
        Ok(record)
    }

    /// Drops all queue state. Memory is cleared even if the durable clear fails.
    pub async fn reset(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let dropped = state.records.len();
        *state = QueueState::default();
        self.publish_count(&state);
        let cleared = self.persistence.clear().await;
        drop(state);

        match &cleared {
            Ok(()) => tracing::info!(target: "sync::mutation", dropped, "mutation queue reset"),
            Err(err) => tracing::warn!(
                target: "sync::mutation",
                dropped,
                error = %err,
                "mutation queue cleared in memory but durable clear failed"
            ),
        }
        self.emit(QueueEvent::Reset);
        cleared
    }

    pub async fn get(&self, id: &MutationId) -> Option<MutationRecord> {
        let state = self.state.lock().await;
        state.records.iter().find(|record| &record.id == id).cloned()
    }

    pub async fn status_of(&self, id: &MutationId) -> Option<MutationStatus> {
        self.get(id).await.map(|record| record.status)
    }

    pub async fn snapshot(&self) -> Vec<MutationRecord> {
        self.state.lock().await.records.clone()
    }

    pub async fn failed_records(&self) -> Vec<MutationRecord> {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .filter(|record| record.status == MutationStatus::Failed)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Records still awaiting delivery (pending or processing).
    pub fn pending_count(&self) -> usize {
        *self.pending_count.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationQueueEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_pending_count(&self) -> watch::Receiver<usize> {
        self.pending_count.subscribe()
    }

    async fn apply_locked<F>(
        &self,
        state: &mut QueueState,
        id: &MutationId,
        change: F,
    ) -> Result<MutationRecord, AppError>
    where
        F: FnOnce(&mut MutationRecord) -> Result<(), AppError>,
    {
        let index = state.position(id)?;
        let mut updated = state.records[index].clone();
        change(&mut updated)?;

        self.persistence.put_or_update(&updated).await?;
        state.records[index] = updated.clone();
        self.publish_count(state);

        self.emit(QueueEvent::Updated {
            record: updated.clone(),
        });
        Ok(updated)
    }

    fn publish_count(&self, state: &QueueState) {
        self.pending_count.send_replace(state.outstanding());
    }

    fn emit(&self, event: MutationQueueEvent) {
        // 購読者がいない場合の送信失敗は無視してよい
        let _ = self.events.send(event);
    }
}
