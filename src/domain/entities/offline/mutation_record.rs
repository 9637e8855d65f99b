use crate::domain::value_objects::{
    Endpoint, EntityId, EntityType, HttpMethod, MutationAction, MutationId, MutationPayload,
    MutationStatus, PayloadTag,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything the UI supplies when it queues a write.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationDraft {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub action: MutationAction,
    pub method: HttpMethod,
    pub endpoint: Endpoint,
    pub payload: MutationPayload,
    pub description: String,
}

impl MutationDraft {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        entity_type: EntityType,
        entity_id: EntityId,
        action: MutationAction,
        method: HttpMethod,
        endpoint: Endpoint,
        payload: MutationPayload,
        description: impl Into<String>,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            action,
            method,
            endpoint,
            payload,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MutationRecord {
    pub id: MutationId,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub action: MutationAction,
    pub method: HttpMethod,
    pub endpoint: Endpoint,
    pub payload: MutationPayload,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: MutationStatus,
    pub retry_count: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl MutationRecord {
    pub fn from_draft(
        id: MutationId,
        draft: MutationDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let expected = PayloadTag::new(draft.entity_type.clone(), draft.action);
        if draft.payload.tag() != &expected {
            return Err(AppError::InvalidInput(format!(
                "Payload tagged {} does not match mutation {}",
                draft.payload.tag(),
                expected
            )));
        }

        Ok(Self {
            id,
            entity_type: draft.entity_type,
            entity_id: draft.entity_id,
            action: draft.action,
            method: draft.method,
            endpoint: draft.endpoint,
            payload: draft.payload,
            description: draft.description,
            created_at,
            status: MutationStatus::Pending,
            retry_count: 0,
            next_attempt_at: created_at,
            last_error: None,
        })
    }

    /// `entity_type/entity_id`, the key used for ordering and cache invalidation.
    pub fn entity_key(&self) -> String {
        format!("{}/{}", self.entity_type, self.entity_id)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == MutationStatus::Pending && self.next_attempt_at <= now
    }

    pub fn mark_processing(&mut self) -> Result<(), AppError> {
        self.transition(MutationStatus::Processing)
    }

    pub fn mark_retry(
        &mut self,
        error: impl Into<String>,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.transition(MutationStatus::Pending)?;
        self.retry_count += 1;
        self.next_attempt_at = next_attempt_at;
        self.last_error = Some(error.into());
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), AppError> {
        self.transition(MutationStatus::Failed)?;
        self.last_error = Some(error.into());
        Ok(())
    }

    pub fn mark_synced(&mut self) -> Result<(), AppError> {
        self.transition(MutationStatus::Synced)?;
        self.retry_count = 0;
        self.last_error = None;
        Ok(())
    }

    /// User-initiated retry of a terminally failed record. `retry_count` is kept.
    pub fn requeue(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != MutationStatus::Failed {
            return Err(AppError::InvalidTransition(format!(
                "Only failed mutations can be retried, {} is {}",
                self.id, self.status
            )));
        }
        self.status = MutationStatus::Pending;
        self.next_attempt_at = now;
        Ok(())
    }

    /// Returns a record left `processing` by a killed process to `pending`.
    pub fn recover_interrupted(&mut self) -> bool {
        if self.status != MutationStatus::Processing {
            return false;
        }
        self.status = MutationStatus::Pending;
        true
    }

    fn transition(&mut self, next: MutationStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "Mutation {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_record() -> MutationRecord {
        let entity_type = EntityType::new("job".into()).unwrap();
        let payload = MutationPayload::new(
            PayloadTag::new(entity_type.clone(), MutationAction::Update),
            b"{}".to_vec(),
        );
        let draft = MutationDraft::new(
            entity_type,
            EntityId::new("J1".into()).unwrap(),
            MutationAction::Update,
            HttpMethod::Patch,
            Endpoint::new("/jobs/J1".into()).unwrap(),
            payload,
            "Update job J1",
        );
        MutationRecord::from_draft(MutationId::generate(), draft, Utc::now()).unwrap()
    }

    #[test]
    fn draft_with_mismatched_payload_tag_is_rejected() {
        let entity_type = EntityType::new("job".into()).unwrap();
        let payload = MutationPayload::empty(PayloadTag::new(
            entity_type.clone(),
            MutationAction::Delete,
        ));
        let draft = MutationDraft::new(
            entity_type,
            EntityId::new("J1".into()).unwrap(),
            MutationAction::Update,
            HttpMethod::Patch,
            Endpoint::new("/jobs/J1".into()).unwrap(),
            payload,
            "",
        );

        let result = MutationRecord::from_draft(MutationId::generate(), draft, Utc::now());
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn retry_increments_count_and_schedules_next_attempt() {
        let mut record = sample_record();
        let next = record.created_at + Duration::seconds(4);

        record.mark_processing().unwrap();
        record.mark_retry("500", next).unwrap();

        assert_eq!(record.status, MutationStatus::Pending);
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.next_attempt_at, next);
        assert_eq!(record.last_error.as_deref(), Some("500"));
        assert!(!record.is_due(record.created_at));
        assert!(record.is_due(next));
    }

    #[test]
    fn synced_resets_retry_count() {
        let mut record = sample_record();
        record.mark_processing().unwrap();
        record.mark_retry("timeout", Utc::now()).unwrap();
        record.mark_processing().unwrap();
        record.mark_synced().unwrap();

        assert_eq!(record.status, MutationStatus::Synced);
        assert_eq!(record.retry_count, 0);
        assert!(record.last_error.is_none());
    }

    #[test]
    fn pending_cannot_jump_to_synced() {
        let mut record = sample_record();
        assert!(matches!(
            record.mark_synced(),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[test]
    fn requeue_only_from_failed_and_keeps_retry_count() {
        let mut record = sample_record();
        assert!(record.requeue(Utc::now()).is_err());

        record.mark_processing().unwrap();
        record.mark_retry("503", Utc::now()).unwrap();
        record.mark_processing().unwrap();
        record.mark_failed("422").unwrap();

        record.requeue(Utc::now()).unwrap();
        assert_eq!(record.status, MutationStatus::Pending);
        assert_eq!(record.retry_count, 1);
    }
}
