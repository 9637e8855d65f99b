use crate::domain::value_objects::{
    JobId, LocalAssetRef, PhotoCategory, ServerAssetId, UploadId, UploadStatus,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct UploadDraft {
    pub local_asset_ref: LocalAssetRef,
    pub job_id: JobId,
    pub category: PhotoCategory,
}

impl UploadDraft {
    pub fn new(local_asset_ref: LocalAssetRef, job_id: JobId, category: PhotoCategory) -> Self {
        Self {
            local_asset_ref,
            job_id,
            category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadItem {
    pub id: UploadId,
    pub local_asset_ref: LocalAssetRef,
    pub job_id: JobId,
    pub category: PhotoCategory,
    pub status: UploadStatus,
    pub retry_count: u32,
    pub server_id: Option<ServerAssetId>,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl UploadItem {
    pub fn from_draft(id: UploadId, draft: UploadDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            local_asset_ref: draft.local_asset_ref,
            job_id: draft.job_id,
            category: draft.category,
            status: UploadStatus::Pending,
            retry_count: 0,
            server_id: None,
            created_at,
            next_attempt_at: created_at,
            last_error: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == UploadStatus::Pending && self.next_attempt_at <= now
    }

    pub fn mark_uploading(&mut self) -> Result<(), AppError> {
        self.transition(UploadStatus::Uploading)
    }

    pub fn mark_retry(
        &mut self,
        error: impl Into<String>,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.transition(UploadStatus::Pending)?;
        self.retry_count += 1;
        self.next_attempt_at = next_attempt_at;
        self.last_error = Some(error.into());
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), AppError> {
        self.transition(UploadStatus::Failed)?;
        self.last_error = Some(error.into());
        Ok(())
    }

    /// Records the server-issued id. The id is write-once.
    pub fn mark_synced(&mut self, server_id: ServerAssetId) -> Result<(), AppError> {
        if let Some(existing) = &self.server_id {
            return Err(AppError::InvalidTransition(format!(
                "Upload {} already has server id {}",
                self.id, existing
            )));
        }
        self.transition(UploadStatus::Synced)?;
        self.server_id = Some(server_id);
        self.retry_count = 0;
        self.last_error = None;
        Ok(())
    }

    pub fn requeue(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != UploadStatus::Failed {
            return Err(AppError::InvalidTransition(format!(
                "Only failed uploads can be retried, {} is {}",
                self.id, self.status
            )));
        }
        self.status = UploadStatus::Pending;
        self.next_attempt_at = now;
        Ok(())
    }

    pub fn recover_interrupted(&mut self) -> bool {
        if self.status != UploadStatus::Uploading {
            return false;
        }
        self.status = UploadStatus::Pending;
        true
    }

    fn transition(&mut self, next: UploadStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "Upload {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}
