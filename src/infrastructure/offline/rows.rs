use crate::domain::entities::{MutationRecord, UploadItem};
use crate::domain::value_objects::{
    Endpoint, EntityId, EntityType, HttpMethod, JobId, LocalAssetRef, MutationAction, MutationId,
    MutationPayload, MutationStatus, PayloadTag, PhotoCategory, ServerAssetId, UploadId,
    UploadStatus,
};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct MutationRow {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub method: String,
    pub endpoint: String,
    pub payload: Vec<u8>,
    pub description: String,
    pub created_at: i64,
    pub status: String,
    pub retry_count: i64,
    pub next_attempt_at: i64,
    pub last_error: Option<String>,
}

impl MutationRow {
    pub fn into_domain(self) -> Result<MutationRecord, AppError> {
        let id = MutationId::parse(&self.id).map_err(corrupt("id"))?;
        let entity_type = EntityType::new(self.entity_type).map_err(corrupt("entity_type"))?;
        let entity_id = EntityId::new(self.entity_id).map_err(corrupt("entity_id"))?;
        let action = MutationAction::parse(&self.action).map_err(corrupt("action"))?;
        let method = HttpMethod::parse(&self.method).map_err(corrupt("method"))?;
        let endpoint = Endpoint::new(self.endpoint).map_err(corrupt("endpoint"))?;
        let status = MutationStatus::parse(&self.status).map_err(corrupt("status"))?;
        let payload = MutationPayload::new(PayloadTag::new(entity_type.clone(), action), self.payload);

        Ok(MutationRecord {
            id,
            entity_type,
            entity_id,
            action,
            method,
            endpoint,
            payload,
            description: self.description,
            created_at: timestamp("created_at", self.created_at)?,
            status,
            retry_count: retry_count(self.retry_count)?,
            next_attempt_at: timestamp("next_attempt_at", self.next_attempt_at)?,
            last_error: self.last_error,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UploadRow {
    pub id: String,
    pub local_asset_ref: String,
    pub job_id: String,
    pub category: String,
    pub status: String,
    pub retry_count: i64,
    pub server_id: Option<String>,
    pub created_at: i64,
    pub next_attempt_at: i64,
    pub last_error: Option<String>,
}

impl UploadRow {
    pub fn into_domain(self) -> Result<UploadItem, AppError> {
        let server_id = self
            .server_id
            .map(ServerAssetId::new)
            .transpose()
            .map_err(corrupt("server_id"))?;

        Ok(UploadItem {
            id: UploadId::parse(&self.id).map_err(corrupt("id"))?,
            local_asset_ref: LocalAssetRef::new(self.local_asset_ref)
                .map_err(corrupt("local_asset_ref"))?,
            job_id: JobId::new(self.job_id).map_err(corrupt("job_id"))?,
            category: PhotoCategory::new(self.category).map_err(corrupt("category"))?,
            status: UploadStatus::parse(&self.status).map_err(corrupt("status"))?,
            retry_count: retry_count(self.retry_count)?,
            server_id,
            created_at: timestamp("created_at", self.created_at)?,
            next_attempt_at: timestamp("next_attempt_at", self.next_attempt_at)?,
            last_error: self.last_error,
        })
    }
}

fn corrupt(column: &'static str) -> impl Fn(String) -> AppError {
    move |err| AppError::PersistenceCorruption(format!("Invalid {column}: {err}"))
}

fn timestamp(column: &'static str, millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        AppError::PersistenceCorruption(format!("Invalid {column} timestamp: {millis}"))
    })
}

fn retry_count(value: i64) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::PersistenceCorruption(format!("Invalid retry_count: {value}")))
}
