use crate::domain::entities::{MutationRecord, UploadItem};
use crate::domain::value_objects::{MutationId, UploadId};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Durable copy of the mutation queue.
///
/// `load_all` returns records ordered by `created_at` and skips entries that
/// cannot be decoded instead of failing the whole load.
#[async_trait]
pub trait MutationPersistence: Send + Sync {
    async fn put_or_update(&self, record: &MutationRecord) -> Result<(), AppError>;
    async fn remove(&self, id: &MutationId) -> Result<(), AppError>;
    async fn load_all(&self) -> Result<Vec<MutationRecord>, AppError>;
    async fn clear(&self) -> Result<(), AppError>;
}

/// Durable copy of the photo upload queue.
#[async_trait]
pub trait UploadPersistence: Send + Sync {
    async fn put_or_update(&self, item: &UploadItem) -> Result<(), AppError>;
    async fn remove(&self, id: &UploadId) -> Result<(), AppError>;
    async fn load_all(&self) -> Result<Vec<UploadItem>, AppError>;
    async fn clear(&self) -> Result<(), AppError>;
}
