use crate::domain::value_objects::{EntityId, EntityType, JobId};
use async_trait::async_trait;

/// 同期成功時に古くなった読み取りビューを無効化するポート
#[async_trait]
pub trait ReadCacheInvalidator: Send + Sync {
    /// エンティティ単位のキャッシュを無効化
    async fn invalidate_entity(&self, entity_type: &EntityType, entity_id: &EntityId);

    /// ジョブに紐づく写真一覧キャッシュを無効化
    async fn invalidate_job_photos(&self, job_id: &JobId);
}
