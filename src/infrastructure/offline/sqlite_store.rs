use super::queries::{
    CLEAR_MUTATIONS, CLEAR_UPLOADS, DELETE_MUTATION, DELETE_UPLOAD, SELECT_MUTATIONS,
    SELECT_UPLOADS, UPSERT_MUTATION, UPSERT_UPLOAD,
};
use super::rows::{MutationRow, UploadRow};
use crate::application::ports::queue_store::{MutationPersistence, UploadPersistence};
use crate::domain::entities::{MutationRecord, UploadItem};
use crate::domain::value_objects::{MutationId, UploadId};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::FromRow;
use sqlx::sqlite::SqliteRow;

/// SQLite-backed durable copy of both offline queues.
pub struct SqliteQueuePersistence {
    pool: ConnectionPool,
}

impl SqliteQueuePersistence {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

/// 1 行ずつ復元し、壊れた行はログを出してスキップする
fn decode_rows<R, T>(
    table: &'static str,
    rows: Vec<SqliteRow>,
    into_domain: impl Fn(R) -> Result<T, AppError>,
) -> Vec<T>
where
    R: for<'r> FromRow<'r, SqliteRow>,
{
    let mut decoded = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let result = R::from_row(row)
            .map_err(|err| AppError::PersistenceCorruption(err.to_string()))
            .and_then(&into_domain);
        match result {
            Ok(value) => decoded.push(value),
            Err(err) => tracing::warn!(
                target: "sync::persistence",
                table,
                row = index,
                error = %err,
                "skipping unreadable queue row"
            ),
        }
    }
    decoded
}

#[async_trait]
impl MutationPersistence for SqliteQueuePersistence {
    async fn put_or_update(&self, record: &MutationRecord) -> Result<(), AppError> {
        sqlx::query(UPSERT_MUTATION)
            .bind(record.id.as_str())
            .bind(record.entity_type.as_str())
            .bind(record.entity_id.as_str())
            .bind(record.action.as_str())
            .bind(record.method.as_str())
            .bind(record.endpoint.as_str())
            .bind(record.payload.body().as_ref())
            .bind(record.description.as_str())
            .bind(record.created_at.timestamp_millis())
            .bind(record.status.as_str())
            .bind(i64::from(record.retry_count))
            .bind(record.next_attempt_at.timestamp_millis())
            .bind(record.last_error.as_deref())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &MutationId) -> Result<(), AppError> {
        sqlx::query(DELETE_MUTATION)
            .bind(id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<MutationRecord>, AppError> {
        let rows = sqlx::query(SELECT_MUTATIONS)
            .fetch_all(self.pool.get_pool())
            .await?;
        Ok(decode_rows("mutation_queue", rows, MutationRow::into_domain))
    }

    async fn clear(&self) -> Result<(), AppError> {
        sqlx::query(CLEAR_MUTATIONS)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UploadPersistence for SqliteQueuePersistence {
    async fn put_or_update(&self, item: &UploadItem) -> Result<(), AppError> {
        sqlx::query(UPSERT_UPLOAD)
            .bind(item.id.as_str())
            .bind(item.local_asset_ref.as_str())
            .bind(item.job_id.as_str())
            .bind(item.category.as_str())
            .bind(item.status.as_str())
            .bind(i64::from(item.retry_count))
            .bind(item.server_id.as_ref().map(|id| id.as_str()))
            .bind(item.created_at.timestamp_millis())
            .bind(item.next_attempt_at.timestamp_millis())
            .bind(item.last_error.as_deref())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &UploadId) -> Result<(), AppError> {
        sqlx::query(DELETE_UPLOAD)
            .bind(id.as_str())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<UploadItem>, AppError> {
        let rows = sqlx::query(SELECT_UPLOADS)
            .fetch_all(self.pool.get_pool())
            .await?;
        Ok(decode_rows("upload_queue", rows, UploadRow::into_domain))
    }

    async fn clear(&self) -> Result<(), AppError> {
        sqlx::query(CLEAR_UPLOADS)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }
}
