use crate::domain::entities::{MutationRecord, UploadItem};
use crate::domain::value_objects::{Endpoint, HttpMethod, ServerAssetId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;

/// One HTTP exchange, exactly as it was recorded at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub method: HttpMethod,
    pub endpoint: Endpoint,
    pub body: Bytes,
}

impl From<&MutationRecord> for RemoteRequest {
    fn from(record: &MutationRecord) -> Self {
        Self {
            method: record.method,
            endpoint: record.endpoint.clone(),
            body: record.payload.body().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Short, printable excerpt of the response body for `last_error`.
    pub fn body_excerpt(&self) -> String {
        const LIMIT: usize = 256;
        let text = String::from_utf8_lossy(&self.body);
        let trimmed = text.trim();
        if trimmed.len() <= LIMIT {
            return trimmed.to_string();
        }
        let mut end = LIMIT;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}

/// Remote API collaborator. Transport failures come back as
/// `AppError::Network`/`AppError::Timeout`; any HTTP status is an `Ok` response.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn execute(&self, request: &RemoteRequest) -> Result<RemoteResponse, AppError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub server_id: Option<ServerAssetId>,
    pub message: Option<String>,
}

impl UploadResponse {
    pub fn accepted(server_id: ServerAssetId) -> Self {
        Self {
            status: 201,
            server_id: Some(server_id),
            message: None,
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            server_id: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait UploadApi: Send + Sync {
    async fn upload(&self, item: &UploadItem) -> Result<UploadResponse, AppError>;
}
