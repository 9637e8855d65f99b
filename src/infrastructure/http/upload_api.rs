use super::client::ApiClient;
use super::error::TransportError;
use crate::application::ports::remote_api::{UploadApi, UploadResponse};
use crate::domain::entities::UploadItem;
use crate::domain::value_objects::ServerAssetId;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct UploadAccepted {
    id: String,
}

/// Posts photo bytes to `/jobs/{job_id}/photos?category=...`.
pub struct ReqwestUploadApi {
    client: ApiClient,
}

impl ReqwestUploadApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    async fn send(&self, item: &UploadItem) -> Result<UploadResponse, TransportError> {
        let bytes = tokio::fs::read(item.local_asset_ref.as_path())
            .await
            .map_err(|source| TransportError::AssetRead {
                path: item.local_asset_ref.to_string(),
                source,
            })?;

        let path = format!("/jobs/{}/photos", item.job_id);
        let mut builder = self
            .client
            .request(reqwest::Method::POST, &path)
            .query(&[("category", item.category.as_str())])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes);
        if let Some(name) = item.local_asset_ref.file_name() {
            builder = builder.header("x-file-name", name);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        if !(200..300).contains(&status) {
            let message = String::from_utf8_lossy(&body).trim().to_string();
            return Ok(UploadResponse::rejected(status, message));
        }

        let server_id = serde_json::from_slice::<UploadAccepted>(&body)
            .ok()
            .and_then(|accepted| ServerAssetId::new(accepted.id).ok());
        if server_id.is_none() {
            tracing::warn!(
                target: "sync::upload",
                id = %item.id,
                status,
                "upload response did not carry an asset id"
            );
        }
        Ok(UploadResponse {
            status,
            server_id,
            message: None,
        })
    }
}

#[async_trait]
impl UploadApi for ReqwestUploadApi {
    async fn upload(&self, item: &UploadItem) -> Result<UploadResponse, AppError> {
        Ok(self.send(item).await?)
    }
}
