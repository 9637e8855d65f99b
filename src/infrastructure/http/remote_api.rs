use super::client::ApiClient;
use super::error::TransportError;
use crate::application::ports::remote_api::{RemoteApi, RemoteRequest, RemoteResponse};
use crate::domain::value_objects::HttpMethod;
use crate::shared::error::AppError;
use async_trait::async_trait;

pub struct ReqwestRemoteApi {
    client: ApiClient,
}

impl ReqwestRemoteApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    async fn send(&self, request: &RemoteRequest) -> Result<RemoteResponse, TransportError> {
        let mut builder = self
            .client
            .request(method_of(request.method), request.endpoint.as_str());
        if !request.body.is_empty() {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RemoteResponse::new(status, body))
    }
}

pub(super) fn method_of(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl RemoteApi for ReqwestRemoteApi {
    async fn execute(&self, request: &RemoteRequest) -> Result<RemoteResponse, AppError> {
        Ok(self.send(request).await?)
    }
}
