pub mod client;
pub mod error;
pub mod remote_api;
pub mod upload_api;

pub use client::ApiClient;
pub use error::TransportError;
pub use remote_api::ReqwestRemoteApi;
pub use upload_api::ReqwestUploadApi;
