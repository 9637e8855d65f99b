use crate::shared::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP client could not be built: {0}")]
    ClientBuild(String),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("Local asset {path} could not be read: {source}")]
    AssetRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidUrl { .. } | TransportError::ClientBuild(_) => {
                AppError::ConfigurationError(err.to_string())
            }
            TransportError::Request(inner) => AppError::from(inner),
            // 端末上のファイルが消えた場合は再試行しても直らない
            TransportError::AssetRead { ref source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                AppError::NotFound(err.to_string())
            }
            TransportError::AssetRead { .. } => AppError::InvalidInput(err.to_string()),
        }
    }
}
