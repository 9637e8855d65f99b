use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    Database(String),
    Network(String),
    Timeout(String),
    ServerError { status: u16, message: String },
    RateLimited(String),
    ClientError { status: u16, message: String },
    ValidationError(String),
    PersistenceCorruption(String),
    CapacityExceeded(String),
    NotFound(String),
    InvalidInput(String),
    InvalidTransition(String),
    SerializationError(String),
    ConfigurationError(String),
    Internal(String),
}

impl AppError {
    /// Maps a non-2xx response status onto the error taxonomy.
    ///
    /// 429 and 5xx are retryable, 422 is a payload rejection, every other 4xx
    /// is a terminal client error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => AppError::RateLimited(message),
            422 => AppError::ValidationError(message),
            400..=499 => AppError::ClientError { status, message },
            _ => AppError::ServerError { status, message },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Network(_)
                | AppError::Timeout(_)
                | AppError::ServerError { .. }
                | AppError::RateLimited(_)
        )
    }

    /// Stable short label used in logs and persisted `last_error` prefixes.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::Network(_) => "network",
            AppError::Timeout(_) => "timeout",
            AppError::ServerError { .. } => "server_error",
            AppError::RateLimited(_) => "rate_limited",
            AppError::ClientError { .. } => "client_error",
            AppError::ValidationError(_) => "validation",
            AppError::PersistenceCorruption(_) => "persistence_corruption",
            AppError::CapacityExceeded(_) => "capacity_exceeded",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::SerializationError(_) => "serialization",
            AppError::ConfigurationError(_) => "configuration",
            AppError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            AppError::ServerError { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }
            AppError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            AppError::ClientError { status, message } => {
                write!(f, "Client error ({}): {}", status, message)
            }
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::PersistenceCorruption(msg) => write!(f, "Persistence corruption: {}", msg),
            AppError::CapacityExceeded(msg) => write!(f, "Capacity exceeded: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::InvalidTransition(msg) => write!(f, "Invalid transition: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
