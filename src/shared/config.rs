use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub upload: UploadConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub jitter_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_concurrent: usize,
    pub max_per_job: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub probe_url: Option<String>,
    pub probe_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://data/fieldsync.db?mode=rwc".to_string(),
                max_connections: 1,
            },
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                request_timeout_secs: 30,
                auth_token: None,
            },
            sync: SyncConfig::default(),
            upload: UploadConfig::default(),
            network: NetworkConfig {
                probe_url: None,
                probe_interval_secs: 15,
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base_ms: 2_000,
            backoff_cap_ms: 5 * 60 * 1_000, // 5 minutes
            jitter_ratio: 0.2,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_per_job: 10,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FIELDSYNC_DATABASE_URL")
            && !v.trim().is_empty()
        {
            cfg.database.url = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("FIELDSYNC_DATABASE_MAX_CONNECTIONS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.database.max_connections = value.max(1) as u32;
        }

        if let Ok(v) = std::env::var("FIELDSYNC_API_BASE_URL")
            && !v.trim().is_empty()
        {
            cfg.api.base_url = v.trim().trim_end_matches('/').to_string();
        }
        if let Ok(v) = std::env::var("FIELDSYNC_API_TIMEOUT_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.api.request_timeout_secs = value.max(1);
        }
        if let Ok(v) = std::env::var("FIELDSYNC_API_TOKEN") {
            let token = v.trim();
            cfg.api.auth_token = if token.is_empty() {
                None
            } else {
                Some(token.to_string())
            };
        }

        if let Ok(v) = std::env::var("FIELDSYNC_SYNC_MAX_RETRIES")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.max_retries = value as u32;
        }
        if let Ok(v) = std::env::var("FIELDSYNC_SYNC_BACKOFF_BASE_MS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.backoff_base_ms = value.max(1);
        }
        if let Ok(v) = std::env::var("FIELDSYNC_SYNC_BACKOFF_CAP_MS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.backoff_cap_ms = value.max(1);
        }
        if let Ok(v) = std::env::var("FIELDSYNC_SYNC_JITTER_RATIO")
            && let Some(value) = parse_f64(&v)
        {
            cfg.sync.jitter_ratio = value.clamp(0.0, 1.0);
        }

        if let Ok(v) = std::env::var("FIELDSYNC_UPLOAD_MAX_CONCURRENT")
            && let Some(value) = parse_u64(&v)
        {
            cfg.upload.max_concurrent = (value as usize).max(1);
        }
        if let Ok(v) = std::env::var("FIELDSYNC_UPLOAD_MAX_PER_JOB")
            && let Some(value) = parse_u64(&v)
        {
            cfg.upload.max_per_job = (value as usize).max(1);
        }

        if let Ok(v) = std::env::var("FIELDSYNC_NETWORK_PROBE_URL") {
            let url = v.trim();
            cfg.network.probe_url = if url.is_empty() {
                None
            } else {
                Some(url.to_string())
            };
        }
        if let Ok(v) = std::env::var("FIELDSYNC_NETWORK_PROBE_INTERVAL_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.network.probe_interval_secs = value.max(1);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.api.base_url.trim().is_empty() {
            return Err("API base_url must not be empty".to_string());
        }
        if self.api.request_timeout_secs == 0 {
            return Err("API request_timeout_secs must be greater than 0".to_string());
        }
        if self.sync.backoff_base_ms == 0 {
            return Err("Sync backoff_base_ms must be greater than 0".to_string());
        }
        if self.sync.backoff_cap_ms < self.sync.backoff_base_ms {
            return Err("Sync backoff_cap_ms must not be smaller than backoff_base_ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.sync.jitter_ratio) {
            return Err("Sync jitter_ratio must be within 0.0..=1.0".to_string());
        }
        if self.upload.max_concurrent == 0 {
            return Err("Upload max_concurrent must be greater than 0".to_string());
        }
        if self.upload.max_per_job == 0 {
            return Err("Upload max_per_job must be greater than 0".to_string());
        }
        if self.network.probe_interval_secs == 0 {
            return Err("Network probe_interval_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}
