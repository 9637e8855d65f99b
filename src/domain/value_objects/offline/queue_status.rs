use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    Pending,
    Processing,
    Synced,
    Failed,
}

impl MutationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationStatus::Pending => "pending",
            MutationStatus::Processing => "processing",
            MutationStatus::Synced => "synced",
            MutationStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "pending" => Ok(MutationStatus::Pending),
            "processing" => Ok(MutationStatus::Processing),
            "synced" => Ok(MutationStatus::Synced),
            "failed" => Ok(MutationStatus::Failed),
            other => Err(format!("Unknown mutation status: {other}")),
        }
    }

    /// Edges the processor may take. `Failed -> Pending` is reserved for an
    /// explicit user retry and is checked separately.
    pub fn can_transition_to(&self, next: MutationStatus) -> bool {
        matches!(
            (self, next),
            (MutationStatus::Pending, MutationStatus::Processing)
                | (MutationStatus::Processing, MutationStatus::Pending)
                | (MutationStatus::Processing, MutationStatus::Synced)
                | (MutationStatus::Processing, MutationStatus::Failed)
        )
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Synced,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Synced => "synced",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "pending" => Ok(UploadStatus::Pending),
            "uploading" => Ok(UploadStatus::Uploading),
            "synced" => Ok(UploadStatus::Synced),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(format!("Unknown upload status: {other}")),
        }
    }

    pub fn can_transition_to(&self, next: UploadStatus) -> bool {
        matches!(
            (self, next),
            (UploadStatus::Pending, UploadStatus::Uploading)
                | (UploadStatus::Uploading, UploadStatus::Pending)
                | (UploadStatus::Uploading, UploadStatus::Synced)
                | (UploadStatus::Uploading, UploadStatus::Failed)
        )
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
