pub mod offline;

pub use offline::{
    Endpoint, EntityId, EntityType, HttpMethod, JobId, LocalAssetRef, MutationAction, MutationId,
    MutationPayload, MutationStatus, PayloadTag, PhotoCategory, ServerAssetId, UploadId,
    UploadStatus,
};
