pub mod asset_ref;
pub mod entity_id;
pub mod entity_type;
pub mod http_method;
pub mod job_id;
pub mod mutation_action;
pub mod mutation_id;
pub mod payload;
pub mod queue_status;
pub mod upload_id;

pub use asset_ref::{LocalAssetRef, PhotoCategory, ServerAssetId};
pub use entity_id::EntityId;
pub use entity_type::EntityType;
pub use http_method::{Endpoint, HttpMethod};
pub use job_id::JobId;
pub use mutation_action::MutationAction;
pub use mutation_id::MutationId;
pub use payload::{MutationPayload, PayloadTag};
pub use queue_status::{MutationStatus, UploadStatus};
pub use upload_id::UploadId;
