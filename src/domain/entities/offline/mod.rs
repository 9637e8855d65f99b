pub mod mutation_record;
pub mod queue_event;
pub mod upload_item;

pub use mutation_record::{MutationDraft, MutationRecord};
pub use queue_event::{QueueEvent, RemovalReason};
pub use upload_item::{UploadDraft, UploadItem};
