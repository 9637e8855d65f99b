pub mod network_state;
pub mod offline;

pub use network_state::{ConnectionType, NetworkState, Reachability};
pub use offline::{
    MutationDraft, MutationRecord, QueueEvent, RemovalReason, UploadDraft, UploadItem,
};
