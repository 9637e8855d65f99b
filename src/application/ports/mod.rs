pub mod cache;
pub mod clock;
pub mod queue_store;
pub mod remote_api;
