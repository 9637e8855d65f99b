pub mod cycle_report;
pub mod mutation_processor;
pub mod mutation_queue;
pub mod network_monitor;
pub mod retry_policy;
pub mod sync_engine;
pub mod upload_processor;
pub mod upload_queue;

pub use cycle_report::{CycleReport, Settlement};
pub use mutation_processor::MutationProcessor;
pub use mutation_queue::{MutationQueueEvent, MutationQueueStore};
pub use network_monitor::NetworkMonitor;
pub use retry_policy::{AttemptOutcome, RetryDecision, RetryPolicy};
pub use sync_engine::{SyncEngine, SyncEngineDeps};
pub use upload_processor::UploadProcessor;
pub use upload_queue::{UploadQueueEvent, UploadQueueStore};
