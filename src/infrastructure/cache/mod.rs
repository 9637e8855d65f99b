pub mod memory_cache;
pub mod read_view_cache;

pub use memory_cache::MemoryCacheService;
pub use read_view_cache::ReadViewCache;
