// Gateway module for cache - follows the Train Station Pattern
// All external access must go through this gateway

mod code_cache;
mod file_cache;
mod response_cache;
mod types;

pub use code_cache::{CodeCache, NewCodeEntry};
pub use file_cache::FileCache;
pub use response_cache::ResponseCache;
pub use types::{
    CacheError, CacheFile, CacheMetadata, CachedQuestion, CodeCacheEntry, CodeCacheStats, CodeUsage,
    ResponseCacheStats, ResponseEntry,
};
